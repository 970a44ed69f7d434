//! Memory-store data shapes: preferences, quirks, analytics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A custom preference rule a caller (or their operator) has configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceRule {
    /// Intent this rule applies to.
    pub intent: String,
    /// Model to prefer when the rule matches.
    pub preferred_model: String,
    /// Free-form note about why the rule exists.
    pub note: Option<String>,
}

/// Per-caller learned state, keyed by `sha256:<hex>` of the API key
/// (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    /// The key this record belongs to.
    pub api_key_hash: String,
    /// intent -> preferred model.
    pub model_preferences: HashMap<String, String>,
    /// provider -> bias score in `[-1, 1]`.
    pub provider_bias: HashMap<String, f32>,
    /// Ordered custom preference rules.
    pub custom_rules: Vec<PreferenceRule>,
    /// Last time this record was mutated (Unix epoch millis).
    pub last_updated_ms: i64,
}

impl UserPreferences {
    /// A fresh, zero-valued record for a key with no prior history
    /// (spec.md §4.7: `get_preferences` never fails).
    pub fn fresh(api_key_hash: impl Into<String>) -> Self {
        Self {
            api_key_hash: api_key_hash.into(),
            model_preferences: HashMap::new(),
            provider_bias: HashMap::new(),
            custom_rules: Vec::new(),
            last_updated_ms: 0,
        }
    }

    /// Nudges a provider's bias score toward `delta`, clamped to `[-1, 1]`
    /// (spec.md §4.7).
    pub fn nudge_provider_bias(&mut self, provider: &str, delta: f32) {
        let entry = self.provider_bias.entry(provider.to_string()).or_insert(0.0);
        *entry = (*entry + delta).clamp(-1.0, 1.0);
    }
}

/// Severity of a known-bad provider behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuirkSeverity {
    /// Worth noting, no routing impact.
    Info,
    /// Provider is functioning but degraded.
    Degraded,
    /// Provider should not be routed to.
    Unavailable,
}

/// A known-bad provider behavior tracked by the memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderQuirk {
    /// Provider name.
    pub provider: String,
    /// Free-form description of the quirk.
    pub description: String,
    /// Severity.
    pub severity: QuirkSeverity,
    /// When this quirk was last observed (Unix epoch millis).
    pub last_observed_ms: i64,
}

/// Roll-up statistics for one provider+model pair.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelRollup {
    /// Number of recorded outcomes.
    pub count: u64,
    /// Successes / count.
    pub success_rate: f32,
    /// Mean latency across recorded outcomes, in milliseconds.
    pub mean_latency_ms: f32,
    /// Mean quality score across recorded outcomes.
    pub mean_quality: f32,
}

/// Analytics roll-up produced by `compute_analytics()` (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyticsSummary {
    /// Keyed by `"provider:model"`.
    pub by_model: HashMap<String, ModelRollup>,
    /// When this summary was computed (Unix epoch millis).
    pub computed_at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_preferences_are_empty() {
        let p = UserPreferences::fresh("sha256:abc");
        assert!(p.model_preferences.is_empty());
        assert!(p.provider_bias.is_empty());
    }

    #[test]
    fn provider_bias_nudge_clamps() {
        let mut p = UserPreferences::fresh("sha256:abc");
        for _ in 0..30 {
            p.nudge_provider_bias("openai", 0.1);
        }
        assert_eq!(p.provider_bias["openai"], 1.0);
        for _ in 0..30 {
            p.nudge_provider_bias("openai", -0.1);
        }
        assert_eq!(p.provider_bias["openai"], -1.0);
    }
}
