//! Validated router configuration.
//!
//! `IntelligenceConfig` is constructed and validated elsewhere (YAML
//! loading, schema migration, and file persistence are explicitly out of
//! scope per spec.md §1). The router only ever consumes an already-built
//! value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `(intent, complexity)` -> concrete `provider:model` matrix, plus the
/// intent-only fallback and the global fallback, per the miss policy
/// decided in SPEC_FULL.md §3.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelMatrix {
    /// Keyed by `"intent/complexity"`, e.g. `"coding/complex"`.
    pub by_intent_and_complexity: HashMap<String, String>,
    /// Keyed by `"intent"` alone, consulted when the combined key misses.
    pub by_intent: HashMap<String, String>,
}

impl ModelMatrix {
    /// Looks up a concrete model, falling back from the specific key to the
    /// intent-only key. Does not apply the final router-fallback-model step;
    /// the caller (C11) does that once both of these miss.
    pub fn lookup(&self, intent: &str, complexity: &str) -> Option<&str> {
        let specific = format!("{intent}/{complexity}");
        self.by_intent_and_complexity
            .get(&specific)
            .or_else(|| self.by_intent.get(intent))
            .map(String::as_str)
    }
}

/// Thresholds and knobs enumerated in spec.md §3, with the stated defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceConfig {
    /// Master enable flag for the whole router.
    pub enabled: bool,
    /// Router model id used by the Cognitive tier.
    pub router_model: String,
    /// Fallback router model id, used on first-attempt failure.
    pub router_fallback_model: String,
    /// Local-only model used for PII-tagged requests regardless of matrix.
    pub pii_local_model: String,
    /// Intent/complexity -> model matrix.
    pub matrix: ModelMatrix,

    /// Directory containing `SKILL.md` files.
    pub skills_dir: Option<String>,
    /// Name of the embedding model to load.
    pub embedding_model_name: String,

    /// Semantic-tier confidence threshold. Default 0.85.
    pub semantic_threshold: f32,
    /// Skill-match threshold. Default 0.80.
    pub skill_match_threshold: f32,

    /// Cache similarity threshold. Default 0.95.
    pub cache_similarity_threshold: f32,
    /// Cache max entries. Default 10,000.
    pub cache_max_entries: usize,

    /// Confidence floor for an acceptable cognitive-tier verdict. Default 0.60.
    pub confidence_low: f32,
    /// Confidence ceiling tracked by the distribution. Default 0.90.
    pub confidence_high: f32,
    /// Cascade quality threshold. Default 0.70.
    pub cascade_quality_threshold: f32,

    /// Feedback retention window, in days. Default 90.
    pub feedback_retention_days: u32,
    /// Minimum prior observations before learning acts. Default 100.
    pub learning_min_sample_size: u32,
    /// Confidence threshold above which an outcome can drive learning. Default 0.85.
    pub learning_confidence_threshold: f32,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            router_model: "ollama:qwen:0.5b".to_string(),
            router_fallback_model: "ollama:qwen:0.5b".to_string(),
            pii_local_model: "ollama:llama:3b".to_string(),
            matrix: ModelMatrix::default(),
            skills_dir: None,
            embedding_model_name: "all-MiniLM-L6-v2".to_string(),
            semantic_threshold: 0.85,
            skill_match_threshold: 0.80,
            cache_similarity_threshold: 0.95,
            cache_max_entries: 10_000,
            confidence_low: 0.60,
            confidence_high: 0.90,
            cascade_quality_threshold: 0.70,
            feedback_retention_days: 90,
            learning_min_sample_size: 100,
            learning_confidence_threshold: 0.85,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_spec() {
        let c = IntelligenceConfig::default();
        assert_eq!(c.semantic_threshold, 0.85);
        assert_eq!(c.skill_match_threshold, 0.80);
        assert_eq!(c.cache_similarity_threshold, 0.95);
        assert_eq!(c.cache_max_entries, 10_000);
        assert_eq!(c.confidence_low, 0.60);
        assert_eq!(c.confidence_high, 0.90);
        assert_eq!(c.cascade_quality_threshold, 0.70);
        assert_eq!(c.feedback_retention_days, 90);
        assert_eq!(c.learning_min_sample_size, 100);
        assert_eq!(c.learning_confidence_threshold, 0.85);
    }

    #[test]
    fn matrix_falls_back_from_specific_to_intent_only() {
        let mut m = ModelMatrix::default();
        m.by_intent.insert("coding".into(), "claude:sonnet".into());
        assert_eq!(m.lookup("coding", "complex"), Some("claude:sonnet"));

        m.by_intent_and_complexity
            .insert("coding/complex".into(), "claude:opus".into());
        assert_eq!(m.lookup("coding", "complex"), Some("claude:opus"));
        assert_eq!(m.lookup("coding", "simple"), Some("claude:sonnet"));
        assert_eq!(m.lookup("unknown", "simple"), None);
    }
}
