//! Router output: the decision produced for a request, and the outcome
//! reported back after the upstream call completes.

use serde::{Deserialize, Serialize};

/// Coarse workload hint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Small talk, short factual lookups.
    Simple,
    /// Everyday reasoning, moderate-length generation.
    Medium,
    /// Multi-step reasoning, code generation, long-form synthesis.
    Complex,
    /// Set by the Cognitive tier's double-fallback path (spec.md §4.10).
    Unknown,
}

impl Complexity {
    /// Parses the classifier's `"simple"|"medium"|"complex"` field, the only
    /// values the wire contract allows; `"unknown"` is never accepted from
    /// the wire, only produced internally.
    pub fn parse_wire(s: &str) -> Option<Self> {
        match s {
            "simple" => Some(Self::Simple),
            "medium" => Some(Self::Medium),
            "complex" => Some(Self::Complex),
            _ => None,
        }
    }

    /// The inverse of [`Self::parse_wire`], used to build matrix lookup keys.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
            Self::Unknown => "unknown",
        }
    }
}

/// Privacy classification of the request content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyTag {
    /// No sensitive content detected.
    None,
    /// Personally identifiable information was detected by the Reflex tier.
    Pii,
}

/// The classifier tier that produced (or short-circuited) a decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Cheap deterministic rules (spec.md §4.8).
    Reflex,
    /// Embedding-vs-prototype matching (spec.md §4.9).
    Semantic,
    /// Small router LLM (spec.md §4.10).
    Cognitive,
    /// Served from the semantic cache.
    Cache,
    /// `model != "auto"`; tiers were never consulted.
    Bypass,
    /// Caller-initiated cancellation aborted the in-flight tier.
    Cancelled,
}

/// Output of a `route` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// `sha256:<hex>` of the caller's API key.
    pub api_key_hash: String,
    /// Hash of the request body, for outcome correlation.
    pub request_hash: String,
    /// When the decision was made (Unix epoch millis).
    pub timestamp_ms: i64,
    /// Classified intent (`"chat"`, `"coding"`, `"pii_detected"`, ...).
    pub intent: String,
    /// Classified complexity.
    pub complexity: Complexity,
    /// Privacy classification.
    pub privacy: PrivacyTag,
    /// Selected `provider:model` identifier.
    pub selected_model: String,
    /// The tier that produced this decision.
    pub tier: Tier,
    /// Final confidence in `[0, 1]`.
    pub confidence: f32,
    /// Routing latency in milliseconds.
    pub latency_ms: u64,
    /// Whether the caller's memory profile influenced the result.
    pub used_memory: bool,
    /// Skill-provided system prompt, when a skill match replaced the
    /// default hint (spec.md §4.9; see SPEC_FULL.md §3).
    pub system_prompt: Option<String>,
}

impl RoutingDecision {
    /// Clamps `confidence` into `[0, 1]`, the invariant every decision must
    /// satisfy (spec.md §3, §8).
    pub fn clamp_confidence(&mut self) {
        self.confidence = self.confidence.clamp(0.0, 1.0);
    }
}

/// Attached post-hoc by the dispatcher once the upstream call completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingOutcome {
    /// Hash identifying the decision this outcome belongs to.
    pub request_hash: String,
    /// Whether the upstream call succeeded.
    pub success: bool,
    /// Observed response time in milliseconds.
    pub response_time_ms: u64,
    /// Error string, when `success` is false or a non-fatal error occurred
    /// alongside a successful response.
    pub error: Option<String>,
}

impl RoutingOutcome {
    /// Deterministic quality score in `[0, 1]` (spec.md §4.7, §8).
    ///
    /// Baseline 1.0 on success / 0.0 on failure, discounted linearly by
    /// response time beyond one second down to ~0.6 at eight seconds, and
    /// by a further 0.2 when a non-fatal error accompanied a success.
    pub fn quality_score(&self) -> f32 {
        if !self.success {
            // Failure baseline is 0.0 regardless of latency; spec.md §8 only
            // calls out the >=30s case explicitly, which this already satisfies.
            return 0.0;
        }
        let mut score = 1.0_f32;
        if self.response_time_ms > 1_000 {
            let over_ms = (self.response_time_ms - 1_000) as f32;
            // 1s -> 1.0, 8s -> ~0.6: a slope of 0.4 / 7000ms past the 1s mark.
            let discount = (over_ms / 7_000.0) * 0.4;
            score -= discount;
        }
        if self.error.is_some() {
            score -= 0.2;
        }
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quality_is_one_at_one_second_success() {
        let o = RoutingOutcome { request_hash: "h".into(), success: true, response_time_ms: 1000, error: None };
        assert_eq!(o.quality_score(), 1.0);
    }

    #[test]
    fn quality_decays_to_about_point_six_at_eight_seconds() {
        let o = RoutingOutcome { request_hash: "h".into(), success: true, response_time_ms: 8000, error: None };
        let q = o.quality_score();
        assert!((q - 0.6).abs() < 0.01, "got {q}");
    }

    #[test]
    fn quality_is_monotonically_non_increasing_in_response_time() {
        let mut prev = 2.0;
        for ms in [1000, 2000, 4000, 8000, 16000] {
            let o = RoutingOutcome { request_hash: "h".into(), success: true, response_time_ms: ms, error: None };
            let q = o.quality_score();
            assert!(q <= prev, "quality should not increase with latency");
            prev = q;
        }
    }

    #[test]
    fn failure_at_or_past_30s_is_exactly_zero() {
        let o = RoutingOutcome { request_hash: "h".into(), success: false, response_time_ms: 30_000, error: Some("timeout".into()) };
        assert_eq!(o.quality_score(), 0.0);
    }

    #[test]
    fn success_with_nonfatal_error_is_discounted() {
        let clean = RoutingOutcome { request_hash: "h".into(), success: true, response_time_ms: 500, error: None };
        let noisy = RoutingOutcome { request_hash: "h".into(), success: true, response_time_ms: 500, error: Some("retry".into()) };
        assert!((clean.quality_score() - noisy.quality_score() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn complexity_wire_parsing_rejects_unknown() {
        assert_eq!(Complexity::parse_wire("simple"), Some(Complexity::Simple));
        assert_eq!(Complexity::parse_wire("unknown"), None);
        assert_eq!(Complexity::parse_wire("bogus"), None);
    }
}
