//! Confidence scorer (spec.md §4.5): parses the classifier's JSON contract
//! and tracks the confidence distribution across calls.

use cortex_types::Complexity;
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised by the scorer. A `ParseError` here propagates to the
/// Cognitive tier, which treats it the same as a timeout (spec.md §4.10).
#[derive(Error, Debug)]
pub enum ScorerError {
    /// The classifier's response didn't match `{intent, complexity, confidence}`.
    #[error("failed to parse classifier output: {0}")]
    ParseError(String),
}

/// The wire shape a classifier (router LLM or otherwise) must reply with
/// (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
struct ClassifierWire {
    intent: String,
    complexity: String,
    confidence: f32,
}

/// A parsed, validated classifier verdict.
#[derive(Debug, Clone)]
pub struct ClassifierVerdict {
    /// Classified intent.
    pub intent: String,
    /// Classified complexity.
    pub complexity: Complexity,
    /// Reported confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Running distribution statistics over parsed confidences.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceDistribution {
    /// Total parsed verdicts.
    pub total: u64,
    /// Count with `confidence < low`.
    pub below_low: u64,
    /// Count with `confidence > high`.
    pub above_high: u64,
    /// Rolling mean confidence.
    pub mean: f32,
}

struct Stats {
    total: u64,
    sum_confidence: f64,
    below_low: u64,
    above_high: u64,
}

impl Stats {
    fn new() -> Self {
        Self { total: 0, sum_confidence: 0.0, below_low: 0, above_high: 0 }
    }
}

/// Parses classifier JSON and accumulates confidence statistics
/// (spec.md §4.5).
pub struct ConfidenceScorer {
    confidence_low: f32,
    confidence_high: f32,
    stats: Mutex<Stats>,
}

impl ConfidenceScorer {
    /// Creates a scorer using the router's configured low/high confidence
    /// thresholds for bucketing.
    pub fn new(confidence_low: f32, confidence_high: f32) -> Self {
        Self { confidence_low, confidence_high, stats: Mutex::new(Stats::new()) }
    }

    /// Parses a classifier JSON document `{intent, complexity, confidence}`
    /// and records it in the running distribution. `complexity` must be one
    /// of the wire-accepted values (spec.md §6); anything else is a
    /// `ParseError`, as is malformed JSON.
    pub fn parse_and_record(&self, raw: &str) -> Result<ClassifierVerdict, ScorerError> {
        let wire: ClassifierWire =
            serde_json::from_str(raw).map_err(|e| ScorerError::ParseError(e.to_string()))?;
        let complexity = Complexity::parse_wire(&wire.complexity)
            .ok_or_else(|| ScorerError::ParseError(format!("unrecognized complexity {:?}", wire.complexity)))?;
        if !(0.0..=1.0).contains(&wire.confidence) {
            return Err(ScorerError::ParseError(format!("confidence out of range: {}", wire.confidence)));
        }

        let mut stats = self.stats.lock();
        stats.total += 1;
        stats.sum_confidence += wire.confidence as f64;
        if wire.confidence < self.confidence_low {
            stats.below_low += 1;
        }
        if wire.confidence > self.confidence_high {
            stats.above_high += 1;
        }

        Ok(ClassifierVerdict { intent: wire.intent, complexity, confidence: wire.confidence })
    }

    /// Snapshot of the running distribution.
    pub fn distribution(&self) -> ConfidenceDistribution {
        let stats = self.stats.lock();
        let mean = if stats.total == 0 { 0.0 } else { (stats.sum_confidence / stats.total as f64) as f32 };
        ConfidenceDistribution { total: stats.total, below_low: stats.below_low, above_high: stats.above_high, mean }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::new(0.60, 0.90)
    }

    #[test]
    fn parses_well_formed_verdict() {
        let s = scorer();
        let v = s.parse_and_record(r#"{"intent":"coding","complexity":"complex","confidence":0.95}"#).unwrap();
        assert_eq!(v.intent, "coding");
        assert_eq!(v.complexity, Complexity::Complex);
        assert_eq!(v.confidence, 0.95);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let s = scorer();
        assert!(s.parse_and_record("not json").is_err());
    }

    #[test]
    fn unrecognized_complexity_is_parse_error() {
        let s = scorer();
        assert!(s.parse_and_record(r#"{"intent":"x","complexity":"huge","confidence":0.5}"#).is_err());
    }

    #[test]
    fn distribution_tracks_buckets_and_mean() {
        let s = scorer();
        s.parse_and_record(r#"{"intent":"a","complexity":"simple","confidence":0.50}"#).unwrap();
        s.parse_and_record(r#"{"intent":"b","complexity":"simple","confidence":0.95}"#).unwrap();
        let d = s.distribution();
        assert_eq!(d.total, 2);
        assert_eq!(d.below_low, 1);
        assert_eq!(d.above_high, 1);
        assert!((d.mean - 0.725).abs() < 1e-6);
    }
}
