//! Cognitive tier (spec.md §4.10): calls a small router LLM with a strict
//! JSON contract, with one retry against a fallback model and a generic
//! last-resort verdict if both attempts fail.

use crate::scorer::{ClassifierVerdict, ConfidenceScorer, ScorerError};
use async_trait::async_trait;
use cortex_types::Complexity;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors a [`RouterModelClient`] may raise. Upstream HTTP transport itself
/// is out of scope (spec.md §1); this is the narrow seam the router depends
/// on to reach it.
#[derive(Error, Debug)]
pub enum RouterModelError {
    /// The call exceeded its deadline.
    #[error("router model call timed out")]
    Timeout,
    /// The call failed for any other reason (connection, HTTP status, ...).
    #[error("router model call failed: {0}")]
    Unavailable(String),
}

/// Narrow interface to whatever transport actually reaches the configured
/// router model. Implemented outside this crate; upstream HTTP transport
/// itself is a declared Non-goal (spec.md §1).
#[async_trait]
pub trait RouterModelClient: Send + Sync {
    /// Sends `prompt` to `model` and returns its raw text reply.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, RouterModelError>;
}

/// The last-resort verdict emitted when both the router model and its
/// fallback fail (spec.md §4.10).
fn generic_fallback_verdict() -> ClassifierVerdict {
    ClassifierVerdict { intent: "general".to_string(), complexity: Complexity::Unknown, confidence: 0.5 }
}

fn classifier_prompt(query: &str) -> String {
    format!(
        "Classify the following request. Reply with strict JSON only, matching \
         exactly {{\"intent\": string, \"complexity\": \"simple\"|\"medium\"|\"complex\", \
         \"confidence\": number between 0 and 1}}.\n\nRequest:\n{query}"
    )
}

/// Calls the configured router model, falling back to a secondary model on
/// timeout, malformed output, or low confidence.
pub struct CognitiveTier {
    client: Arc<dyn RouterModelClient>,
    scorer: Arc<ConfidenceScorer>,
    router_model: String,
    fallback_model: String,
    confidence_low: f32,
    per_attempt_deadline: Duration,
}

impl CognitiveTier {
    /// Builds a tier that calls `router_model` first, then `fallback_model`
    /// on failure, giving each attempt `per_attempt_deadline` before it
    /// counts as a timeout.
    pub fn new(
        client: Arc<dyn RouterModelClient>,
        scorer: Arc<ConfidenceScorer>,
        router_model: String,
        fallback_model: String,
        confidence_low: f32,
        per_attempt_deadline: Duration,
    ) -> Self {
        Self { client, scorer, router_model, fallback_model, confidence_low, per_attempt_deadline }
    }

    /// Runs the classification, always producing a verdict (spec.md §4.10:
    /// "the tier emits `{intent: "general", ...}` so the caller can still
    /// proceed"). `cancel` aborts either attempt early.
    pub async fn classify(&self, query: &str, cancel: &CancellationToken) -> ClassifierVerdict {
        if let Some(verdict) = self.attempt(&self.router_model, query, cancel).await {
            log::debug!("cognitive tier: router model {} succeeded", self.router_model);
            return verdict;
        }

        log::warn!("cognitive tier: router model {} failed or low-confidence, retrying fallback", self.router_model);
        if let Some(verdict) = self.attempt(&self.fallback_model, query, cancel).await {
            log::debug!("cognitive tier: fallback model {} succeeded", self.fallback_model);
            return verdict;
        }

        log::error!("cognitive tier: both router and fallback models failed; emitting generic verdict");
        generic_fallback_verdict()
    }

    async fn attempt(&self, model: &str, query: &str, cancel: &CancellationToken) -> Option<ClassifierVerdict> {
        let prompt = classifier_prompt(query);
        let call = self.client.complete(model, &prompt);

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = tokio::time::timeout(self.per_attempt_deadline, call) => {
                match result {
                    Ok(Ok(raw)) => raw,
                    Ok(Err(e)) => {
                        log::warn!("router model {model} call failed: {e}");
                        return None;
                    }
                    Err(_) => {
                        log::warn!("router model {model} call timed out");
                        return None;
                    }
                }
            }
        };

        match self.scorer.parse_and_record(&raw) {
            Ok(verdict) if verdict.confidence >= self.confidence_low => Some(verdict),
            Ok(verdict) => {
                log::debug!("router model {model} confidence {} below floor", verdict.confidence);
                None
            }
            Err(ScorerError::ParseError(e)) => {
                log::warn!("router model {model} returned malformed classifier JSON: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClient {
        replies: Vec<Result<String, RouterModelError>>,
    }

    #[async_trait]
    impl RouterModelClient for StubClient {
        async fn complete(&self, model: &str, _prompt: &str) -> Result<String, RouterModelError> {
            let idx = if model.contains("fallback") { 1 } else { 0 };
            self.replies[idx].clone()
        }
    }

    impl Clone for RouterModelError {
        fn clone(&self) -> Self {
            match self {
                Self::Timeout => Self::Timeout,
                Self::Unavailable(s) => Self::Unavailable(s.clone()),
            }
        }
    }

    fn tier(replies: Vec<Result<String, RouterModelError>>) -> CognitiveTier {
        CognitiveTier::new(
            Arc::new(StubClient { replies }),
            Arc::new(ConfidenceScorer::new(0.60, 0.90)),
            "router:small".to_string(),
            "router:fallback".to_string(),
            0.60,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn first_attempt_success_short_circuits() {
        let t = tier(vec![
            Ok(r#"{"intent":"coding","complexity":"complex","confidence":0.9}"#.to_string()),
            Ok(r#"{"intent":"chat","complexity":"simple","confidence":0.9}"#.to_string()),
        ]);
        let verdict = t.classify("some query", &CancellationToken::new()).await;
        assert_eq!(verdict.intent, "coding");
    }

    #[tokio::test]
    async fn low_confidence_first_attempt_falls_back() {
        let t = tier(vec![
            Ok(r#"{"intent":"coding","complexity":"complex","confidence":0.2}"#.to_string()),
            Ok(r#"{"intent":"chat","complexity":"simple","confidence":0.9}"#.to_string()),
        ]);
        let verdict = t.classify("some query", &CancellationToken::new()).await;
        assert_eq!(verdict.intent, "chat");
    }

    #[tokio::test]
    async fn both_attempts_failing_yields_generic_verdict() {
        let t = tier(vec![
            Err(RouterModelError::Unavailable("down".into())),
            Err(RouterModelError::Unavailable("down".into())),
        ]);
        let verdict = t.classify("some query", &CancellationToken::new()).await;
        assert_eq!(verdict.intent, "general");
        assert_eq!(verdict.complexity, Complexity::Unknown);
        assert_eq!(verdict.confidence, 0.5);
    }

    #[tokio::test]
    async fn malformed_json_falls_back() {
        let t = tier(vec![
            Ok("not json".to_string()),
            Ok(r#"{"intent":"chat","complexity":"simple","confidence":0.9}"#.to_string()),
        ]);
        let verdict = t.classify("some query", &CancellationToken::new()).await;
        assert_eq!(verdict.intent, "chat");
    }

    #[tokio::test]
    async fn cancellation_short_circuits_to_generic_verdict() {
        let t = tier(vec![
            Ok(r#"{"intent":"coding","complexity":"complex","confidence":0.9}"#.to_string()),
            Ok(r#"{"intent":"chat","complexity":"simple","confidence":0.9}"#.to_string()),
        ]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let verdict = t.classify("some query", &cancel).await;
        assert_eq!(verdict.intent, "general");
    }
}
