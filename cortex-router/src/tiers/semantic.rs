//! Semantic tier (spec.md §4.9): embedding-vs-intent-prototype matching.

use cortex_embedding::{cosine, EmbeddingEngine, EmbeddingError};
use std::sync::Arc;
use std::time::Instant;

/// Canonical phrases this tier matches queries against. Embedded once at
/// construction; the embeddings never change afterward (spec.md §4.9).
const DEFAULT_PROTOTYPES: &[(&str, &str)] = &[
    ("chat", "a casual conversational greeting or small talk message"),
    ("coding", "a request to write, review, or debug source code"),
    ("reasoning", "a multi-step logical or mathematical reasoning problem"),
    ("factual", "a short factual lookup question"),
    ("general", "a general purpose request that does not fit another category"),
];

/// An intermediate verdict produced by the Semantic tier, promoted to a full
/// decision by the router (spec.md §4.9, §4.11 step 6).
#[derive(Debug, Clone)]
pub struct SemanticVerdict {
    /// Best-matching prototype's intent label.
    pub intent: String,
    /// Cosine similarity of the match, used directly as confidence.
    pub confidence: f32,
    /// Wall-clock time spent computing the match, in milliseconds.
    pub latency_ms: u64,
}

/// Matches a query's embedding against a fixed set of labelled intent
/// prototypes.
pub struct SemanticTier {
    engine: Arc<EmbeddingEngine>,
    prototypes: Vec<(String, Vec<f32>)>,
    threshold: f32,
}

impl SemanticTier {
    /// Embeds [`DEFAULT_PROTOTYPES`] against `engine` and returns a tier
    /// ready to classify queries above `threshold` (spec.md §3 default: 0.85).
    pub async fn new(engine: Arc<EmbeddingEngine>, threshold: f32) -> Result<Self, EmbeddingError> {
        Self::with_prototypes(engine, threshold, DEFAULT_PROTOTYPES).await
    }

    /// Builds a tier over a caller-supplied prototype set, `(intent, phrase)`.
    pub async fn with_prototypes(
        engine: Arc<EmbeddingEngine>,
        threshold: f32,
        phrases: &[(&str, &str)],
    ) -> Result<Self, EmbeddingError> {
        let mut prototypes = Vec::with_capacity(phrases.len());
        for (intent, phrase) in phrases {
            let embedding = engine.embed(phrase).await?;
            prototypes.push((intent.to_string(), embedding));
        }
        Ok(Self { engine, prototypes, threshold })
    }

    /// Embeds `query` and returns the argmax-similarity prototype's intent,
    /// provided it clears the configured threshold; otherwise `None` so the
    /// Cognitive tier runs (spec.md §4.11 step 6).
    pub async fn classify(&self, query: &str) -> Result<Option<SemanticVerdict>, EmbeddingError> {
        let started = Instant::now();
        let query_embedding = self.engine.embed(query).await?;
        Ok(self.classify_embedding(&query_embedding, started))
    }

    /// Same matching logic as [`Self::classify`], but over an
    /// already-computed query embedding — the router reuses the embedding
    /// it computed for the cache lookup rather than paying for it twice.
    pub fn classify_embedding(&self, query_embedding: &[f32], started: Instant) -> Option<SemanticVerdict> {
        let mut best: Option<(&str, f32)> = None;
        for (intent, embedding) in &self.prototypes {
            let sim = cosine(query_embedding, embedding);
            if best.map(|(_, b)| sim > b).unwrap_or(true) {
                best = Some((intent.as_str(), sim));
            }
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        best.filter(|&(_, sim)| sim >= self.threshold).map(|(intent, confidence)| SemanticVerdict {
            intent: intent.to_string(),
            confidence,
            latency_ms,
        })
    }

    /// The argmax-similarity prototype's intent regardless of threshold,
    /// for consensus tracking when this tier falls through to the Cognitive
    /// tier (spec.md §4.6: "measure whether cheaper tiers would have
    /// agreed").
    pub fn best_guess(&self, query_embedding: &[f32]) -> Option<&str> {
        let mut best: Option<(&str, f32)> = None;
        for (intent, embedding) in &self.prototypes {
            let sim = cosine(query_embedding, embedding);
            if best.map(|(_, b)| sim > b).unwrap_or(true) {
                best = Some((intent.as_str(), sim));
            }
        }
        best.map(|(intent, _)| intent)
    }
}
