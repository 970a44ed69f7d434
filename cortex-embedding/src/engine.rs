//! ONNX transformer embedding engine (spec.md §4.1).
//!
//! Adapted from a `Mutex`-guarded single-session embedder: here the session
//! lives behind an inner `Mutex` (ONNX Runtime's `run_binding` takes
//! `&mut Session`) while an outer `RwLock<Option<..>>` is the lock spec.md
//! §4.1 and §5 actually describe — many callers take its read side
//! concurrently to confirm the engine is still initialized, and only
//! `initialize`/`shutdown` ever take the write side, so a model swap can
//! never race a batch of in-flight `embed` calls.

use crate::tokenizer::WordPieceTokenizer;
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::RwLock;

/// Output embedding dimension, fixed by the spec (spec.md §3, §8).
pub const EMBEDDING_DIM: usize = 384;
/// Maximum sequence length fed to the model per call (spec.md §4.1).
pub const MAX_SEQ_LEN: usize = 256;

/// Errors raised by the embedding engine.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The model file was missing or failed to load.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    /// A per-call inference failure; the caller should treat this as
    /// transient and let the calling tier emit no verdict.
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    /// `embed` was called after `shutdown`.
    #[error("embedding engine has been shut down")]
    ShutDown,
}

struct LoadedModel {
    session: Mutex<Session>,
    tokenizer: WordPieceTokenizer,
    has_token_type_ids: bool,
}

/// Tokenizes text and produces L2-normalized 384-float embeddings via an
/// ONNX transformer session (spec.md §4.1).
pub struct EmbeddingEngine {
    state: RwLock<Option<LoadedModel>>,
}

impl EmbeddingEngine {
    /// Constructs an engine with no model loaded; call [`Self::initialize`]
    /// before the first `embed`. Only one engine instance should exist per
    /// process (spec.md §9) since the ONNX runtime environment is
    /// process-global.
    pub fn new() -> Self {
        Self { state: RwLock::new(None) }
    }

    /// Loads the transformer model at `model_path` and the vocabulary at
    /// `vocab_path` (falling back to the built-in vocabulary when absent).
    pub async fn initialize(&self, model_path: &Path, vocab_path: &Path) -> Result<(), EmbeddingError> {
        if !model_path.exists() {
            return Err(EmbeddingError::ModelUnavailable(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }
        let tokenizer = WordPieceTokenizer::load(vocab_path)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        let session = Session::builder()
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        let has_token_type_ids = session.inputs().iter().any(|i| i.name() == "token_type_ids");

        let mut guard = self.state.write().await;
        *guard = Some(LoadedModel { session: Mutex::new(session), tokenizer, has_token_type_ids });
        log::info!("embedding engine initialized (token_type_ids={has_token_type_ids})");
        Ok(())
    }

    /// Releases the session and disables further calls (spec.md §4.1).
    pub async fn shutdown(&self) {
        let mut guard = self.state.write().await;
        *guard = None;
        log::info!("embedding engine shut down");
    }

    /// Embeds one piece of text into a 384-float, L2-normalized vector.
    ///
    /// Zero-length input (and degenerate all-zero output) is returned as-is
    /// rather than attempting to divide by a zero norm (spec.md §4.1).
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let guard = self.state.read().await;
        let model = guard.as_ref().ok_or(EmbeddingError::ShutDown)?;

        let encoding = model.tokenizer.encode(text, MAX_SEQ_LEN);
        let seq_len = encoding.input_ids.len();
        if seq_len == 0 {
            return Ok(vec![0.0; EMBEDDING_DIM]);
        }

        let ids_arr = Array2::from_shape_vec((1, seq_len), encoding.input_ids)
            .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?;
        let mask_arr = Array2::from_shape_vec((1, seq_len), encoding.attention_mask.clone())
            .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?;

        let ids_val = Value::from_array(ids_arr)
            .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?
            .into_dyn();
        let mask_val = Value::from_array(mask_arr)
            .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?
            .into_dyn();

        let mut session = model
            .session
            .lock()
            .map_err(|_| EmbeddingError::InferenceFailed("session mutex poisoned".into()))?;

        let mut inputs = vec![("input_ids", ids_val), ("attention_mask", mask_val)];
        if model.has_token_type_ids {
            let tti_arr = Array2::from_shape_vec((1, seq_len), encoding.token_type_ids)
                .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?;
            let tti_val = Value::from_array(tti_arr)
                .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?
                .into_dyn();
            inputs.push(("token_type_ids", tti_val));
        }

        let outputs = session
            .run(inputs)
            .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?;

        let lhs = outputs
            .get("last_hidden_state")
            .ok_or_else(|| EmbeddingError::InferenceFailed("missing last_hidden_state output".into()))?;

        let (shape, data) = lhs
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?;
        if shape.len() != 3 {
            return Err(EmbeddingError::InferenceFailed(format!(
                "expected 3D last_hidden_state, got shape {shape:?}"
            )));
        }
        let hidden_dim = shape[2] as usize;
        let actual_seq = (shape[1] as usize).min(encoding.attention_mask.len());

        Ok(mean_pool_and_normalize(data, &encoding.attention_mask, actual_seq, hidden_dim))
    }

    /// Embeds several texts; not a batched ONNX call (one session run per
    /// item), but lets a caller amortize the async overhead of a single
    /// read-lock acquisition reasoning step.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Whether a model is currently loaded.
    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.is_some()
    }
}

impl Default for EmbeddingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Attention-masked mean pooling across the sequence axis, then L2
/// normalization. Returns the pooled vector as-is (no division) when the
/// mask selects nothing or the resulting vector is all-zero.
fn mean_pool_and_normalize(data: &[f32], attention_mask: &[i64], seq_len: usize, hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;
    for (i, &mask) in attention_mask.iter().enumerate().take(seq_len) {
        if mask == 1 {
            count += 1.0;
            let offset = i * hidden_dim;
            for j in 0..hidden_dim {
                pooled[j] += data[offset + j];
            }
        }
    }
    if count > 0.0 {
        for v in &mut pooled {
            *v /= count;
        }
    }
    l2_normalize(pooled)
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Cosine similarity between two vectors; returns `0.0` for mismatched
/// lengths or zero vectors rather than failing (spec.md §4.1).
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let v = l2_normalize(vec![1.0, 2.0, 3.0]);
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_mismatched_lengths() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_handles_zero_vector() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn mean_pool_ignores_masked_positions() {
        // hidden_dim = 2, seq_len = 3, only position 0 and 2 attended.
        let data = vec![2.0, 4.0, 100.0, 100.0, 6.0, 8.0];
        let mask = vec![1, 0, 1];
        let pooled = mean_pool_and_normalize(&data, &mask, 3, 2);
        // mean of (2,4) and (6,8) = (4,6), then L2-normalized.
        let expected = l2_normalize(vec![4.0, 6.0]);
        for (a, b) in pooled.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn mean_pool_of_all_masked_out_is_zero_vector_not_nan() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let mask = vec![0, 0];
        let pooled = mean_pool_and_normalize(&data, &mask, 2, 2);
        assert_eq!(pooled, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn embed_before_initialize_errors_shut_down() {
        let engine = EmbeddingEngine::new();
        let result = engine.embed("hello").await;
        assert!(matches!(result, Err(EmbeddingError::ShutDown)));
    }

    #[tokio::test]
    async fn shutdown_disables_further_calls() {
        let engine = EmbeddingEngine::new();
        assert!(!engine.is_initialized().await);
        engine.shutdown().await;
        assert!(engine.embed("hi").await.is_err());
    }
}
