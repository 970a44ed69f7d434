//! Top-level error aggregation.
//!
//! Each crate defines its own narrow `thiserror` enum at its public boundary
//! (`EmbeddingError`, `SkillError`, `CacheError`, ...). `CortexError`
//! exists only for callers that want a single type to match on; the router
//! itself matches on the narrow per-component errors so it can apply the
//! graceful-degradation policy in spec.md §7.

use thiserror::Error;

/// Aggregate error type for callers outside the router that don't need to
/// distinguish which component failed.
#[derive(Error, Debug)]
pub enum CortexError {
    /// Startup-time configuration was invalid. Fatal; never returned from
    /// a `route` call.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// An embedding or router model is missing or failed to load. The
    /// affected tier disables itself rather than failing the request.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// A transient per-call inference failure. The tier emits no verdict.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// The classifier returned something that didn't parse as the expected
    /// JSON contract.
    #[error("failed to parse classifier output: {0}")]
    ParseError(String),

    /// The memory store's backing storage is unavailable; preferences fall
    /// back to an in-memory read-only cache.
    #[error("memory store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller cancelled the in-flight request.
    #[error("request cancelled")]
    Cancelled,
}
