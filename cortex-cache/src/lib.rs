//! Semantic cache of past routing decisions (spec.md §4.4).

pub mod lru_cache;

pub use lru_cache::{CacheMetrics, SemanticCache};
