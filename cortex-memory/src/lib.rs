//! Per-user memory store: preferences, routing history, provider quirks,
//! and analytics (spec.md §4.7).

pub mod store;

pub use store::{MemoryError, MemoryStore, RetentionPolicy};
