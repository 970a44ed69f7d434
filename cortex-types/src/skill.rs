//! Skill and cache-entry data shapes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A loaded skill definition (spec.md §3, §4.3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    /// Stable ID: the base name of the directory that contained `SKILL.md`.
    pub id: String,
    /// Human-readable name from the frontmatter.
    pub name: String,
    /// Free-form description from the frontmatter; this is what gets
    /// embedded and matched against.
    pub description: String,
    /// Required capability tag, e.g. `"coding"`.
    pub required_capability: String,
    /// Full file content (including the frontmatter), used verbatim as the
    /// system prompt.
    pub system_prompt: String,
    /// 384-float description embedding, or empty when no embedding engine
    /// was available at load time.
    pub embedding: Vec<f32>,
    /// Usage counter, incremented each time this skill wins a match.
    pub usage_count: u64,
}

/// A cached routing decision, keyed by exact query string and ordered by an
/// LRU discipline (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The original query string.
    pub query: String,
    /// The query's embedding, used for similarity lookup.
    pub embedding: Vec<f32>,
    /// Serialized decision (the cache stores the decision as a string
    /// payload so cache and decision-serialization concerns stay decoupled;
    /// `cortex-cache` deserializes it back into a `RoutingDecision`).
    pub decision_json: String,
    /// Metadata carried alongside the entry.
    pub metadata: HashMap<String, String>,
    /// Insertion time, Unix epoch millis.
    pub inserted_at_ms: i64,
}
