//! Similarity-indexed LRU cache of past routing decisions (spec.md §4.4).
//!
//! Lookup and the LRU promotion it can trigger are a single write-locked
//! critical section, not a read-lock-then-upgrade-to-write dance: spec.md
//! §9 calls the latter out as "the one correctness trap" in this
//! component, and the upgrade can race another writer between the release
//! and re-acquire. A plain `RwLock` write lock for any operation that might
//! mutate LRU order sidesteps the race entirely.

use cortex_embedding::cosine;
use cortex_types::CacheEntry;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;

/// A slot in the intrusive doubly-linked LRU list.
struct Node {
    entry: CacheEntry,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner {
    map: HashMap<String, usize>,
    slots: Vec<Option<Node>>,
    free_slots: Vec<usize>,
    head: Option<usize>, // most recently used
    tail: Option<usize>, // least recently used
    hits: u64,
    misses: u64,
    evictions: u64,
    hit_latency_sum_micros: u64,
    lookup_latency_sum_micros: u64,
    lookup_count: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            head: None,
            tail: None,
            hits: 0,
            misses: 0,
            evictions: 0,
            hit_latency_sum_micros: 0,
            lookup_latency_sum_micros: 0,
            lookup_count: 0,
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slots[idx].as_ref().unwrap();
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.slots[idx].as_mut().unwrap();
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.slots[h].as_mut().unwrap().prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn promote(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn evict_tail(&mut self) {
        let Some(tail) = self.tail else { return };
        self.unlink(tail);
        if let Some(node) = self.slots[tail].take() {
            self.map.remove(&node.entry.query);
        }
        self.free_slots.push(tail);
        self.evictions += 1;
    }

    fn alloc_slot(&mut self, node: Node) -> usize {
        if let Some(idx) = self.free_slots.pop() {
            self.slots[idx] = Some(node);
            idx
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        }
    }
}

/// Point-in-time metrics snapshot (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheMetrics {
    /// Total hits.
    pub hits: u64,
    /// Total misses.
    pub misses: u64,
    /// Total evictions.
    pub evictions: u64,
    /// Current entry count.
    pub size: usize,
    /// Average hit-path latency in milliseconds.
    pub avg_hit_latency_ms: f64,
    /// Average lookup latency (hits and misses) in milliseconds.
    pub avg_lookup_latency_ms: f64,
    /// `hits / (hits + misses)`, `0.0` when there have been no lookups.
    pub hit_rate: f64,
}

/// Semantic cache over past routing decisions, keyed by exact query string
/// for storage dedup and searched by cosine similarity for lookup.
pub struct SemanticCache {
    inner: RwLock<Inner>,
    max_entries: usize,
    similarity_threshold: f32,
}

impl SemanticCache {
    /// Creates an empty cache with the given capacity and similarity
    /// threshold (spec.md §3 defaults: 10,000 entries, 0.95 threshold).
    pub fn new(max_entries: usize, similarity_threshold: f32) -> Self {
        Self { inner: RwLock::new(Inner::new()), max_entries, similarity_threshold }
    }

    /// Looks up `query_embedding` against all cached entries, returning the
    /// highest-similarity entry's decision JSON if it clears the
    /// similarity threshold. Promotes a hit to MRU.
    pub async fn lookup(&self, query_embedding: &[f32]) -> Option<String> {
        let started = Instant::now();
        let mut inner = self.inner.write().await;

        let mut best: Option<(usize, f32)> = None;
        let mut idx = inner.head;
        while let Some(i) = idx {
            let sim = {
                let node = inner.slots[i].as_ref().unwrap();
                cosine(query_embedding, &node.entry.embedding)
            };
            if sim >= self.similarity_threshold && best.map(|(_, b)| sim > b).unwrap_or(true) {
                best = Some((i, sim));
            }
            idx = inner.slots[i].as_ref().unwrap().next;
        }

        let elapsed_micros = started.elapsed().as_micros() as u64;
        inner.lookup_latency_sum_micros += elapsed_micros;
        inner.lookup_count += 1;

        match best {
            Some((i, _)) => {
                inner.promote(i);
                inner.hits += 1;
                inner.hit_latency_sum_micros += elapsed_micros;
                let decision = inner.slots[i].as_ref().unwrap().entry.decision_json.clone();
                Some(decision)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Stores a decision under `entry.query`, deduping on exact key (a
    /// repeat store for the same query replaces the decision and counts as
    /// one entry, per spec.md §8) and evicting the LRU tail when at
    /// capacity.
    pub async fn store(&self, entry: CacheEntry) {
        let mut inner = self.inner.write().await;

        if let Some(&existing) = inner.map.get(&entry.query) {
            inner.slots[existing].as_mut().unwrap().entry = entry;
            inner.promote(existing);
            return;
        }

        if inner.len() >= self.max_entries {
            inner.evict_tail();
        }

        let query = entry.query.clone();
        let idx = inner.alloc_slot(Node { entry, prev: None, next: None });
        inner.push_front(idx);
        inner.map.insert(query, idx);
    }

    /// Current entry count.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the cache currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Metrics snapshot.
    pub async fn metrics(&self) -> CacheMetrics {
        let inner = self.inner.read().await;
        let total = inner.hits + inner.misses;
        let hit_rate = if total == 0 { 0.0 } else { inner.hits as f64 / total as f64 };
        let avg_hit_latency_ms = if inner.hits == 0 {
            0.0
        } else {
            (inner.hit_latency_sum_micros as f64 / inner.hits as f64) / 1000.0
        };
        let avg_lookup_latency_ms = if inner.lookup_count == 0 {
            0.0
        } else {
            (inner.lookup_latency_sum_micros as f64 / inner.lookup_count as f64) / 1000.0
        };
        CacheMetrics {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.len(),
            avg_hit_latency_ms,
            avg_lookup_latency_ms,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap as StdHashMap;

    fn entry(query: &str, embedding: Vec<f32>, decision: &str) -> CacheEntry {
        CacheEntry {
            query: query.to_string(),
            embedding,
            decision_json: decision.to_string(),
            metadata: StdHashMap::new(),
            inserted_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn store_then_lookup_exact_match_hits() {
        let cache = SemanticCache::new(10, 0.95);
        cache.store(entry("apple", vec![1.0, 0.0, 0.0], "decision-a")).await;
        let hit = cache.lookup(&[1.0, 0.0, 0.0]).await;
        assert_eq!(hit, Some("decision-a".to_string()));
        assert_eq!(cache.metrics().await.hits, 1);
    }

    #[tokio::test]
    async fn lookup_below_threshold_misses() {
        let cache = SemanticCache::new(10, 0.95);
        cache.store(entry("apple", vec![1.0, 0.0, 0.0], "decision-a")).await;
        let hit = cache.lookup(&[0.0, 1.0, 0.0]).await;
        assert_eq!(hit, None);
        assert_eq!(cache.metrics().await.misses, 1);
    }

    #[tokio::test]
    async fn storing_same_query_twice_dedupes_to_one_entry_with_newer_decision() {
        let cache = SemanticCache::new(10, 0.95);
        cache.store(entry("apple", vec![1.0, 0.0, 0.0], "decision-1")).await;
        cache.store(entry("apple", vec![1.0, 0.0, 0.0], "decision-2")).await;
        assert_eq!(cache.len().await, 1);
        let hit = cache.lookup(&[1.0, 0.0, 0.0]).await;
        assert_eq!(hit, Some("decision-2".to_string()));
    }

    #[tokio::test]
    async fn capacity_three_evicts_one_on_fourth_insert() {
        let cache = SemanticCache::new(3, 0.95);
        cache.store(entry("apple", vec![1.0, 0.0, 0.0], "a")).await;
        cache.store(entry("banana", vec![0.0, 1.0, 0.0], "b")).await;
        cache.store(entry("cherry", vec![0.0, 0.0, 1.0], "c")).await;
        cache.store(entry("date", vec![0.5, 0.5, 0.0], "d")).await;

        assert_eq!(cache.len().await, 3);
        assert_eq!(cache.metrics().await.evictions, 1);
    }

    #[tokio::test]
    async fn lru_eviction_removes_least_recently_used() {
        let cache = SemanticCache::new(2, 0.99);
        cache.store(entry("apple", vec![1.0, 0.0], "a")).await;
        cache.store(entry("banana", vec![0.0, 1.0], "b")).await;
        // Touch "apple" so "banana" becomes the LRU entry.
        let _ = cache.lookup(&[1.0, 0.0]).await;
        cache.store(entry("cherry", vec![0.1, 0.0], "c")).await;

        assert_eq!(cache.len().await, 2);
        // banana's exact embedding should no longer be present.
        let hit = cache.lookup(&[0.0, 1.0]).await;
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn hit_rate_is_hits_over_total() {
        let cache = SemanticCache::new(10, 0.95);
        cache.store(entry("apple", vec![1.0, 0.0], "a")).await;
        let _ = cache.lookup(&[1.0, 0.0]).await; // hit
        let _ = cache.lookup(&[0.0, 1.0]).await; // miss
        let metrics = cache.metrics().await;
        assert_eq!(metrics.hit_rate, 0.5);
    }
}
