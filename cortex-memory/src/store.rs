//! Per-user memory store: preferences, routing history, provider quirks,
//! and analytics (spec.md §4.7).
//!
//! Locking is per-key: `dashmap` shards the map so two callers touching
//! different API-key hashes never contend, while `record_outcome` calls
//! for the *same* key hash are naturally serialized by the shard lock
//! `dashmap` already takes internally (spec.md §5: "the memory store
//! serializes writes per key").

use chrono::Utc;
use cortex_types::{
    AnalyticsSummary, ModelRollup, ProviderQuirk, RoutingDecision, RoutingOutcome, UserPreferences,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors surfaced by the memory store. Per spec.md §7, a `StoreUnavailable`
/// never fails a route; it only degrades preference writes to an
/// in-memory-only cache.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The backing persistence layer could not be written to.
    #[error("memory store persistence unavailable: {0}")]
    StoreUnavailable(String),
}

/// Configuration the store needs that isn't part of `IntelligenceConfig`
/// directly (kept separate so `cortex-memory` doesn't need the whole
/// config type just for two numbers).
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Days of history to retain before `cleanup()` drops a record.
    pub feedback_retention_days: u32,
    /// Minimum prior observations before `learn_from_outcome` will act.
    pub learning_min_sample_size: u32,
    /// Confidence/quality threshold above which a success drives learning.
    pub learning_confidence_threshold: f32,
}

/// In-memory store of per-caller preferences, decision history, provider
/// quirks, and analytics roll-ups. A durable backend can wrap this store
/// and call [`MemoryStore::mark_degraded`] when a write fails without
/// losing the in-memory view.
pub struct MemoryStore {
    preferences: DashMap<String, UserPreferences>,
    history: DashMap<String, Vec<RoutingDecision>>,
    quirks: DashMap<String, Vec<ProviderQuirk>>,
    rollups: DashMap<String, ModelRollup>,
    policy: RetentionPolicy,
    store_unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store with the given retention policy.
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            preferences: DashMap::new(),
            history: DashMap::new(),
            quirks: DashMap::new(),
            rollups: DashMap::new(),
            policy,
            store_unavailable: AtomicBool::new(false),
        }
    }

    /// Whether the last persistence attempt failed. Preferences remain
    /// readable and writable in-memory regardless; this only informs
    /// callers who want to surface a degraded-mode signal.
    pub fn is_degraded(&self) -> bool {
        self.store_unavailable.load(Ordering::Relaxed)
    }

    /// Flags the store as running without a durable backend. Preferences
    /// and history stay fully readable and writable in-memory; only
    /// `is_degraded()` changes for callers who want to surface the signal.
    pub fn mark_degraded(&self) {
        if !self.store_unavailable.swap(true, Ordering::Relaxed) {
            log::warn!("memory store persistence unavailable; continuing in-memory only");
        }
    }

    /// Appends a decision to its caller's history, honoring the retention
    /// window (older entries are dropped opportunistically on write).
    pub fn record(&self, decision: RoutingDecision) {
        let cutoff_ms = Self::retention_cutoff_ms(self.policy.feedback_retention_days);
        let mut entry = self.history.entry(decision.api_key_hash.clone()).or_default();
        entry.push(decision);
        entry.retain(|d| d.timestamp_ms >= cutoff_ms);
    }

    fn retention_cutoff_ms(days: u32) -> i64 {
        Utc::now().timestamp_millis() - i64::from(days) * 24 * 60 * 60 * 1000
    }

    /// Returns the stored preferences for `api_key_hash`, or a fresh
    /// zero-valued record. Never fails (spec.md §4.7).
    pub fn get_preferences(&self, api_key_hash: &str) -> UserPreferences {
        self.preferences
            .get(api_key_hash)
            .map(|p| p.clone())
            .unwrap_or_else(|| UserPreferences::fresh(api_key_hash))
    }

    /// Upserts a preferences record.
    pub fn update_preferences(&self, mut prefs: UserPreferences) {
        prefs.last_updated_ms = Utc::now().timestamp_millis();
        self.preferences.insert(prefs.api_key_hash.clone(), prefs);
    }

    /// Applies a reported outcome to the caller's learned preferences
    /// (spec.md §4.7):
    ///
    /// - on success whose quality clears `learning_confidence_threshold`
    ///   *and* the caller already has at least `learning_min_sample_size`
    ///   prior decisions, the winning model becomes the intent's preferred
    ///   model and the provider's bias nudges toward `+0.1`;
    /// - on failure, the provider's bias nudges toward `-0.1` unconditionally.
    pub fn learn_from_outcome(&self, decision: &RoutingDecision, outcome: &RoutingOutcome) {
        self.update_rollup(decision, outcome);

        let provider = decision.selected_model.split(':').next().unwrap_or(&decision.selected_model);
        let mut prefs = self.get_preferences(&decision.api_key_hash);

        if outcome.success {
            let quality = outcome.quality_score();
            let prior_count = self.history.get(&decision.api_key_hash).map(|h| h.len()).unwrap_or(0);
            if quality >= self.policy.learning_confidence_threshold
                && prior_count as u32 >= self.policy.learning_min_sample_size
            {
                prefs
                    .model_preferences
                    .insert(decision.intent.clone(), decision.selected_model.clone());
                prefs.nudge_provider_bias(provider, 0.1);
                self.update_preferences(prefs);
            }
        } else {
            prefs.nudge_provider_bias(provider, -0.1);
            self.update_preferences(prefs);
        }
    }

    fn update_rollup(&self, decision: &RoutingDecision, outcome: &RoutingOutcome) {
        let mut rollup = self.rollups.entry(decision.selected_model.clone()).or_default();
        let n = rollup.count as f32;
        let quality = outcome.quality_score();
        rollup.mean_latency_ms = (rollup.mean_latency_ms * n + outcome.response_time_ms as f32) / (n + 1.0);
        rollup.mean_quality = (rollup.mean_quality * n + quality) / (n + 1.0);
        let successes_so_far = rollup.success_rate * n;
        let successes = successes_so_far + if outcome.success { 1.0 } else { 0.0 };
        rollup.count += 1;
        rollup.success_rate = successes / rollup.count as f32;
    }

    /// Most recent decisions for one caller, newest first, capped at `limit`.
    pub fn get_history(&self, api_key_hash: &str, limit: usize) -> Vec<RoutingDecision> {
        self.history
            .get(api_key_hash)
            .map(|h| {
                let mut v: Vec<RoutingDecision> = h.clone();
                v.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
                v.truncate(limit);
                v
            })
            .unwrap_or_default()
    }

    /// Most recent decisions across all callers, newest first, capped at
    /// `limit`.
    pub fn get_all_history(&self, limit: usize) -> Vec<RoutingDecision> {
        let mut all: Vec<RoutingDecision> =
            self.history.iter().flat_map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        all.truncate(limit);
        all
    }

    /// Records a known-bad provider behavior.
    pub fn record_quirk(&self, quirk: ProviderQuirk) {
        self.quirks.entry(quirk.provider.clone()).or_default().push(quirk);
    }

    /// All recorded quirks for a provider.
    pub fn get_quirks(&self, provider: &str) -> Vec<ProviderQuirk> {
        self.quirks.get(provider).map(|q| q.clone()).unwrap_or_default()
    }

    /// Builds a fresh analytics summary from the running per-model
    /// roll-ups.
    pub fn compute_analytics(&self) -> AnalyticsSummary {
        let by_model = self.rollups.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
        AnalyticsSummary { by_model, computed_at_ms: Utc::now().timestamp_millis() }
    }

    /// Drops history records past the retention window for every caller.
    pub fn cleanup(&self) {
        let cutoff_ms = Self::retention_cutoff_ms(self.policy.feedback_retention_days);
        for mut entry in self.history.iter_mut() {
            entry.value_mut().retain(|d| d.timestamp_ms >= cutoff_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_types::{Complexity, PrivacyTag, Tier};
    use pretty_assertions::assert_eq;

    fn policy() -> RetentionPolicy {
        RetentionPolicy { feedback_retention_days: 90, learning_min_sample_size: 2, learning_confidence_threshold: 0.85 }
    }

    fn decision(hash: &str, intent: &str, model: &str, ts: i64) -> RoutingDecision {
        RoutingDecision {
            api_key_hash: hash.to_string(),
            request_hash: "r".into(),
            timestamp_ms: ts,
            intent: intent.to_string(),
            complexity: Complexity::Complex,
            privacy: PrivacyTag::None,
            selected_model: model.to_string(),
            tier: Tier::Reflex,
            confidence: 0.9,
            latency_ms: 5,
            used_memory: false,
            system_prompt: None,
        }
    }

    fn outcome(success: bool, rt_ms: u64) -> RoutingOutcome {
        RoutingOutcome { request_hash: "r".into(), success, response_time_ms: rt_ms, error: None }
    }

    #[test]
    fn get_preferences_never_fails_for_unknown_key() {
        let store = MemoryStore::new(policy());
        let prefs = store.get_preferences("sha256:nope");
        assert!(prefs.model_preferences.is_empty());
    }

    #[test]
    fn learn_from_outcome_sets_model_preference_after_enough_history() {
        let store = MemoryStore::new(policy());
        let now = Utc::now().timestamp_millis();
        store.record(decision("sha256:u1", "coding", "claude:sonnet", now));
        store.record(decision("sha256:u1", "coding", "claude:sonnet", now));

        let d = decision("sha256:u1", "coding", "claude:sonnet", now);
        store.learn_from_outcome(&d, &outcome(true, 2000));

        let prefs = store.get_preferences("sha256:u1");
        assert_eq!(prefs.model_preferences.get("coding"), Some(&"claude:sonnet".to_string()));
    }

    #[test]
    fn learn_from_outcome_does_nothing_below_sample_size() {
        let store = MemoryStore::new(policy());
        let d = decision("sha256:u2", "coding", "claude:sonnet", Utc::now().timestamp_millis());
        store.learn_from_outcome(&d, &outcome(true, 2000));

        let prefs = store.get_preferences("sha256:u2");
        assert!(prefs.model_preferences.get("coding").is_none());
    }

    #[test]
    fn learn_from_outcome_nudges_bias_down_on_failure_regardless_of_sample_size() {
        let store = MemoryStore::new(policy());
        let d = decision("sha256:u3", "coding", "claude:sonnet", Utc::now().timestamp_millis());
        store.learn_from_outcome(&d, &outcome(false, 30_000));

        let prefs = store.get_preferences("sha256:u3");
        assert!(prefs.provider_bias["claude"] < 0.0);
    }

    #[test]
    fn get_history_orders_newest_first_and_respects_limit() {
        let store = MemoryStore::new(policy());
        store.record(decision("sha256:u4", "chat", "m", 100));
        store.record(decision("sha256:u4", "chat", "m", 300));
        store.record(decision("sha256:u4", "chat", "m", 200));

        let history = store.get_history("sha256:u4", 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp_ms, 300);
        assert_eq!(history[1].timestamp_ms, 200);
    }

    #[test]
    fn compute_analytics_aggregates_by_model() {
        let store = MemoryStore::new(policy());
        let d = decision("sha256:u5", "chat", "openai:gpt-4o", Utc::now().timestamp_millis());
        store.learn_from_outcome(&d, &outcome(true, 500));
        store.learn_from_outcome(&d, &outcome(false, 1000));

        let analytics = store.compute_analytics();
        let rollup = &analytics.by_model["openai:gpt-4o"];
        assert_eq!(rollup.count, 2);
        assert!((rollup.success_rate - 0.5).abs() < 1e-6);
    }
}
