//! Narrow plugin-facing interface onto [`CortexRouter`] (spec.md §9 design
//! note: expose this surface rather than leaking internal structs to
//! whatever embeds the router).

use crate::router::CortexRouter;
use async_trait::async_trait;
use std::collections::HashMap;

/// The surface a host application (or a plugin within it) is expected to
/// depend on instead of `CortexRouter` directly.
#[async_trait]
pub trait RouterFacade: Send + Sync {
    /// All models the matrix and the fixed router/fallback/PII slots can
    /// resolve to.
    async fn get_available_models(&self) -> Vec<String>;

    /// The flattened `(intent[/complexity])` -> model matrix currently in
    /// effect.
    async fn get_current_matrix(&self) -> HashMap<String, String>;

    /// Reads a value from the plugin-facing key/value scratch store.
    async fn lookup(&self, key: &str) -> Option<String>;

    /// Writes a value into the plugin-facing key/value scratch store.
    async fn store(&self, key: String, value: String);

    /// Whether the router is enabled at all.
    async fn is_enabled(&self) -> bool;

    /// Cache, confidence, and consensus metrics as a JSON-friendly map.
    async fn get_metrics_as_map(&self) -> HashMap<String, serde_json::Value>;
}

#[async_trait]
impl RouterFacade for CortexRouter {
    async fn get_available_models(&self) -> Vec<String> {
        let config = self.config();
        let mut models: Vec<String> = config
            .matrix
            .by_intent_and_complexity
            .values()
            .chain(config.matrix.by_intent.values())
            .cloned()
            .collect();
        models.push(config.router_model.clone());
        models.push(config.router_fallback_model.clone());
        models.push(config.pii_local_model.clone());
        models.sort();
        models.dedup();
        models
    }

    async fn get_current_matrix(&self) -> HashMap<String, String> {
        let config = self.config();
        let mut flattened = HashMap::new();
        for (key, model) in &config.matrix.by_intent_and_complexity {
            flattened.insert(key.clone(), model.clone());
        }
        for (intent, model) in &config.matrix.by_intent {
            flattened.insert(intent.clone(), model.clone());
        }
        flattened
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        self.plugin_lookup(key).await
    }

    async fn store(&self, key: String, value: String) {
        self.plugin_store(key, value).await
    }

    async fn is_enabled(&self) -> bool {
        self.config().enabled
    }

    async fn get_metrics_as_map(&self) -> HashMap<String, serde_json::Value> {
        let cache_metrics = self.cache_metrics().await;
        let confidence = self.confidence_distribution();
        let mut map = HashMap::new();
        map.insert("cache_hits".to_string(), cache_metrics.hits.into());
        map.insert("cache_misses".to_string(), cache_metrics.misses.into());
        map.insert("cache_evictions".to_string(), cache_metrics.evictions.into());
        map.insert("cache_size".to_string(), cache_metrics.size.into());
        map.insert("cache_hit_rate".to_string(), cache_metrics.hit_rate.into());
        map.insert("confidence_total".to_string(), confidence.total.into());
        map.insert("confidence_mean".to_string(), confidence.mean.into());
        map.insert("confidence_below_low".to_string(), confidence.below_low.into());
        map.insert("confidence_above_high".to_string(), confidence.above_high.into());
        map.insert("consensus_agreement_rate".to_string(), self.consensus_agreement_rate().into());
        map
    }
}
