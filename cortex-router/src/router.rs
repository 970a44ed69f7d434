//! Cortex router glue (spec.md §4.11): orchestrates the cache and the three
//! classifier tiers, applies memory, and records outcomes.

use crate::consensus::ConsensusVerifier;
use crate::scorer::ConfidenceScorer;
use crate::tiers::cognitive::CognitiveTier;
use crate::tiers::semantic::SemanticTier;
use crate::tiers::reflex;
use chrono::{DateTime, Timelike, Utc};
use cortex_cache::SemanticCache;
use cortex_embedding::EmbeddingEngine;
use cortex_memory::MemoryStore;
use cortex_skills::SkillRegistry;
use cortex_types::{
    hash_api_key, hash_body, CacheEntry, Complexity, PrivacyTag, RoutingDecision, RoutingOutcome,
    RoutingRequest, Tier,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Number of trailing user-role messages joined into the query string when
/// the request carries a conversation instead of raw `content` (spec.md
/// §4.11 step 2 names "last-k" without fixing k; five keeps enough context
/// for classification without unbounded growth on long conversations).
const LAST_K_USER_MESSAGES: usize = 5;

/// How many of a caller's history entries feed the peak-hours boost
/// (SPEC_FULL.md Open Question resolution). Large enough to span the
/// 90-day default retention window for a moderately active caller.
const PEAK_HOUR_HISTORY_LIMIT: usize = 2_000;
const PEAK_HOUR_MIN_HISTORY: usize = 8;
const PEAK_HOUR_BOOST: f32 = 0.05;

/// Orchestrates the semantic cache, the Reflex/Semantic/Cognitive tiers,
/// the skill registry, and the memory store to answer `route` calls
/// (spec.md §4.11).
pub struct CortexRouter {
    config: cortex_types::IntelligenceConfig,
    cache: Arc<SemanticCache>,
    embedding_engine: Arc<EmbeddingEngine>,
    skills: Arc<SkillRegistry>,
    semantic_tier: Option<SemanticTier>,
    cognitive_tier: CognitiveTier,
    memory: Arc<MemoryStore>,
    scorer: Arc<ConfidenceScorer>,
    consensus: Arc<ConsensusVerifier>,
    plugin_kv: RwLock<HashMap<String, String>>,
}

impl CortexRouter {
    /// Assembles a router from its already-constructed components. Nothing
    /// here performs I/O; model loading, skill directory walks, and cache
    /// sizing all happen before this call.
    pub fn new(
        config: cortex_types::IntelligenceConfig,
        cache: Arc<SemanticCache>,
        embedding_engine: Arc<EmbeddingEngine>,
        skills: Arc<SkillRegistry>,
        semantic_tier: Option<SemanticTier>,
        cognitive_tier: CognitiveTier,
        memory: Arc<MemoryStore>,
        scorer: Arc<ConfidenceScorer>,
    ) -> Self {
        Self {
            config,
            cache,
            embedding_engine,
            skills,
            semantic_tier,
            cognitive_tier,
            memory,
            scorer,
            consensus: Arc::new(ConsensusVerifier::new()),
            plugin_kv: RwLock::new(HashMap::new()),
        }
    }

    /// Routes one request through the cache, tiers, and memory, always
    /// producing a decision (spec.md §4.11).
    pub async fn route(&self, request: RoutingRequest, cancel: CancellationToken) -> RoutingDecision {
        let started = Instant::now();
        let api_key_hash = hash_api_key(&request.api_key);

        if request.is_bypass() {
            return RoutingDecision {
                api_key_hash,
                request_hash: hash_body(request.content.as_deref().unwrap_or_default()),
                timestamp_ms: Utc::now().timestamp_millis(),
                intent: "bypass".to_string(),
                complexity: Complexity::Unknown,
                privacy: PrivacyTag::None,
                selected_model: request.model.clone(),
                tier: Tier::Bypass,
                confidence: 1.0,
                latency_ms: elapsed_ms(started),
                used_memory: false,
                system_prompt: None,
            };
        }

        if cancel.is_cancelled() {
            return self.cancelled_decision(api_key_hash, &request, started);
        }

        let query = request.extract_query(LAST_K_USER_MESSAGES);
        let request_hash = hash_body(&query);

        let query_embedding = match self.embedding_engine.embed(&query).await {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("embedding unavailable, cache and semantic tier disabled for this request: {e}");
                None
            }
        };

        if let Some(embedding) = &query_embedding {
            if let Some(cached_json) = self.cache.lookup(embedding).await {
                match serde_json::from_str::<RoutingDecision>(&cached_json) {
                    Ok(mut decision) => {
                        decision.tier = Tier::Cache;
                        decision.used_memory = false;
                        decision.latency_ms = elapsed_ms(started);
                        self.memory.record(decision.clone());
                        log::debug!("cache hit for key {api_key_hash}");
                        return decision;
                    }
                    Err(e) => log::warn!("cache entry for {request_hash} failed to deserialize: {e}"),
                }
            }
        }

        let (intent, complexity, privacy, mut confidence, tier) =
            self.classify(&query, &query_embedding, &cancel).await;

        let system_prompt = match &query_embedding {
            Some(embedding) => self.skills.match_skill(embedding).await.map(|s| s.system_prompt),
            None => None,
        };

        let mut selected_model = if privacy == PrivacyTag::Pii {
            self.config.pii_local_model.clone()
        } else {
            self.config
                .matrix
                .lookup(&intent, complexity.as_wire_str())
                .map(str::to_string)
                .unwrap_or_else(|| self.config.router_fallback_model.clone())
        };

        let mut used_memory = false;
        let prefs = self.memory.get_preferences(&api_key_hash);
        if privacy != PrivacyTag::Pii {
            if let Some(preferred) = prefs.model_preferences.get(&intent) {
                selected_model = preferred.clone();
                used_memory = true;
            }
        }

        let provider = selected_model.split(':').next().unwrap_or(&selected_model);
        if let Some(&bias) = prefs.provider_bias.get(provider) {
            if bias != 0.0 {
                confidence += bias.clamp(-0.1, 0.1);
                used_memory = true;
            }
        }

        let history = self.memory.get_history(&api_key_hash, PEAK_HOUR_HISTORY_LIMIT);
        if peak_hour_boost(&history, Utc::now()) > 0.0 {
            confidence += PEAK_HOUR_BOOST;
            used_memory = true;
        }

        let mut decision = RoutingDecision {
            api_key_hash: api_key_hash.clone(),
            request_hash,
            timestamp_ms: Utc::now().timestamp_millis(),
            intent,
            complexity,
            privacy,
            selected_model,
            tier,
            confidence,
            latency_ms: elapsed_ms(started),
            used_memory,
            system_prompt,
        };
        decision.clamp_confidence();

        if let Some(embedding) = &query_embedding {
            match serde_json::to_string(&decision) {
                Ok(decision_json) => {
                    self.cache
                        .store(CacheEntry {
                            query,
                            embedding: embedding.clone(),
                            decision_json,
                            metadata: HashMap::new(),
                            inserted_at_ms: decision.timestamp_ms,
                        })
                        .await;
                }
                Err(e) => log::warn!("failed to serialize decision for caching: {e}"),
            }
        }

        self.memory.record(decision.clone());
        decision
    }

    /// Runs Reflex, then Semantic (if injected and the query cleared
    /// threshold), then Cognitive, short-circuiting on the first verdict
    /// (spec.md §4.11 steps 5-7).
    async fn classify(
        &self,
        query: &str,
        query_embedding: &Option<Vec<f32>>,
        cancel: &CancellationToken,
    ) -> (String, Complexity, PrivacyTag, f32, Tier) {
        if let Some(verdict) = reflex::classify(query) {
            return (verdict.intent, verdict.complexity, verdict.privacy, verdict.confidence, Tier::Reflex);
        }

        let mut semantic_best_guess = None;
        if let (Some(tier), Some(embedding)) = (&self.semantic_tier, query_embedding) {
            if let Some(verdict) = tier.classify_embedding(embedding, Instant::now()) {
                // Semantic verdicts carry no complexity signal; "medium" is a
                // deliberate default for this intermediate tier (no stronger
                // signal exists until the Cognitive tier runs).
                return (verdict.intent, Complexity::Medium, PrivacyTag::None, verdict.confidence, Tier::Semantic);
            }
            semantic_best_guess = tier.best_guess(embedding).map(str::to_string);
        }

        let cognitive_verdict = self.cognitive_tier.classify(query, cancel).await;
        if let Some(best_guess) = semantic_best_guess {
            self.consensus.record(&best_guess, &cognitive_verdict.intent);
        }
        (cognitive_verdict.intent, cognitive_verdict.complexity, PrivacyTag::None, cognitive_verdict.confidence, Tier::Cognitive)
    }

    fn cancelled_decision(&self, api_key_hash: String, request: &RoutingRequest, started: Instant) -> RoutingDecision {
        RoutingDecision {
            api_key_hash,
            request_hash: hash_body(request.content.as_deref().unwrap_or_default()),
            timestamp_ms: Utc::now().timestamp_millis(),
            intent: "cancelled".to_string(),
            complexity: Complexity::Unknown,
            privacy: PrivacyTag::None,
            selected_model: self.config.router_fallback_model.clone(),
            tier: Tier::Cancelled,
            confidence: 0.0,
            latency_ms: elapsed_ms(started),
            used_memory: false,
            system_prompt: None,
        }
    }

    /// Applies a reported outcome: computes quality, updates the caller's
    /// learned preferences and bias (spec.md §4.11 `record_outcome`).
    pub fn record_outcome(&self, decision: &RoutingDecision, outcome: RoutingOutcome) {
        self.memory.learn_from_outcome(decision, &outcome);
    }

    /// Rolling confidence distribution seen by the Cognitive tier so far.
    pub fn confidence_distribution(&self) -> crate::scorer::ConfidenceDistribution {
        self.scorer.distribution()
    }

    /// Agreement rate between Semantic and Cognitive verdicts when both ran
    /// for the same request.
    pub fn consensus_agreement_rate(&self) -> f64 {
        self.consensus.agreement_rate()
    }

    pub(crate) fn config(&self) -> &cortex_types::IntelligenceConfig {
        &self.config
    }

    pub(crate) async fn plugin_lookup(&self, key: &str) -> Option<String> {
        self.plugin_kv.read().await.get(key).cloned()
    }

    pub(crate) async fn plugin_store(&self, key: String, value: String) {
        self.plugin_kv.write().await.insert(key, value);
    }

    pub(crate) async fn cache_metrics(&self) -> cortex_cache::CacheMetrics {
        self.cache.metrics().await
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Computes the SPEC_FULL.md-resolved peak-hours boost: `+0.05` when the
/// current UTC hour falls in the top quartile of the caller's decision
/// counts by hour-of-day, and the caller has at least
/// [`PEAK_HOUR_MIN_HISTORY`] recorded decisions; `0.0` otherwise.
fn peak_hour_boost(history: &[RoutingDecision], now: DateTime<Utc>) -> f32 {
    if history.len() < PEAK_HOUR_MIN_HISTORY {
        return 0.0;
    }

    let mut counts = [0u32; 24];
    for decision in history {
        if let Some(dt) = DateTime::from_timestamp_millis(decision.timestamp_ms) {
            counts[dt.hour() as usize] += 1;
        }
    }

    let mut sorted = counts;
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let quartile_threshold = sorted[5]; // top 6 of 24 hours = top quartile

    let current_hour = now.hour() as usize;
    if counts[current_hour] > 0 && counts[current_hour] >= quartile_threshold {
        PEAK_HOUR_BOOST
    } else {
        0.0
    }
}
