//! Cortex router: confidence scoring, consensus verification, the
//! Reflex/Semantic/Cognitive tiers, the router glue that orchestrates them,
//! and the plugin-facing facade (spec.md §4.5-§4.6, §4.8-§4.11, §9).

pub mod consensus;
pub mod plugin;
pub mod router;
pub mod scorer;
pub mod tiers;

pub use consensus::ConsensusVerifier;
pub use plugin::RouterFacade;
pub use router::CortexRouter;
pub use scorer::{ClassifierVerdict, ConfidenceDistribution, ConfidenceScorer, ScorerError};
pub use tiers::{CognitiveTier, ReflexVerdict, RouterModelClient, RouterModelError, SemanticTier, SemanticVerdict};
