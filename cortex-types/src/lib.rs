//! Shared data model for the Cortex router.
//!
//! Every other crate in this workspace depends on `cortex-types` for its
//! request/decision/outcome shapes and for the validated configuration value
//! the router is handed at construction time. Nothing in this crate touches
//! the filesystem or the network; it is pure data plus the small amount of
//! arithmetic (quality score, confidence clamping) that several components
//! need to agree on.

pub mod config;
pub mod decision;
pub mod error;
pub mod memory;
pub mod request;
pub mod skill;

pub use config::IntelligenceConfig;
pub use decision::{Complexity, PrivacyTag, RoutingDecision, RoutingOutcome, Tier};
pub use error::CortexError;
pub use memory::{AnalyticsSummary, ModelRollup, ProviderQuirk, QuirkSeverity, UserPreferences};
pub use request::{ChatMessage, RoutingRequest};
pub use skill::{CacheEntry, Skill};

/// Hashes an API key into the `sha256:<hex>` form used everywhere a caller
/// identity needs to be stored or logged without retaining the secret.
pub fn hash_api_key(api_key: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

/// Hashes an arbitrary request body for decision correlation.
pub fn hash_body(body: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn api_key_hash_is_stable_and_prefixed() {
        let a = hash_api_key("sk-test-123");
        let b = hash_api_key("sk-test-123");
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
    }

    #[test]
    fn different_keys_hash_differently() {
        assert_ne!(hash_api_key("a"), hash_api_key("b"));
    }
}
