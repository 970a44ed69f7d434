//! Consensus verifier (spec.md §4.6): compares intent verdicts from
//! different tiers and exposes an agreement rate.

use parking_lot::Mutex;

struct Stats {
    comparisons: u64,
    agreements: u64,
}

/// Tracks how often two classifier verdicts agree on intent. The Cognitive
/// tier uses this to measure whether a cheaper tier would have reached the
/// same conclusion.
pub struct ConsensusVerifier {
    stats: Mutex<Stats>,
}

impl ConsensusVerifier {
    /// Creates a verifier with an empty history.
    pub fn new() -> Self {
        Self { stats: Mutex::new(Stats { comparisons: 0, agreements: 0 }) }
    }

    /// Records whether `a` and `b` name the same intent, returning that
    /// boolean.
    pub fn record(&self, a: &str, b: &str) -> bool {
        let agree = a == b;
        let mut stats = self.stats.lock();
        stats.comparisons += 1;
        if agree {
            stats.agreements += 1;
        }
        agree
    }

    /// `agreements / comparisons`, `0.0` with no recorded comparisons.
    pub fn agreement_rate(&self) -> f64 {
        let stats = self.stats.lock();
        if stats.comparisons == 0 {
            0.0
        } else {
            stats.agreements as f64 / stats.comparisons as f64
        }
    }
}

impl Default for ConsensusVerifier {
    fn default() -> Self {
        Self::new()
    }
}
