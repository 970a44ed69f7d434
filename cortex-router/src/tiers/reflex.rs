//! Reflex tier (spec.md §4.8): cheap, deterministic rules over the
//! extracted query. PII detection always wins; otherwise a small set of
//! lexical buckets covers the obvious cases so the Semantic/Cognitive tiers
//! only run on genuinely ambiguous input.

use cortex_types::{Complexity, PrivacyTag};
use regex::Regex;
use std::sync::OnceLock;

/// A reflex-tier verdict, upgraded to a full `RoutingDecision` by the router
/// (spec.md §4.11 step 8).
#[derive(Debug, Clone)]
pub struct ReflexVerdict {
    /// Classified intent, e.g. `"pii_detected"`, `"chat"`, `"coding"`.
    pub intent: String,
    /// Classified complexity.
    pub complexity: Complexity,
    /// Privacy classification.
    pub privacy: PrivacyTag,
    /// Fixed confidence for this rule.
    pub confidence: f32,
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap())
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\(\d{3}\)\s?\d{3}-\d{4})|(\b\d{3}-\d{3}-\d{4}\b)|(\b\d{3}\.\d{3}\.\d{4}\b)").unwrap()
    })
}

fn ssn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap())
}

fn card_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:\d[ -]?){12,19}\b").unwrap())
}

fn greeting_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(hi|hello|hey|good (morning|afternoon|evening)|how are you|thanks|thank you)\b").unwrap()
    })
}

fn code_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```|\bfunction\b|\bfn\s+\w+\s*\(|\bdef\s+\w+\s*\(|\bclass\s+\w+|\{[\s\S]*\}").unwrap()
    })
}

fn math_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[=+\-*/^]\s*\d|\\int|\\sum|\bsolve for\b|\bderivative\b|\bequation\b").unwrap())
}

/// Luhn check, filtering plausible card-shaped digit runs from arbitrary
/// 12-19 digit numbers (spec.md §4.8).
fn luhn_valid(digits: &str) -> bool {
    let cleaned: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if cleaned.len() < 12 || cleaned.len() > 19 {
        return false;
    }
    let mut sum = 0u32;
    for (i, &d) in cleaned.iter().rev().enumerate() {
        if i % 2 == 1 {
            let doubled = d * 2;
            sum += if doubled > 9 { doubled - 9 } else { doubled };
        } else {
            sum += d;
        }
    }
    sum % 10 == 0
}

fn contains_pii(query: &str) -> bool {
    if email_re().is_match(query) || phone_re().is_match(query) || ssn_re().is_match(query) {
        return true;
    }
    card_run_re().find_iter(query).any(|m| luhn_valid(m.as_str()))
}

/// Classifies `query` against the reflex rule bank. Returns `None` when no
/// rule fires, so the Semantic tier can run (spec.md §4.8 step 3).
pub fn classify(query: &str) -> Option<ReflexVerdict> {
    if contains_pii(query) {
        return Some(ReflexVerdict {
            intent: "pii_detected".to_string(),
            complexity: Complexity::Medium,
            privacy: PrivacyTag::Pii,
            confidence: 0.95,
        });
    }

    if greeting_re().is_match(query) {
        return Some(ReflexVerdict {
            intent: "chat".to_string(),
            complexity: Complexity::Simple,
            privacy: PrivacyTag::None,
            confidence: 0.95,
        });
    }

    if code_keyword_re().is_match(query) {
        return Some(ReflexVerdict {
            intent: "coding".to_string(),
            complexity: Complexity::Complex,
            privacy: PrivacyTag::None,
            confidence: 0.92,
        });
    }

    if math_re().is_match(query) {
        return Some(ReflexVerdict {
            intent: "reasoning".to_string(),
            complexity: Complexity::Complex,
            privacy: PrivacyTag::None,
            confidence: 0.90,
        });
    }

    None
}
