//! WordPiece tokenizer over a loadable vocabulary, with a safe built-in
//! fallback (spec.md §4.2).
//!
//! This is a hand-rolled tokenizer, not a wrapper over the `tokenizers`
//! crate: the spec names the exact algorithm (greedy longest-prefix
//! matching, then `##`-prefixed subword continuations, else `[UNK]`) rather
//! than delegating to a library, so that's what's implemented here.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Special tokens every vocabulary carries, built-in or loaded.
pub const PAD: &str = "[PAD]";
pub const UNK: &str = "[UNK]";
pub const CLS: &str = "[CLS]";
pub const SEP: &str = "[SEP]";
pub const MASK: &str = "[MASK]";

/// Errors that can occur while loading or using the tokenizer.
#[derive(Error, Debug)]
pub enum TokenizerError {
    /// The vocabulary file could not be read.
    #[error("failed to read vocabulary file {path}: {source}")]
    VocabRead {
        /// Path that failed to read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result of tokenizing one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// Token ids, `[CLS]`-prefixed and `[SEP]`-suffixed, truncated to
    /// `max_length` with `[SEP]` always last.
    pub input_ids: Vec<i64>,
    /// Attention mask, all ones — this implementation never pads
    /// (spec.md §4.2).
    pub attention_mask: Vec<i64>,
    /// Token-type ids, all zeros (single-segment input only).
    pub token_type_ids: Vec<i64>,
    /// The token strings, parallel to `input_ids`, for detokenization.
    pub tokens: Vec<String>,
}

/// A WordPiece vocabulary plus the tokenization algorithm over it.
#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    token_to_id: HashMap<String, i64>,
    id_to_token: Vec<String>,
}

impl WordPieceTokenizer {
    /// Loads a vocabulary from a plain-text file, one token per line; line
    /// number is the token id (spec.md §6). Falls back to
    /// [`Self::built_in`] if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, TokenizerError> {
        if !path.exists() {
            log::warn!(
                "vocabulary file {:?} not found; falling back to built-in vocabulary (degraded embeddings)",
                path
            );
            return Ok(Self::built_in());
        }
        let text = fs::read_to_string(path).map_err(|source| TokenizerError::VocabRead {
            path: path.display().to_string(),
            source,
        })?;
        let id_to_token: Vec<String> = text.lines().map(str::to_string).collect();
        let token_to_id = id_to_token
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as i64))
            .collect();
        Ok(Self { token_to_id, id_to_token })
    }

    /// A small built-in vocabulary (~100 common words plus the five special
    /// tokens) sufficient for the service to start, not for accurate
    /// embeddings. Documented degraded mode per spec.md §4.2.
    pub fn built_in() -> Self {
        let mut id_to_token: Vec<String> =
            [PAD, UNK, CLS, SEP, MASK].iter().map(|s| s.to_string()).collect();
        id_to_token.extend(BUILT_IN_WORDS.iter().map(|s| s.to_string()));
        let token_to_id = id_to_token
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as i64))
            .collect();
        Self { token_to_id, id_to_token }
    }

    /// Number of entries in the vocabulary.
    pub fn vocab_size(&self) -> usize {
        self.id_to_token.len()
    }

    fn id_of(&self, token: &str) -> Option<i64> {
        self.token_to_id.get(token).copied()
    }

    fn token_of(&self, id: i64) -> Option<&str> {
        self.id_to_token.get(id as usize).map(String::as_str)
    }

    /// Normalizes text: lowercase, collapse whitespace runs, pad punctuation
    /// with spaces so it tokenizes as its own unit.
    fn normalize(text: &str) -> String {
        let lowered = text.to_lowercase();
        let mut padded = String::with_capacity(lowered.len() * 2);
        for ch in lowered.chars() {
            if ch.is_ascii_punctuation() {
                padded.push(' ');
                padded.push(ch);
                padded.push(' ');
            } else {
                padded.push(ch);
            }
        }
        padded.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Greedily WordPiece-tokenizes a single whitespace-delimited word.
    fn wordpiece(&self, word: &str) -> Vec<String> {
        let chars: Vec<char> = word.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut start = 0usize;
        while start < chars.len() {
            let mut end = chars.len();
            let mut found: Option<String> = None;
            while end > start {
                let mut piece: String = chars[start..end].iter().collect();
                if start > 0 {
                    piece = format!("##{piece}");
                }
                if self.token_to_id.contains_key(&piece) {
                    found = Some(piece);
                    break;
                }
                end -= 1;
            }
            match found {
                Some(piece) => {
                    start = end;
                    out.push(piece);
                }
                None => {
                    out.push(UNK.to_string());
                    start += 1;
                }
            }
        }
        out
    }

    /// Tokenizes `text`, truncating to `max_length` total tokens (including
    /// `[CLS]`/`[SEP]`) while keeping `[SEP]` as the final token.
    pub fn encode(&self, text: &str, max_length: usize) -> Encoding {
        let normalized = Self::normalize(text);
        let mut tokens = vec![CLS.to_string()];
        for word in normalized.split_whitespace() {
            tokens.extend(self.wordpiece(word));
        }

        let budget = max_length.max(2);
        if tokens.len() + 1 > budget {
            tokens.truncate(budget - 1);
        }
        tokens.push(SEP.to_string());

        let input_ids: Vec<i64> = tokens
            .iter()
            .map(|t| self.id_of(t).unwrap_or_else(|| self.id_of(UNK).unwrap_or(1)))
            .collect();
        let attention_mask = vec![1i64; input_ids.len()];
        let token_type_ids = vec![0i64; input_ids.len()];

        Encoding { input_ids, attention_mask, token_type_ids, tokens }
    }

    /// Reconstructs known vocabulary words from ids, joining `##`
    /// continuations onto the preceding token. Unknown/special tokens are
    /// dropped. Used only to verify the tokenize/detokenize round-trip
    /// invariant (spec.md §8); not part of the embedding pipeline.
    pub fn detokenize_known(&self, ids: &[i64]) -> String {
        let mut words: Vec<String> = Vec::new();
        for &id in ids {
            let Some(tok) = self.token_of(id) else { continue };
            if matches!(tok, PAD | UNK | CLS | SEP | MASK) {
                continue;
            }
            if let Some(piece) = tok.strip_prefix("##") {
                if let Some(last) = words.last_mut() {
                    last.push_str(piece);
                    continue;
                }
            }
            words.push(tok.to_string());
        }
        words.join(" ")
    }
}

const BUILT_IN_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can",
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my", "your",
    "his", "its", "our", "their", "this", "that", "these", "those", "and", "or", "but", "if",
    "then", "else", "for", "while", "to", "of", "in", "on", "at", "by", "with", "from", "about",
    "into", "through", "over", "under", "again", "further", "not", "no", "yes", "hello", "hi",
    "thanks", "thank", "please", "help", "what", "when", "where", "why", "how", "who", "which",
    "code", "function", "class", "error", "bug", "fix", "test", "data", "value", "return",
    "true", "false", "null", "none", "some", "one", "two", "three", "number", "string", "list",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn built_in_vocab_has_special_tokens() {
        let t = WordPieceTokenizer::built_in();
        assert!(t.id_of(PAD).is_some());
        assert!(t.id_of(UNK).is_some());
        assert!(t.id_of(CLS).is_some());
        assert!(t.id_of(SEP).is_some());
        assert!(t.id_of(MASK).is_some());
    }

    #[test]
    fn missing_vocab_file_falls_back() {
        let t = WordPieceTokenizer::load(Path::new("/nonexistent/vocab.txt")).unwrap();
        assert!(t.vocab_size() > 5);
    }

    #[test]
    fn encode_wraps_with_cls_and_sep() {
        let t = WordPieceTokenizer::built_in();
        let enc = t.encode("hello there", 32);
        assert_eq!(enc.tokens.first().unwrap(), CLS);
        assert_eq!(enc.tokens.last().unwrap(), SEP);
        assert!(enc.attention_mask.iter().all(|&m| m == 1));
        assert!(enc.token_type_ids.iter().all(|&t| t == 0));
    }

    #[test]
    fn truncation_keeps_sep_last() {
        let t = WordPieceTokenizer::built_in();
        let long_text = "hello ".repeat(50);
        let enc = t.encode(&long_text, 8);
        assert_eq!(enc.input_ids.len(), 8);
        assert_eq!(enc.tokens.last().unwrap(), SEP);
    }

    #[test]
    fn unknown_word_falls_back_to_unk() {
        let t = WordPieceTokenizer::built_in();
        let enc = t.encode("zzzzxxxxqqqq", 32);
        assert!(enc.tokens.contains(&UNK.to_string()));
    }

    #[test]
    fn tokenize_detokenize_round_trips_known_words() {
        let t = WordPieceTokenizer::built_in();
        let enc = t.encode("hello there", 32);
        let text = t.detokenize_known(&enc.input_ids);
        assert_eq!(text, "hello there");
    }

    #[rstest::rstest]
    #[case("HELLO", "hello")]
    #[case("a,b", "a , b")]
    fn normalize_lowercases_and_pads_punctuation(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(WordPieceTokenizer::normalize(input), expected);
    }
}
