//! Text embedding engine and WordPiece tokenizer for the Cortex router
//! (spec.md §4.1, §4.2).

pub mod engine;
pub mod tokenizer;

pub use engine::{cosine, EmbeddingEngine, EmbeddingError, EMBEDDING_DIM, MAX_SEQ_LEN};
pub use tokenizer::{Encoding, TokenizerError, WordPieceTokenizer};
