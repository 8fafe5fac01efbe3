//! refrag-text
//!
//! Lexical relevance over a per-query candidate set: BM25 scoring on top of a
//! Tantivy case-folding word analyzer.
pub mod lexical;
pub mod tantivy_utils;

pub use lexical::{Bm25Scorer, B, K1};
pub use tantivy_utils::tokenize;
