//! BM25 over a fixed candidate set.
//!
//! This is not a corpus index: document frequencies and the average length
//! come from the chunks handed in for the current query only.
use std::collections::{HashMap, HashSet};

use refrag_core::types::ScoredChunk;
use tracing::debug;

use crate::tantivy_utils::{build_analyzer, tokenize_with};

pub const K1: f32 = 1.5;
pub const B: f32 = 0.75;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Scorer {
    k1: f32,
    b: f32,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Self { k1: K1, b: B }
    }
}

impl Bm25Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `lexical_score` on every candidate. Order is preserved.
    pub fn score(&self, query: &str, mut chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        let scores = self.score_texts(query, chunks.iter().map(|c| c.chunk.text.as_str()));
        for (chunk, score) in chunks.iter_mut().zip(scores) {
            chunk.lexical_score = score;
        }
        chunks
    }

    pub fn score_texts<'a, I>(&self, query: &str, texts: I) -> Vec<f32>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut analyzer = build_analyzer();
        let docs: Vec<Vec<String>> = texts.into_iter().map(|t| tokenize_with(&mut analyzer, t)).collect();
        if docs.is_empty() {
            return Vec::new();
        }
        let query_terms = tokenize_with(&mut analyzer, query);
        if query_terms.is_empty() {
            return vec![0.0; docs.len()];
        }

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let n = docs.len() as f32;
        let total_len: usize = docs.iter().map(Vec::len).sum();
        let avg_doc_len = (total_len as f32 / n).max(1.0);
        let idf: HashMap<&str, f32> = query_terms
            .iter()
            .map(|t| {
                let n_t = *doc_freq.get(t.as_str()).unwrap_or(&0) as f32;
                (t.as_str(), ((n - n_t + 0.5) / (n_t + 0.5) + 1.0).ln())
            })
            .collect();
        debug!(candidates = docs.len(), terms = query_terms.len(), avg_doc_len, "bm25");

        docs.iter()
            .map(|doc| {
                let mut tf: HashMap<&str, usize> = HashMap::new();
                for term in doc {
                    *tf.entry(term.as_str()).or_insert(0) += 1;
                }
                let len_norm = 1.0 - self.b + self.b * (doc.len() as f32 / avg_doc_len);
                query_terms.iter().fold(0.0, |acc, term| {
                    let f = *tf.get(term.as_str()).unwrap_or(&0) as f32;
                    if f == 0.0 {
                        return acc;
                    }
                    acc + idf[term.as_str()] * (f * (self.k1 + 1.0)) / (f + self.k1 * len_norm)
                })
            })
            .collect()
    }
}
