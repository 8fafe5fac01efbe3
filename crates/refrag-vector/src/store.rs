use anyhow::{ensure, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use refrag_core::traits::{Embedder, VectorSearch};
use refrag_core::types::{Chunk, Meta, SearchHit};

/// Brute-force cosine store. Scores are cosine similarity clamped to `[0, 1]`.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self { Self { embedder, entries: Vec::new() } }

    pub fn index(&mut self, chunks: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        ensure!(embeddings.len() == chunks.len(), "embedder returned {} vectors for {} chunks", embeddings.len(), chunks.len());
        for (chunk, e) in chunks.iter().zip(embeddings) {
            ensure!(e.len() == self.embedder.dim(), "embedding dim {} != {}", e.len(), self.embedder.dim());
            self.entries.push((chunk.clone(), e));
        }
        debug!(indexed = chunks.len(), total = self.entries.len(), "indexed chunks");
        Ok(())
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

#[async_trait]
impl VectorSearch for InMemoryVectorStore {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let q = self.embedder.embed(query)?;
        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|(chunk, v)| SearchHit { chunk: chunk.clone(), score: cosine(&q, v).clamp(0.0, 1.0), metadata: Meta::new() })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}
