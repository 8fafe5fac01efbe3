#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use refrag_core::traits::{Generator, VectorSearch};
use refrag_core::types::{Chunk, Meta, ScoredChunk, SearchHit};

pub struct ScriptedSearch {
    pub hits: Vec<SearchHit>,
}

#[async_trait]
impl VectorSearch for ScriptedSearch {
    async fn search(&self, _query: &str, top_k: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}

/// Answers like `ScriptedSearch` after a fixed delay.
pub struct SlowSearch {
    pub hits: Vec<SearchHit>,
    pub delay: Duration,
}

#[async_trait]
impl VectorSearch for SlowSearch {
    async fn search(&self, _query: &str, top_k: usize) -> anyhow::Result<Vec<SearchHit>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}

pub struct FailingSearch;

#[async_trait]
impl VectorSearch for FailingSearch {
    async fn search(&self, _query: &str, _top_k: usize) -> anyhow::Result<Vec<SearchHit>> {
        Err(anyhow!("connection refused"))
    }
}

pub struct FixedGenerator(pub String);

#[async_trait]
impl Generator for FixedGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Err(anyhow!("quota exceeded"))
    }
}

/// Streams its pieces one by one.
pub struct PiecewiseGenerator(pub Vec<String>);

#[async_trait]
impl Generator for PiecewiseGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(self.0.concat())
    }

    async fn generate_stream(&self, _prompt: &str) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        Ok(stream::iter(self.0.clone().into_iter().map(Ok)).boxed())
    }
}

/// Takes one millisecond per hundred prompt characters.
pub struct PromptPacedGenerator;

#[async_trait]
impl Generator for PromptPacedGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_millis(prompt.len() as u64 / 100)).await;
        Ok("done".to_string())
    }
}

/// Streams `total` one-word deltas, counting how many were pulled.
pub struct CountingGenerator {
    pub total: usize,
    pub pulled: Arc<AtomicUsize>,
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok("word ".repeat(self.total))
    }

    async fn generate_stream(&self, _prompt: &str) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        let pulled = Arc::clone(&self.pulled);
        Ok(stream::iter(0..self.total)
            .map(move |_| {
                pulled.fetch_add(1, Ordering::SeqCst);
                Ok("word ".to_string())
            })
            .boxed())
    }
}

/// Several sentences, each long enough to be kept by the summarizer.
pub fn long_text(tag: &str) -> String {
    (0..6)
        .map(|i| format!("The {} homestead note number {} describes a practical routine in detail.", tag, i))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn hit(doc: &str, index: usize, text: &str, score: f32) -> SearchHit {
    SearchHit {
        chunk: Chunk {
            id: format!("{}:{}", doc, index),
            text: text.to_string(),
            source_document_id: doc.to_string(),
            chunk_index: index,
        },
        score,
        metadata: Meta::new(),
    }
}

pub fn hits_with_scores(scores: &[f32]) -> Vec<SearchHit> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let doc = format!("doc{}", i);
            hit(&doc, 0, &long_text(&doc), s)
        })
        .collect()
}

pub fn scored(id: &str, text: &str, dense: f32, lexical: f32) -> ScoredChunk {
    ScoredChunk {
        chunk: Chunk { id: id.to_string(), text: text.to_string(), source_document_id: id.to_string(), chunk_index: 0 },
        metadata: Meta::new(),
        dense_score: dense,
        lexical_score: lexical,
        fused_score: 0.0,
    }
}
