//! Contracts for the collaborators the pipeline consumes.
//!
//! Every handle is injected by the caller; nothing here is a global.
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::types::{QueryRecord, SearchHit};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Nearest-neighbour search over indexed chunks.
///
/// Hits come back ordered by descending `score`, a similarity in `[0, 1]`.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    /// Incremental variant. Backends without native streaming yield the full
    /// answer as a single delta.
    async fn generate_stream(&self, prompt: &str) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        let answer = self.generate(prompt).await?;
        Ok(stream::once(async move { Ok(answer) }).boxed())
    }
}

pub trait MetricsSink: Send + Sync {
    fn record(&self, record: &QueryRecord);
}
