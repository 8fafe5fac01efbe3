//! One query end to end: search, re-rank, assemble context, generate.
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

use refrag_core::config::PipelineConfig;
use refrag_core::error::{Error, Result};
use refrag_core::traits::{Generator, MetricsSink, VectorSearch};
use refrag_core::types::{CompressionMetrics, Mode, QueryMetadata, QueryResult, ScoredChunk, SearchHit, SourceCitation};
use refrag_text::Bm25Scorer;

use crate::compress::{estimate_tokens, CompressedContext, SelectiveCompressor};
use crate::fusion::FusionRanker;
use crate::prompt::build_prompt;
use crate::stream::QueryEvent;

pub const NO_INFORMATION_ANSWER: &str =
    "I couldn't find any relevant information in the knowledge base to answer your question.";
pub const EXCERPT_CHARS: usize = 200;
const STREAM_BUFFER: usize = 32;

/// Candidates for one query, ranked best-first, plus the time it took.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub ranked: Vec<ScoredChunk>,
    pub elapsed_ms: f64,
}

/// Context prepared for generation.
struct Prepared {
    prompt: String,
    metrics: CompressionMetrics,
    compression_time: f64,
}

#[derive(Clone)]
pub struct RetrievalOrchestrator {
    search: Arc<dyn VectorSearch>,
    generator: Arc<dyn Generator>,
    sink: Option<Arc<dyn MetricsSink>>,
    config: PipelineConfig,
    scorer: Bm25Scorer,
    ranker: FusionRanker,
    compressor: SelectiveCompressor,
}

impl RetrievalOrchestrator {
    pub fn new(search: Arc<dyn VectorSearch>, generator: Arc<dyn Generator>, config: PipelineConfig) -> Self {
        Self {
            search,
            generator,
            sink: None,
            scorer: Bm25Scorer::new(),
            ranker: FusionRanker::new(config.fusion_alpha),
            compressor: SelectiveCompressor::from_config(&config),
            config,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn query(&self, query: &str, mode: Mode) -> Result<QueryResult> {
        let retrieval = self.retrieve(query).await?;
        let result = self.answer(query, &retrieval, mode).await?;
        self.emit(&result);
        Ok(result)
    }

    /// Vector search followed by BM25 + fusion re-ranking.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let start = Instant::now();
        let hits = self.search.search(query, self.config.top_k_retrieval).await.map_err(Error::Search)?;
        let ranked = self.rank(query, hits);
        let elapsed_ms = millis(start.elapsed());
        debug!(candidates = ranked.len(), elapsed_ms, "retrieval");
        Ok(Retrieval { ranked, elapsed_ms })
    }

    /// Drop empty chunks, score lexically and fuse with the dense scores.
    pub fn rank(&self, query: &str, hits: Vec<SearchHit>) -> Vec<ScoredChunk> {
        let candidates: Vec<ScoredChunk> = hits
            .into_iter()
            .filter(|h| !h.chunk.text.trim().is_empty())
            .map(ScoredChunk::from_hit)
            .collect();
        if candidates.is_empty() {
            return candidates;
        }
        self.ranker.fuse(self.scorer.score(query, candidates))
    }

    /// Assemble the context for `mode` over an existing retrieval and generate.
    /// Touches no shared state, so several modes can run over one retrieval at once.
    pub(crate) async fn answer(&self, query: &str, retrieval: &Retrieval, mode: Mode) -> Result<QueryResult> {
        if retrieval.ranked.is_empty() {
            return Ok(no_information(mode));
        }
        let prepared = self.prepare(query, retrieval, mode);

        let generation_start = Instant::now();
        let answer = self.generator.generate(&prepared.prompt).await.map_err(Error::Generation)?;
        let generation_time = millis(generation_start.elapsed());
        debug!(%mode, generation_time, "generation");

        Ok(self.assemble(answer, prepared, retrieval, generation_time, mode))
    }

    /// Run a query as a stream of events. Dropping the receiver cancels the
    /// work at the next event boundary.
    pub fn stream(&self, query: impl Into<String>, mode: Mode) -> mpsc::Receiver<QueryEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let this = self.clone();
        let query = query.into();
        tokio::spawn(async move {
            if let Err(e) = this.drive_stream(&query, mode, &tx).await {
                let _ = tx.send(QueryEvent::Error { message: e.to_string() }).await;
            }
        });
        rx
    }

    async fn drive_stream(&self, query: &str, mode: Mode, tx: &mpsc::Sender<QueryEvent>) -> Result<()> {
        let retrieval = self.retrieve(query).await?;
        if tx.send(QueryEvent::Retrieval { chunks: retrieval.ranked.len() }).await.is_err() {
            return Ok(());
        }
        if retrieval.ranked.is_empty() {
            let result = no_information(mode);
            self.emit(&result);
            let _ = tx.send(QueryEvent::Complete { result: Box::new(result) }).await;
            return Ok(());
        }

        let prepared = self.prepare(query, &retrieval, mode);
        let generation_start = Instant::now();
        let mut deltas = self.generator.generate_stream(&prepared.prompt).await.map_err(Error::Generation)?;
        let mut answer = String::new();
        while let Some(delta) = deltas.next().await {
            let delta = delta.map_err(Error::Generation)?;
            answer.push_str(&delta);
            if tx.send(QueryEvent::ContentDelta { text: delta }).await.is_err() {
                debug!("stream receiver dropped, cancelling");
                return Ok(());
            }
        }
        let generation_time = millis(generation_start.elapsed());

        let result = self.assemble(answer, prepared, &retrieval, generation_time, mode);
        self.emit(&result);
        let _ = tx.send(QueryEvent::Complete { result: Box::new(result) }).await;
        Ok(())
    }

    fn prepare(&self, query: &str, retrieval: &Retrieval, mode: Mode) -> Prepared {
        let start = Instant::now();
        let CompressedContext { context, metrics } = match mode {
            Mode::Compressed => self.compressor.compress(&retrieval.ranked),
            Mode::Baseline => self.compressor.baseline(&retrieval.ranked),
        };
        let compression_time = millis(start.elapsed());
        debug!(%mode, compression_time, tokens = metrics.compressed_tokens, saved = metrics.tokens_saved, "context assembled");
        Prepared { prompt: build_prompt(query, &context), metrics, compression_time }
    }

    fn assemble(&self, answer: String, prepared: Prepared, retrieval: &Retrieval, generation_time: f64, mode: Mode) -> QueryResult {
        let ranked = &retrieval.ranked;
        let tokens_used = estimate_tokens(&prepared.prompt) + estimate_tokens(&answer);
        let metadata = QueryMetadata {
            mode,
            retrieval_time: retrieval.elapsed_ms,
            compression_time: prepared.compression_time,
            generation_time,
            total_time: retrieval.elapsed_ms + prepared.compression_time + generation_time,
            chunks_retrieved: ranked.len(),
            confidence: confidence(ranked),
            tokens_used,
            compression: Some(prepared.metrics),
        };
        info!(%mode, total_time = metadata.total_time, tokens_used, chunks = ranked.len(), "query answered");
        QueryResult { answer, sources: citations(ranked), metadata }
    }

    pub(crate) fn emit(&self, result: &QueryResult) {
        if let Some(sink) = &self.sink {
            sink.record(&result.record());
        }
    }
}

fn no_information(mode: Mode) -> QueryResult {
    QueryResult { answer: NO_INFORMATION_ANSWER.to_string(), sources: Vec::new(), metadata: QueryMetadata::empty(mode) }
}

/// Mean dense similarity as a rounded percentage.
pub fn confidence(ranked: &[ScoredChunk]) -> u32 {
    if ranked.is_empty() {
        return 0;
    }
    let mean = ranked.iter().map(|c| f64::from(c.dense_score)).sum::<f64>() / ranked.len() as f64;
    (mean * 100.0).round().clamp(0.0, 100.0) as u32
}

/// One citation per source document, best document first. `ranked` is
/// ordered best-first, so a document's first chunk is its best one.
pub fn citations(ranked: &[ScoredChunk]) -> Vec<SourceCitation> {
    let mut by_doc: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<SourceCitation> = Vec::new();
    for c in ranked {
        let doc = c.chunk.source_document_id.as_str();
        match by_doc.get(doc) {
            Some(&i) => {
                let citation = &mut out[i];
                citation.chunk_count += 1;
                if c.fused_score > citation.relevance_score {
                    citation.relevance_score = c.fused_score;
                    citation.excerpt = excerpt(&c.chunk.text);
                }
            }
            None => {
                by_doc.insert(doc, out.len());
                out.push(SourceCitation {
                    document_id: doc.to_string(),
                    excerpt: excerpt(&c.chunk.text),
                    relevance_score: c.fused_score,
                    chunk_count: 1,
                });
            }
        }
    }
    out.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    out
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let mut head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        head.push_str("...");
    }
    head
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
