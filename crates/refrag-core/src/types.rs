//! Domain types shared by the chunker, scorers, compressor and orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// A bounded fragment of a source document, the unit of retrieval.
///
/// - `id`: globally unique chunk identifier (`"{doc}:{index}"` when produced by the chunker)
/// - `source_document_id`: stable document identity (file stem or external id)
/// - `text`: the text payload of the chunk
/// - `chunk_index`: position within the parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source_document_id: String,
    pub chunk_index: usize,
}

/// One result from the external vector search.
///
/// `score` is a similarity in `[0, 1]` (higher is better), not a distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
    #[serde(default)]
    pub metadata: Meta,
}

/// A candidate chunk carrying every relevance signal computed for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub metadata: Meta,
    pub dense_score: f32,
    pub lexical_score: f32,
    pub fused_score: f32,
}

impl ScoredChunk {
    pub fn from_hit(hit: SearchHit) -> Self {
        Self { dense_score: hit.score, chunk: hit.chunk, metadata: hit.metadata, lexical_score: 0.0, fused_score: 0.0 }
    }
}

/// Which context-assembly path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Baseline,
    Compressed,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Baseline => f.write_str("baseline"),
            Mode::Compressed => f.write_str("compressed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionMetrics {
    pub total_chunks: usize,
    pub full_chunks: usize,
    pub compressed_chunks: usize,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub tokens_saved: usize,
    /// Percentage in `[0, 100]`, one decimal.
    pub compression_rate: f64,
    /// Mean fused score of all candidates, as a percentage with one decimal.
    pub avg_relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCitation {
    pub document_id: String,
    pub excerpt: String,
    pub relevance_score: f32,
    pub chunk_count: usize,
}

/// Stage timings are wall-clock milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub mode: Mode,
    pub retrieval_time: f64,
    pub compression_time: f64,
    pub generation_time: f64,
    pub total_time: f64,
    pub chunks_retrieved: usize,
    pub confidence: u32,
    pub tokens_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionMetrics>,
}

impl QueryMetadata {
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            retrieval_time: 0.0,
            compression_time: 0.0,
            generation_time: 0.0,
            total_time: 0.0,
            chunks_retrieved: 0,
            confidence: 0,
            tokens_used: 0,
            compression: None,
        }
    }

    /// Time spent after retrieval: context assembly plus generation.
    pub fn path_time(&self) -> f64 {
        self.compression_time + self.generation_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub metadata: QueryMetadata,
}

impl QueryResult {
    /// Context tokens fed to generation: compressed tokens for the compressed
    /// path, the full token count for the baseline path.
    pub fn context_tokens(&self) -> usize {
        self.metadata.compression.as_ref().map_or(0, |m| m.compressed_tokens)
    }

    pub fn record(&self) -> QueryRecord {
        QueryRecord {
            tokens_used: self.metadata.tokens_used,
            total_time_ms: self.metadata.total_time,
            mode: self.metadata.mode,
            tokens_saved: self.metadata.compression.as_ref().map_or(0, |m| m.tokens_saved),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Improvements {
    pub latency_reduction_pct: f64,
    pub token_savings_pct: f64,
    pub cost_savings_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub baseline: QueryResult,
    pub compressed: QueryResult,
    pub improvements: Improvements,
}

/// The per-query record handed to a metrics sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRecord {
    pub tokens_used: usize,
    pub total_time_ms: f64,
    pub mode: Mode,
    pub tokens_saved: usize,
}
