//! Selective compression: the top-ranked chunks go into the context verbatim,
//! the rest are reduced to a few leading sentences.
use refrag_core::config::PipelineConfig;
use refrag_core::types::{CompressionMetrics, ScoredChunk};

pub const CHARS_PER_TOKEN: usize = 4;
/// Sentences shorter than this carry too little to be worth keeping.
pub const MIN_SENTENCE_CHARS: usize = 20;
pub const FALLBACK_CHARS: usize = 150;

const CONTEXT_HEADER: &str = "=== RETRIEVED CONTEXT ===\n\n";
const BLOCK_SEP: &str = "\n---\n\n";

/// `ceil(chars / 4)`, used for every token figure the pipeline reports.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

#[derive(Debug, Clone)]
pub struct CompressedContext {
    pub context: String,
    pub metrics: CompressionMetrics,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectiveCompressor {
    top_k_keep_full: usize,
    compression_ratio: f64,
}

impl SelectiveCompressor {
    pub fn new(top_k_keep_full: usize, compression_ratio: f64) -> Self {
        Self { top_k_keep_full, compression_ratio }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.top_k_keep_full, config.compression_ratio)
    }

    /// `ranked` must already be ordered best-first.
    pub fn compress(&self, ranked: &[ScoredChunk]) -> CompressedContext {
        if ranked.is_empty() {
            return CompressedContext { context: String::new(), metrics: CompressionMetrics::default() };
        }
        let (full, rest) = ranked.split_at(self.top_k_keep_full.min(ranked.len()));
        let summaries: Vec<String> = rest.iter().map(|c| self.summarize(&c.chunk.text)).collect();

        let full_tokens: usize = full.iter().map(|c| estimate_tokens(&c.chunk.text)).sum();
        let original_rest: usize = rest.iter().map(|c| estimate_tokens(&c.chunk.text)).sum();
        let compressed_rest: usize = summaries.iter().map(|s| estimate_tokens(s)).sum();
        let original_tokens = full_tokens + original_rest;
        let compressed_tokens = full_tokens + compressed_rest;
        let tokens_saved = original_tokens.saturating_sub(compressed_tokens);
        let compression_rate =
            if original_tokens == 0 { 0.0 } else { round1(tokens_saved as f64 / original_tokens as f64 * 100.0) };

        let mut context = String::from(CONTEXT_HEADER);
        context.push_str(&format_full(full));
        if !rest.is_empty() {
            context.push_str("\n\n");
            context.push_str(&format_compressed(rest, &summaries));
        }

        CompressedContext {
            context,
            metrics: CompressionMetrics {
                total_chunks: ranked.len(),
                full_chunks: full.len(),
                compressed_chunks: rest.len(),
                original_tokens,
                compressed_tokens,
                tokens_saved,
                compression_rate,
                avg_relevance_score: avg_relevance(ranked),
            },
        }
    }

    /// Every candidate verbatim; the reference point for comparisons.
    pub fn baseline(&self, ranked: &[ScoredChunk]) -> CompressedContext {
        if ranked.is_empty() {
            return CompressedContext { context: String::new(), metrics: CompressionMetrics::default() };
        }
        let tokens: usize = ranked.iter().map(|c| estimate_tokens(&c.chunk.text)).sum();
        let blocks: Vec<String> = ranked
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "[CONTEXT {}]\nSource: {} (Relevance: {:.1}%)\nContent:\n{}\n",
                    i + 1,
                    c.chunk.source_document_id,
                    c.fused_score * 100.0,
                    c.chunk.text
                )
            })
            .collect();
        CompressedContext {
            context: format!("{}{}", CONTEXT_HEADER, blocks.join(BLOCK_SEP)),
            metrics: CompressionMetrics {
                total_chunks: ranked.len(),
                full_chunks: ranked.len(),
                compressed_chunks: 0,
                original_tokens: tokens,
                compressed_tokens: tokens,
                tokens_saved: 0,
                compression_rate: 0.0,
                avg_relevance_score: avg_relevance(ranked),
            },
        }
    }

    /// Extractive summary: leading sentences up to `compression_ratio` of the
    /// original length. Never longer than `text`.
    pub fn summarize(&self, text: &str) -> String {
        let original_len = text.chars().count();
        let sentences: Vec<&str> = text
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
            .collect();

        let mut summary = String::new();
        if sentences.is_empty() {
            summary = fallback(text);
        } else {
            let target = (original_len as f64 * self.compression_ratio).floor() as usize;
            let mut taken = 0;
            for sentence in sentences {
                let len = sentence.chars().count();
                // the first sentence is always kept
                if taken + len > target && !summary.is_empty() {
                    break;
                }
                summary.push_str(sentence);
                summary.push_str(". ");
                taken += len;
            }
            summary.truncate(summary.trim_end().len());
        }

        if summary.chars().count() > original_len {
            return text.to_string();
        }
        summary
    }
}

fn fallback(text: &str) -> String {
    let mut head: String = text.chars().take(FALLBACK_CHARS).collect();
    head.push_str("...");
    head
}

fn format_full(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[HIGH PRIORITY CONTEXT {}]\nSource: {} (Relevance: {:.1}%)\nContent:\n{}\n",
                i + 1,
                c.chunk.source_document_id,
                c.fused_score * 100.0,
                c.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEP)
}

fn format_compressed(chunks: &[ScoredChunk], summaries: &[String]) -> String {
    let lines: Vec<String> = chunks
        .iter()
        .zip(summaries)
        .enumerate()
        .map(|(i, (c, summary))| {
            format!(
                "[Additional Context {}] Source: {} ({:.1}% match) - {}",
                i + 1,
                c.chunk.source_document_id,
                c.fused_score * 100.0,
                summary
            )
        })
        .collect();
    format!("\n[ADDITIONAL SUPPORTING CONTEXT]\n{}", lines.join("\n"))
}

fn avg_relevance(chunks: &[ScoredChunk]) -> f64 {
    if chunks.is_empty() {
        return 0.0;
    }
    let sum: f64 = chunks.iter().map(|c| f64::from(c.fused_score)).sum();
    round1(sum / chunks.len() as f64 * 100.0)
}

pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
