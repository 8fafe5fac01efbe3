//! Deterministic text chunking with word-level overlap.
//!
//! Text is normalized, split on paragraph boundaries, and oversized paragraphs
//! are broken down further on sentence boundaries. Units are packed into a
//! running buffer of at most `chunk_size` word tokens; each new buffer starts
//! with the trailing `overlap` words of the chunk just emitted.
use regex::Regex;
use std::sync::LazyLock;

use crate::config::PipelineConfig;
use crate::types::Chunk;

/// Chunks shorter than this (in characters) are dropped.
pub const MIN_CHUNK_CHARS: usize = 50;

static LINE_ENDINGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n?").expect("valid regex"));
static INLINE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
static LINE_EDGES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" ?\n ?").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("valid regex"));

/// Collapse runs of spaces and tabs, normalize line endings to `\n` and cap
/// consecutive blank lines at one.
pub fn normalize_whitespace(text: &str) -> String {
    let text = LINE_ENDINGS.replace_all(text, "\n");
    let text = INLINE_WS.replace_all(&text, " ");
    let text = LINE_EDGES.replace_all(&text, "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split `text` into overlapping chunks of at most `chunk_size` word tokens.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let cleaned = normalize_whitespace(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut builder = ChunkBuilder::new(chunk_size, overlap);
    for paragraph in cleaned.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if word_count(paragraph) <= chunk_size {
            builder.push(paragraph, PARAGRAPH_SEP);
            continue;
        }
        for (i, unit) in split_oversized(paragraph, chunk_size).iter().enumerate() {
            builder.push(unit, if i == 0 { PARAGRAPH_SEP } else { SENTENCE_SEP });
        }
    }

    builder
        .finish()
        .into_iter()
        .filter(|c| c.chars().count() >= MIN_CHUNK_CHARS)
        .collect()
}

/// Chunk one document and assign ids `"{doc_id}:{index}"`.
pub fn chunk_document(doc_id: &str, text: &str, config: &PipelineConfig) -> Vec<Chunk> {
    chunk(text, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            id: format!("{}:{}", doc_id, chunk_index),
            text,
            source_document_id: doc_id.to_string(),
            chunk_index,
        })
        .collect()
}

const PARAGRAPH_SEP: &str = "\n\n";
const SENTENCE_SEP: &str = " ";

/// Sentences of an oversized paragraph; a sentence that alone exceeds the
/// budget is cut into word windows.
fn split_oversized(paragraph: &str, chunk_size: usize) -> Vec<String> {
    let mut units = Vec::new();
    for sentence in sentences(paragraph) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.len() <= chunk_size {
            units.push(sentence.to_string());
        } else {
            units.extend(words.chunks(chunk_size).map(|w| w.join(" ")));
        }
    }
    units
}

/// Slices of `paragraph` ending at terminal punctuation followed by
/// whitespace, so `3.5` or `example.com` never split.
fn sentences(paragraph: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(paragraph) {
        let end = m.start() + m.as_str().trim_end().len();
        out.push(&paragraph[start..end]);
        start = m.end();
    }
    out.push(&paragraph[start..]);
    out.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

struct ChunkBuilder {
    chunk_size: usize,
    overlap: usize,
    buffer: String,
    tokens: usize,
    chunks: Vec<String>,
}

impl ChunkBuilder {
    fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap, buffer: String::new(), tokens: 0, chunks: Vec::new() }
    }

    fn push(&mut self, unit: &str, sep: &str) {
        let unit_tokens = word_count(unit);
        if self.tokens > 0 && self.tokens + unit_tokens > self.chunk_size {
            let emitted = std::mem::take(&mut self.buffer);
            // seed + unit never exceeds the budget
            let seed_len = self.overlap.min(self.chunk_size.saturating_sub(unit_tokens));
            let words: Vec<&str> = emitted.split_whitespace().collect();
            let seed = &words[words.len().saturating_sub(seed_len)..];
            self.tokens = seed.len();
            self.buffer = seed.join(" ");
            self.chunks.push(emitted.trim().to_string());
        }
        if !self.buffer.is_empty() {
            self.buffer.push_str(sep);
        }
        self.buffer.push_str(unit);
        self.tokens += unit_tokens;
    }

    fn finish(mut self) -> Vec<String> {
        let rest = self.buffer.trim();
        if !rest.is_empty() {
            self.chunks.push(rest.to_string());
        }
        self.chunks
    }
}
