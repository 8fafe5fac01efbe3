//! Linear fusion of dense and lexical relevance.
use refrag_core::types::ScoredChunk;
use tracing::warn;

pub const DEFAULT_ALPHA: f32 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct FusionRanker {
    alpha: f32,
}

impl Default for FusionRanker {
    fn default() -> Self {
        Self { alpha: DEFAULT_ALPHA }
    }
}

impl FusionRanker {
    pub fn new(alpha: f32) -> Self {
        Self { alpha: alpha.clamp(0.0, 1.0) }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Score and rank candidates by `alpha * dense + (1 - alpha) * norm(lexical)`.
    ///
    /// Lexical scores are min-max normalized over this candidate set only. The
    /// sort is stable, so ties keep their retrieval order.
    pub fn fuse(&self, mut chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        let lexical: Vec<f32> = chunks.iter().map(|c| c.lexical_score).collect();
        for (c, lex) in chunks.iter_mut().zip(normalize_min_max(&lexical)) {
            let dense = clamp_unit(c.dense_score);
            if dense != c.dense_score {
                warn!(chunk = %c.chunk.id, score = c.dense_score, "dense score outside [0, 1], clamped");
            }
            c.fused_score = (self.alpha * dense + (1.0 - self.alpha) * lex).clamp(0.0, 1.0);
        }
        chunks.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score));
        chunks
    }
}

/// `(s - min) / (max - min)`, or `0.5` for every entry when all scores tie.
pub fn normalize_min_max(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0.5; scores.len()];
    }
    scores.iter().map(|s| ((s - min) / range).clamp(0.0, 1.0)).collect()
}

fn clamp_unit(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}
