//! Baseline vs. compressed over a single retrieval.
use refrag_core::error::Result;
use refrag_core::types::{ComparisonResult, Improvements, Mode, QueryResult};
use tracing::info;

use crate::orchestrator::RetrievalOrchestrator;

pub struct ComparisonEngine {
    orchestrator: RetrievalOrchestrator,
    cost_per_token: f64,
}

impl ComparisonEngine {
    pub fn new(orchestrator: RetrievalOrchestrator) -> Self {
        let cost_per_token = orchestrator.config().cost_per_token;
        Self { orchestrator, cost_per_token }
    }

    pub fn with_cost_per_token(mut self, cost_per_token: f64) -> Self {
        self.cost_per_token = cost_per_token;
        self
    }

    /// Retrieve once, then run both paths concurrently over the same candidates.
    pub async fn compare(&self, query: &str) -> Result<ComparisonResult> {
        let retrieval = self.orchestrator.retrieve(query).await?;
        let (baseline, compressed) = tokio::join!(
            self.orchestrator.answer(query, &retrieval, Mode::Baseline),
            self.orchestrator.answer(query, &retrieval, Mode::Compressed)
        );
        let (baseline, compressed) = (baseline?, compressed?);
        self.orchestrator.emit(&baseline);
        self.orchestrator.emit(&compressed);

        let improvements = improvements(&baseline, &compressed, self.cost_per_token);
        info!(
            latency = improvements.latency_reduction_pct,
            tokens = improvements.token_savings_pct,
            cost = improvements.cost_savings_pct,
            "comparison finished"
        );
        Ok(ComparisonResult { baseline, compressed, improvements })
    }
}

/// Relative savings of `compressed` over `baseline`, in percent. Latency
/// compares the per-path times, leaving out the shared retrieval.
pub fn improvements(baseline: &QueryResult, compressed: &QueryResult, cost_per_token: f64) -> Improvements {
    let baseline_tokens = baseline.context_tokens() as f64;
    let compressed_tokens = compressed.context_tokens() as f64;
    Improvements {
        latency_reduction_pct: reduction_pct(baseline.metadata.path_time(), compressed.metadata.path_time()),
        token_savings_pct: reduction_pct(baseline_tokens, compressed_tokens),
        cost_savings_pct: reduction_pct(baseline_tokens * cost_per_token, compressed_tokens * cost_per_token),
    }
}

/// `(base - new) / base * 100`, or 0 when `base` is zero.
pub fn reduction_pct(base: f64, new: f64) -> f64 {
    if base <= 0.0 || !base.is_finite() {
        return 0.0;
    }
    (base - new) / base * 100.0
}
