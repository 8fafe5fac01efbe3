//! Aggregation of per-query records and the sinks that deliver them.
use std::collections::VecDeque;

use refrag_core::traits::MetricsSink;
use refrag_core::types::QueryRecord;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

pub const HISTORY_LIMIT: usize = 100;

/// Running totals over many queries. Owned by the caller and fed explicitly.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsAggregator {
    pub total_queries: u64,
    pub total_tokens: u64,
    pub tokens_saved: u64,
    pub avg_latency_ms: f64,
    history: VecDeque<QueryRecord>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, record: &QueryRecord) {
        self.total_queries += 1;
        self.total_tokens += record.tokens_used as u64;
        self.tokens_saved += record.tokens_saved as u64;
        self.avg_latency_ms = running_average(self.avg_latency_ms, self.total_queries, record.total_time_ms);
        self.history.push_front(record.clone());
        self.history.truncate(HISTORY_LIMIT);
    }

    /// Most recent first.
    pub fn history(&self) -> impl Iterator<Item = &QueryRecord> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Mean after adding `sample` as the `count`-th observation.
pub fn running_average(current: f64, count: u64, sample: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    current + (sample - current) / count as f64
}

/// Logs every record as a structured event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, record: &QueryRecord) {
        info!(
            tokens_used = record.tokens_used,
            total_time_ms = record.total_time_ms,
            tokens_saved = record.tokens_saved,
            mode = %record.mode,
            "query metrics"
        );
    }
}

/// Forwards records to a receiver the caller drains into an aggregator.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<QueryRecord>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<QueryRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MetricsSink for ChannelSink {
    fn record(&self, record: &QueryRecord) {
        // a closed receiver means nobody is aggregating any more
        let _ = self.tx.send(record.clone());
    }
}
