//! refrag-hybrid
//!
//! Hybrid re-ranking and selective context compression on top of an external
//! vector search, plus the orchestration that turns a query into an answer.
pub mod comparison;
pub mod compress;
pub mod fusion;
pub mod metrics;
pub mod orchestrator;
pub mod prompt;
pub mod stream;

pub use comparison::ComparisonEngine;
pub use compress::{estimate_tokens, CompressedContext, SelectiveCompressor};
pub use fusion::FusionRanker;
pub use metrics::{ChannelSink, MetricsAggregator, TracingSink};
pub use orchestrator::{Retrieval, RetrievalOrchestrator, NO_INFORMATION_ANSWER};
pub use stream::QueryEvent;
