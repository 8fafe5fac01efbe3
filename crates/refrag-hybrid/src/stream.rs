use refrag_core::types::QueryResult;
use serde::Serialize;

/// Events produced by `RetrievalOrchestrator::stream`, in order:
/// one `Retrieval`, zero or more `ContentDelta`, then `Complete` or `Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QueryEvent {
    Retrieval { chunks: usize },
    ContentDelta { text: String },
    Complete { result: Box<QueryResult> },
    Error { message: String },
}
