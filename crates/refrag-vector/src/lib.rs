//! In-process implementations of the embedding and vector-search contracts.
//!
//! Used by tests and the CLI; a production deployment injects its own vector
//! database client through `refrag_core::traits::VectorSearch`.
pub mod embed;
pub mod store;

pub use embed::HashingEmbedder;
pub use store::InMemoryVectorStore;
