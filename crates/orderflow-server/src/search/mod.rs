//! Search projection of persisted orders.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use orderflow_core::Order;

pub mod elastic;
pub mod memory;

pub use elastic::ElasticsearchClient;
pub use memory::MemorySearchIndex;

pub type DynOrderIndexer = Arc<dyn OrderIndexer>;
pub type DynOrderSearch = Arc<dyn OrderSearch>;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode search payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Write side of the projection.
#[async_trait]
pub trait OrderIndexer: Send + Sync {
    /// Creates or replaces the document for `order.id`.
    async fn upsert(&self, order: &Order) -> Result<(), SearchError>;
}

/// Read side of the projection.
#[async_trait]
pub trait OrderSearch: Send + Sync {
    /// Full-text match on product name. Returns the engine's response body
    /// unchanged.
    async fn search(&self, term: &str) -> Result<Bytes, SearchError>;
}
