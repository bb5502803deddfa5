//! Shared types used by the Qdrant client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Payload fields indexed for filtering, with their Qdrant schema.
pub const PAYLOAD_INDEX_FIELDS: [(&str, &str); 4] = [
    ("court", "keyword"),
    ("year", "integer"),
    ("document_type", "keyword"),
    ("title", "keyword"),
];

/// Vector store the upload stage writes to.
#[async_trait]
pub trait VectorIndex {
    /// Create `collection` with cosine distance unless it already exists.
    ///
    /// Returns `true` when the collection was created by this call.
    async fn ensure_collection(&self, collection: &str, dimension: u64)
    -> Result<bool, QdrantError>;

    /// Ensure filterable payload indexes exist. Individual index failures are logged, not returned.
    async fn ensure_payload_indexes(&self, collection: &str) -> Result<(), QdrantError>;

    /// Insert or replace the point `id`.
    async fn upsert_point(
        &self,
        collection: &str,
        id: u64,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<(), QdrantError>;
}
