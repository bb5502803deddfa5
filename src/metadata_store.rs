//! Metadata store: the full non-vector metadata of each embedding, keyed by id.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, IndexModel};
use serde_json::Value;
use thiserror::Error;

/// Fields indexed for filtering.
pub const INDEXED_FIELDS: [&str; 4] = ["court", "year", "document_type", "title"];

/// Errors raised by the metadata store.
#[derive(Debug, Error)]
pub enum MetadataStoreError {
    /// The driver failed to connect or execute an operation.
    #[error("MongoDB operation failed: {0}")]
    Mongo(#[from] mongodb::error::Error),
    /// The metadata could not be converted to BSON.
    #[error("Metadata could not be encoded: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    /// The store did not answer a health check.
    #[error("Metadata store unreachable: {0}")]
    Unavailable(String),
    /// The metadata is not storable as given.
    #[error("Invalid metadata document: {0}")]
    InvalidDocument(String),
}

/// Document store receiving embedding metadata.
#[async_trait]
pub trait MetadataStore {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), MetadataStoreError>;

    /// Create the filter indexes on [`INDEXED_FIELDS`].
    async fn ensure_indexes(&self) -> Result<(), MetadataStoreError>;

    /// Insert or replace the document with `id`.
    async fn upsert(&self, id: u64, metadata: &Value) -> Result<(), MetadataStoreError>;
}

/// MongoDB-backed metadata store.
pub struct MongoMetadataStore {
    client: Client,
    database: String,
    collection: Collection<Document>,
}

impl MongoMetadataStore {
    /// Connect lazily to `uri`; the first operation establishes the connection.
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self, MetadataStoreError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("lawpipe".to_string());
        options.server_selection_timeout = Some(Duration::from_secs(10));
        let client = Client::with_options(options)?;
        let collection = client.database(database).collection::<Document>(collection);
        tracing::debug!(database, collection = %collection.name(), "Initialized MongoDB client");
        Ok(Self {
            client,
            database: database.to_string(),
            collection,
        })
    }
}

#[async_trait]
impl MetadataStore for MongoMetadataStore {
    async fn ping(&self) -> Result<(), MetadataStoreError> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| MetadataStoreError::Unavailable(err.to_string()))?;
        Ok(())
    }

    async fn ensure_indexes(&self) -> Result<(), MetadataStoreError> {
        for field in INDEXED_FIELDS {
            let model = IndexModel::builder().keys(doc! { field: 1 }).build();
            self.collection.create_index(model).await?;
            tracing::debug!(field, "Metadata index ensured");
        }
        Ok(())
    }

    async fn upsert(&self, id: u64, metadata: &Value) -> Result<(), MetadataStoreError> {
        let filter = doc! { "id": mongo_id(id)? };
        let update = doc! { "$set": to_mongo_document(metadata)? };
        self.collection.update_one(filter, update).upsert(true).await?;
        Ok(())
    }
}

fn mongo_id(id: u64) -> Result<i64, MetadataStoreError> {
    i64::try_from(id)
        .map_err(|_| MetadataStoreError::InvalidDocument(format!("id {id} exceeds i64 range")))
}

/// Convert a JSON object to BSON.
pub fn to_mongo_document(metadata: &Value) -> Result<Document, MetadataStoreError> {
    if !metadata.is_object() {
        return Err(MetadataStoreError::InvalidDocument(
            "metadata must be a JSON object".to_string(),
        ));
    }
    Ok(mongodb::bson::to_document(metadata)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;
    use serde_json::json;

    #[test]
    fn metadata_converts_to_bson() {
        let document = to_mongo_document(&json!({
            "id": 7,
            "title": "Sample Act",
            "year": 1999,
            "chunk_title": null
        }))
        .expect("convert");
        assert_eq!(document.get("title"), Some(&Bson::String("Sample Act".into())));
        assert!(matches!(document.get("year"), Some(Bson::Int64(1999) | Bson::Int32(1999))));
        assert_eq!(document.get("chunk_title"), Some(&Bson::Null));
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(matches!(
            to_mongo_document(&json!([1, 2])),
            Err(MetadataStoreError::InvalidDocument(_))
        ));
        assert!(mongo_id(u64::MAX).is_err());
        assert_eq!(mongo_id(12).expect("id"), 12);
    }
}
