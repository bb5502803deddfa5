//! Upload stage driver: pushes pending log records to the vector index and metadata store.

use serde_json::{Value, json};

use crate::embedding_log::{EmbeddingLog, EmbeddingMetadata, EmbeddingRecord, LogLine};
use crate::metadata_store::MetadataStore;
use crate::pipeline::ShutdownSignal;
use crate::pipeline::report;
use crate::pipeline::types::{ItemOutcome, StageError, StageSummary};
use crate::qdrant::VectorIndex;

/// Uploads between progress lines.
const PROGRESS_EVERY: usize = 10;

/// Upload targets.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Vector collection name.
    pub collection: String,
    /// Vector size used when the collection must be created.
    pub dimension: u64,
}

/// Outcome of an upload run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Per-record outcomes.
    pub summary: StageSummary,
    /// Records already uploaded before this run.
    pub already_uploaded: usize,
    /// Whether the collection was created by this run.
    pub collection_created: bool,
    /// Whether the log was rewritten with new flags.
    pub log_rewritten: bool,
}

/// The reduced payload stored next to each vector.
pub fn vector_payload(record: &EmbeddingRecord, metadata: &EmbeddingMetadata) -> Value {
    json!({
        "id": metadata.id,
        "chunk": record.chunk,
        "title": metadata.title,
        "year": metadata.year,
        "court": metadata.court,
        "document_type": metadata.document_type,
        "download_date": metadata.download_date,
    })
}

/// Upload every record with `upload = false`, then rewrite the log if any flag flipped.
///
/// The vector index and metadata store are checked before the log is touched; either being
/// unreachable aborts the run.
pub async fn run_upload(
    log: &EmbeddingLog,
    index: &(dyn VectorIndex + Send + Sync),
    store: &(dyn MetadataStore + Send + Sync),
    settings: &UploadSettings,
    shutdown: &ShutdownSignal,
) -> Result<UploadReport, StageError> {
    let collection_created = index
        .ensure_collection(&settings.collection, settings.dimension)
        .await?;
    if let Err(err) = index.ensure_payload_indexes(&settings.collection).await {
        tracing::warn!(collection = %settings.collection, error = %err, "Payload indexes not ensured");
    }
    store.ping().await?;
    if let Err(err) = store.ensure_indexes().await {
        tracing::warn!(error = %err, "Metadata store indexes not ensured");
    }

    let mut lines = log.read_lines()?;
    let pending = lines
        .iter()
        .filter(|line| matches!(line, LogLine::Record(record) if !record.upload))
        .count();
    let records = lines
        .iter()
        .filter(|line| matches!(line, LogLine::Record(_)))
        .count();
    report::preflight_records(records, pending);

    let mut result = UploadReport {
        summary: StageSummary::new("Upload", pending),
        already_uploaded: records - pending,
        collection_created,
        log_rewritten: false,
    };
    let mut flipped = 0_usize;

    for line in &mut lines {
        let LogLine::Record(record) = line else {
            continue;
        };
        if record.upload {
            continue;
        }
        if shutdown.is_triggered() {
            result.summary.interrupted = true;
            break;
        }

        let label = record
            .id()
            .map_or_else(|| "record without metadata".to_string(), |id| id.to_string());
        let outcome = upload_record(&**record, index, store, &settings.collection).await;
        if outcome == ItemOutcome::Succeeded {
            record.upload = true;
            flipped += 1;
            if flipped % PROGRESS_EVERY == 0 {
                report::upload_progress(flipped, pending);
            }
        }
        result.summary.record(&label, &outcome);
    }

    if flipped > 0 {
        log.rewrite(&lines)?;
        result.log_rewritten = true;
        tracing::info!(log = %log.path().display(), uploaded = flipped, "Embedding log rewritten");
    }
    Ok(result)
}

async fn upload_record(
    record: &EmbeddingRecord,
    index: &(dyn VectorIndex + Send + Sync),
    store: &(dyn MetadataStore + Send + Sync),
    collection: &str,
) -> ItemOutcome {
    let Some(metadata) = record.metadata.as_ref() else {
        return ItemOutcome::Skipped("missing metadata".to_string());
    };
    if record.embedding.is_empty() {
        return ItemOutcome::Skipped("empty vector".to_string());
    }

    let payload = vector_payload(record, metadata);
    if let Err(err) = index
        .upsert_point(collection, metadata.id, record.embedding.clone(), payload)
        .await
    {
        return ItemOutcome::Failed(format!("vector index: {err}"));
    }

    let document = match serde_json::to_value(metadata) {
        Ok(document) => document,
        Err(err) => return ItemOutcome::Failed(format!("metadata encoding: {err}")),
    };
    if let Err(err) = store.upsert(metadata.id, &document).await {
        return ItemOutcome::Failed(format!("metadata store: {err}"));
    }
    tracing::debug!(id = metadata.id, "Record uploaded");
    ItemOutcome::Succeeded
}
