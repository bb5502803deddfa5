//! Embedding stage driver.
//!
//! Ids are allocated from a single scan of the log at start-up. Each document's records are
//! appended and synced before its registry flag is set, and the registry is saved after every
//! document, so an interruption costs at most the document in flight.

use crate::chunking::{ChunkRecord, read_chunk_file};
use crate::embedding::{EmbeddingClient, embed_all};
use crate::embedding_log::{EmbeddingLog, EmbeddingRecord};
use crate::gate::{self, GateTally};
use crate::pipeline::report;
use crate::pipeline::types::{ItemOutcome, StageError, StageSummary, item_label};
use crate::pipeline::{DataLayout, ShutdownSignal};
use crate::registry::{DocumentRecord, RegistryHandle, Stage};

/// Separator between the fields of an embedding input.
pub const FIELD_DELIMITER: &str = " | ";

/// Embedding batch settings.
#[derive(Debug, Clone, Copy)]
pub struct EmbedSettings {
    /// Chunk texts per backend request.
    pub batch_size: usize,
    /// Required vector length.
    pub dimension: usize,
}

/// Outcome of an embedding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedReport {
    /// Per-document outcomes.
    pub summary: StageSummary,
    /// Records appended to the log.
    pub chunks_appended: usize,
    /// Id of the first appended record.
    pub first_id: Option<u64>,
    /// Id of the last appended record.
    pub last_id: Option<u64>,
}

/// The text sent to the embedding backend for one chunk.
///
/// Non-empty descriptive fields come first so similar sections of different documents stay
/// distinguishable: `document type | title | chunk type | chunk title | Year N | body`.
pub fn embedding_input(doc: &DocumentRecord, chunk: &ChunkRecord, document_type: &str) -> String {
    let year = doc.year_label().map(|year| format!("Year {year}"));
    [
        Some(document_type),
        doc.title.as_deref(),
        chunk.chunk_type.as_deref(),
        chunk.chunk_title.as_deref(),
        year.as_deref(),
        Some(chunk.text.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(FIELD_DELIMITER)
}

/// Document type from the record, else from the chunk file, else `"unknown"`.
fn resolve_document_type(doc: &DocumentRecord, from_chunks: Option<&str>) -> String {
    [doc.document_type.as_deref(), from_chunks]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Embed every chunked document not yet represented in the log.
pub async fn run_embedding(
    handle: &mut RegistryHandle,
    layout: &DataLayout,
    log: &EmbeddingLog,
    client: &(dyn EmbeddingClient + Send + Sync),
    settings: EmbedSettings,
    shutdown: &ShutdownSignal,
) -> Result<EmbedReport, StageError> {
    let index = log.scan()?;
    if index.unparsed_lines > 0 {
        tracing::warn!(
            lines = index.unparsed_lines,
            log = %log.path().display(),
            "Embedding log contains unparsable lines; they are kept verbatim"
        );
    }
    let decide = |doc: &DocumentRecord| gate::evaluate_embedding(doc, |doc| index.references(doc));
    let tally = GateTally::over(handle.registry(), decide);
    let selected = gate::select(handle.registry(), decide);
    report::preflight("Embedding", &tally);

    let mut next_id = index.next_id();
    let mut result = EmbedReport {
        summary: StageSummary::new("Embedding", selected.len()),
        ..Default::default()
    };

    for (position, doc_index) in selected.into_iter().enumerate() {
        if shutdown.is_triggered() {
            result.summary.interrupted = true;
            break;
        }
        let doc = handle.registry().documents[doc_index].clone();
        let label = item_label(&doc).to_string();
        report::progress(position + 1, result.summary.eligible, &label);

        let records = match embed_document(&doc, layout, client, settings, next_id).await {
            Ok(records) => records,
            Err(outcome) => {
                result.summary.record(&label, &outcome);
                continue;
            }
        };

        if let Err(err) = log.append(&records) {
            handle.flush()?;
            return Err(err.into());
        }
        let appended = records.len();
        let last = next_id + appended as u64 - 1;
        result.first_id.get_or_insert(next_id);
        result.last_id = Some(last);
        result.chunks_appended += appended;
        tracing::info!(
            source_url = %label,
            chunks = appended,
            first_id = next_id,
            last_id = last,
            "Embeddings appended"
        );
        next_id = last + 1;

        handle.registry_mut().documents[doc_index].mark_complete(Stage::Embedding, None);
        handle.flush()?;
        result.summary.record(&label, &ItemOutcome::Succeeded);
    }

    handle.flush()?;
    Ok(result)
}

async fn embed_document(
    doc: &DocumentRecord,
    layout: &DataLayout,
    client: &(dyn EmbeddingClient + Send + Sync),
    settings: EmbedSettings,
    first_id: u64,
) -> Result<Vec<EmbeddingRecord>, ItemOutcome> {
    let stored = doc
        .output_path(Stage::Chunking)
        .ok_or_else(|| ItemOutcome::Skipped("no chunk file path".to_string()))?;
    let file = read_chunk_file(&layout.resolve(stored))
        .map_err(|err| ItemOutcome::Failed(err.to_string()))?;
    let document_type = resolve_document_type(doc, file.document_type.as_deref());

    let chunks: Vec<&ChunkRecord> = file
        .chunks
        .iter()
        .filter(|chunk| !chunk.text.trim().is_empty())
        .collect();
    if chunks.is_empty() {
        return Err(ItemOutcome::Failed("chunk file has no chunk text".to_string()));
    }
    let inputs: Vec<String> = chunks
        .iter()
        .map(|chunk| embedding_input(doc, chunk, &document_type))
        .collect();

    let vectors = embed_all(client, &inputs, settings.batch_size, settings.dimension)
        .await
        .map_err(|err| ItemOutcome::Failed(err.to_string()))?;

    Ok(chunks
        .into_iter()
        .zip(vectors)
        .zip(first_id..)
        .map(|((chunk, vector), id)| {
            EmbeddingRecord::for_chunk(id, doc, chunk, &document_type, vector)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn act() -> DocumentRecord {
        DocumentRecord {
            source_url: "https://example.org/act".into(),
            title: Some("Sample Act".into()),
            year: Some(json!(2001)),
            ..Default::default()
        }
    }

    #[test]
    fn input_joins_non_empty_fields() {
        let chunk = ChunkRecord::new(
            0,
            "section",
            Some("Section 1: Short title".into()),
            "1. Short title.- This Act".into(),
        );
        assert_eq!(
            embedding_input(&act(), &chunk, "Act"),
            "Act | Sample Act | section | Section 1: Short title | Year 2001 | 1. Short title.- This Act"
        );
    }

    #[test]
    fn missing_fields_are_left_out() {
        let mut doc = act();
        doc.title = Some("  ".into());
        doc.year = Some(json!(""));
        let mut chunk = ChunkRecord::new(3, "passage", None, "The appeal is dismissed.".into());
        chunk.chunk_type = None;
        assert_eq!(
            embedding_input(&doc, &chunk, "unknown"),
            "unknown | The appeal is dismissed."
        );
    }

    #[test]
    fn document_type_falls_back_to_chunk_file_then_unknown() {
        let mut doc = act();
        assert_eq!(resolve_document_type(&doc, Some("Ordinance")), "Ordinance");
        assert_eq!(resolve_document_type(&doc, None), "unknown");
        doc.document_type = Some("Act".into());
        assert_eq!(resolve_document_type(&doc, Some("Ordinance")), "Act");
    }
}
