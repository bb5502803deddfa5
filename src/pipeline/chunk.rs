//! Chunking stage driver.

use serde_json::Map;

use crate::chunking::{ChunkFile, SectionChunker, is_valid_chunk_file, write_chunk_file};
use crate::gate::{self, GateTally};
use crate::pipeline::report;
use crate::pipeline::types::{ItemOutcome, StageError, StageSummary, item_label, output_target};
use crate::pipeline::{DataLayout, ShutdownSignal};
use crate::registry::{DocumentRecord, RegistryHandle, Stage};

/// Outcome of a chunking run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkReport {
    /// Per-document outcomes.
    pub summary: StageSummary,
    /// Records whose `chunked` flag was reset because their chunk file was missing or invalid.
    pub repaired: usize,
    /// Valid chunk files written by an external chunker and adopted as-is.
    pub adopted: usize,
    /// Chunk files written by the built-in chunker.
    pub generated: usize,
    /// Chunks written by the built-in chunker.
    pub chunks_written: usize,
}

enum Chunked {
    Adopted(String),
    Generated { path: String, chunks: usize },
}

/// Chunk every document whose chunking gate is open.
pub fn run_chunking(
    handle: &mut RegistryHandle,
    layout: &DataLayout,
    chunker: &SectionChunker,
    checkpoint_every: usize,
    shutdown: &ShutdownSignal,
) -> Result<ChunkReport, StageError> {
    let mut result = ChunkReport {
        repaired: repair_flags(handle, layout),
        ..Default::default()
    };

    let decide = |doc: &DocumentRecord| gate::evaluate_on_disk(doc, Stage::Chunking, layout);
    let tally = GateTally::over(handle.registry(), decide);
    let selected = gate::select(handle.registry(), decide);
    report::preflight("Chunking", &tally);
    result.summary = StageSummary::new("Chunking", selected.len());

    for (position, index) in selected.into_iter().enumerate() {
        if shutdown.is_triggered() {
            result.summary.interrupted = true;
            break;
        }
        let doc = handle.registry().documents[index].clone();
        let label = item_label(&doc).to_string();
        report::progress(position + 1, result.summary.eligible, &label);

        let outcome = match chunk_document(&doc, layout, chunker) {
            Ok(chunked) => {
                let path = match chunked {
                    Chunked::Adopted(path) => {
                        result.adopted += 1;
                        tracing::info!(source_url = %label, path = %path, "Adopted existing chunk file");
                        path
                    }
                    Chunked::Generated { path, chunks } => {
                        result.generated += 1;
                        result.chunks_written += chunks;
                        tracing::info!(source_url = %label, path = %path, chunks, "Chunk file written");
                        path
                    }
                };
                handle.registry_mut().documents[index].mark_complete(Stage::Chunking, Some(path));
                ItemOutcome::Succeeded
            }
            Err(outcome) => outcome,
        };

        result.summary.record(&label, &outcome);
        if outcome == ItemOutcome::Succeeded {
            handle.checkpoint(checkpoint_every)?;
        }
    }

    handle.flush()?;
    Ok(result)
}

/// Reset `chunked` on records whose chunk file is missing or invalid.
fn repair_flags(handle: &mut RegistryHandle, layout: &DataLayout) -> usize {
    let broken: Vec<usize> = handle
        .registry()
        .documents
        .iter()
        .enumerate()
        .filter(|(_, doc)| doc.is_complete(Stage::Chunking))
        .filter(|(_, doc)| {
            doc.output_path(Stage::Chunking)
                .is_none_or(|stored| !is_valid_chunk_file(&layout.resolve(stored)))
        })
        .map(|(index, _)| index)
        .collect();
    if broken.is_empty() {
        return 0;
    }

    let registry = handle.registry_mut();
    for &index in &broken {
        let doc = &mut registry.documents[index];
        tracing::warn!(
            source_url = %item_label(doc),
            path = doc.output_path(Stage::Chunking).unwrap_or(""),
            "Chunk file missing or invalid; resetting chunked flag"
        );
        doc.mark_incomplete(Stage::Chunking);
    }
    broken.len()
}

fn chunk_document(
    doc: &DocumentRecord,
    layout: &DataLayout,
    chunker: &SectionChunker,
) -> Result<Chunked, ItemOutcome> {
    let target = output_target(layout, doc, Stage::Chunking)
        .ok_or_else(|| ItemOutcome::Skipped("no cleaned artifact path".to_string()))?;
    if is_valid_chunk_file(&target) {
        return Ok(Chunked::Adopted(layout.relativize(&target)));
    }

    let source = doc
        .input_path(Stage::Chunking)
        .map(|stored| layout.resolve(stored))
        .filter(|path| path.is_file())
        .ok_or_else(|| ItemOutcome::Skipped("cleaned artifact missing".to_string()))?;
    let text = std::fs::read_to_string(&source).map_err(|err| {
        ItemOutcome::Failed(format!("failed to read {}: {err}", source.display()))
    })?;

    let chunks = chunker.chunk(&text);
    if chunks.is_empty() {
        return Err(ItemOutcome::Failed("cleaned text produced no chunks".to_string()));
    }
    let count = chunks.len();
    let file = ChunkFile {
        document_type: doc.document_type.clone(),
        chunks,
        extra: Map::new(),
    };
    write_chunk_file(&target, &file).map_err(|err| ItemOutcome::Failed(err.to_string()))?;
    Ok(Chunked::Generated {
        path: layout.relativize(&target),
        chunks: count,
    })
}
