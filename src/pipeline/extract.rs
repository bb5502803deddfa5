//! Extraction stage driver.

use std::path::PathBuf;

use crate::extraction::{Extraction, ExtractionError, Extractor};
use crate::gate::{self, GateTally};
use crate::persist::write_atomic;
use crate::pipeline::report;
use crate::pipeline::types::{ItemOutcome, StageError, StageSummary, item_label, output_target};
use crate::pipeline::{DataLayout, ShutdownSignal};
use crate::registry::{DocumentRecord, ExtractionInfo, RegistryHandle, Stage, registry_timestamp};

/// Outcome of an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Per-document outcomes.
    pub summary: StageSummary,
    /// Documents where at least one page needed OCR.
    pub ocr_used: usize,
}

/// Extract text for every document whose extraction gate is open.
pub fn run_extraction(
    handle: &mut RegistryHandle,
    layout: &DataLayout,
    extractor: &Extractor,
    checkpoint_every: usize,
    shutdown: &ShutdownSignal,
) -> Result<ExtractReport, StageError> {
    let decide = |doc: &DocumentRecord| gate::evaluate_on_disk(doc, Stage::Extraction, layout);
    let tally = GateTally::over(handle.registry(), decide);
    let selected = gate::select(handle.registry(), decide);
    report::preflight("Extraction", &tally);

    let mut result = ExtractReport {
        summary: StageSummary::new("Extraction", selected.len()),
        ocr_used: 0,
    };

    for (position, index) in selected.into_iter().enumerate() {
        if shutdown.is_triggered() {
            result.summary.interrupted = true;
            break;
        }
        let doc = handle.registry().documents[index].clone();
        let label = item_label(&doc).to_string();
        report::progress(position + 1, result.summary.eligible, &label);

        let extracted = extract_document(&doc, layout, extractor);
        if shutdown.is_triggered() {
            tracing::warn!(
                source_url = %label,
                "Interrupted mid-extraction; leaving document pending"
            );
            result.summary.interrupted = true;
            break;
        }
        let outcome = match extracted.and_then(|(extraction, target)| {
            write_atomic(&target, extraction.text.as_bytes()).map_err(|err| {
                ItemOutcome::Failed(format!("failed to write {}: {err}", target.display()))
            })?;
            Ok((extraction, layout.relativize(&target)))
        }) {
            Ok((extraction, stored_path)) => {
                if extraction.ocr_used {
                    result.ocr_used += 1;
                }
                let record = &mut handle.registry_mut().documents[index];
                record.extraction_info = Some(ExtractionInfo {
                    extracted_at: registry_timestamp(),
                    method: extraction.method().to_string(),
                    ocr_used: extraction.ocr_used,
                    text_length: extraction.text.chars().count(),
                    word_count: extraction.word_count(),
                });
                tracing::info!(
                    source_url = %label,
                    path = %stored_path,
                    pages = extraction.page_count,
                    ocr_used = extraction.ocr_used,
                    "Text extracted"
                );
                record.mark_complete(Stage::Extraction, Some(stored_path));
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

/// Extract and durably write one document's text; returns the stored output path.
fn extract_document(
    doc: &DocumentRecord,
    layout: &DataLayout,
    extractor: &Extractor,
) -> Result<(Extraction, PathBuf), ItemOutcome> {
    let raw = doc
        .input_path(Stage::Extraction)
        .ok_or_else(|| ItemOutcome::Skipped("no raw artifact path".to_string()))?;
    let source = layout.resolve(raw);
    let target = output_target(layout, doc, Stage::Extraction)
        .ok_or_else(|| ItemOutcome::Skipped("no text artifact path".to_string()))?;
    if !source.is_file() {
        return Err(ItemOutcome::Failed(format!(
            "raw artifact missing: {}",
            source.display()
        )));
    }

    let extraction = extractor.extract(&source).map_err(|err| match err {
        ExtractionError::Unsupported(_) => ItemOutcome::Skipped("unsupported file type".to_string()),
        other => ItemOutcome::Failed(other.to_string()),
    })?;
    Ok((extraction, target))
}
