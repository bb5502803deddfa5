//! Cleaning stage driver.

use crate::cleaning::{self, CleanOutcome, SourceProfile, ValidationRejection};
use crate::gate::{self, GateTally};
use crate::persist::write_atomic;
use crate::pipeline::report;
use crate::pipeline::types::{ItemOutcome, StageError, StageSummary, item_label, output_target};
use crate::pipeline::{DataLayout, ShutdownSignal};
use crate::registry::{CleaningInfo, DocumentRecord, RegistryHandle, Stage, registry_timestamp};

/// Outcome of a cleaning run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanReport {
    /// Per-document outcomes.
    pub summary: StageSummary,
    /// Characters read across cleaned documents.
    pub original_chars: usize,
    /// Characters written across cleaned documents.
    pub cleaned_chars: usize,
    /// Transformations vetoed by validation; the original text was written instead.
    pub rejections: Vec<ValidationRejection>,
}

impl CleanReport {
    /// Overall percentage of characters removed.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_chars == 0 {
            return 0.0;
        }
        let removed = self.original_chars as f64 - self.cleaned_chars as f64;
        (removed / self.original_chars as f64 * 10_000.0).round() / 100.0
    }
}

struct Cleaned {
    outcome: CleanOutcome,
    profile: SourceProfile,
    input: String,
    output: String,
}

/// Clean every document whose cleaning gate is open.
pub fn run_cleaning(
    handle: &mut RegistryHandle,
    layout: &DataLayout,
    checkpoint_every: usize,
    shutdown: &ShutdownSignal,
) -> Result<CleanReport, StageError> {
    let decide = |doc: &DocumentRecord| gate::evaluate_on_disk(doc, Stage::Cleaning, layout);
    let tally = GateTally::over(handle.registry(), decide);
    let selected = gate::select(handle.registry(), decide);
    report::preflight("Cleaning", &tally);

    let mut result = CleanReport {
        summary: StageSummary::new("Cleaning", selected.len()),
        ..Default::default()
    };

    for (position, index) in selected.into_iter().enumerate() {
        if shutdown.is_triggered() {
            result.summary.interrupted = true;
            break;
        }
        let doc = handle.registry().documents[index].clone();
        let label = item_label(&doc).to_string();
        report::progress(position + 1, result.summary.eligible, &label);

        let outcome = match clean_document(&doc, layout) {
            Ok(cleaned) => {
                let rejection = cleaned
                    .outcome
                    .violation
                    .clone()
                    .map(|violation| ValidationRejection::new(cleaned.input.clone(), violation));
                if let Some(rejection) = &rejection {
                    tracing::warn!(
                        source_url = %label,
                        path = %rejection.file,
                        reason = %rejection.reason,
                        details = %rejection.details,
                        "Cleaning vetoed; original text kept"
                    );
                }
                result.original_chars += cleaned.outcome.original_chars;
                result.cleaned_chars += cleaned.outcome.cleaned_chars;

                let record = &mut handle.registry_mut().documents[index];
                record.cleaning_info = Some(CleaningInfo {
                    cleaned_at: registry_timestamp(),
                    profile: cleaned.profile.name().to_string(),
                    original_size: cleaned.outcome.original_chars,
                    cleaned_size: cleaned.outcome.cleaned_chars,
                    reduction_percent: cleaned.outcome.reduction_percent(),
                    rejection: rejection
                        .as_ref()
                        .and_then(|rejection| serde_json::to_value(rejection).ok()),
                });
                tracing::info!(
                    source_url = %label,
                    path = %cleaned.output,
                    profile = %cleaned.profile,
                    original_chars = cleaned.outcome.original_chars,
                    cleaned_chars = cleaned.outcome.cleaned_chars,
                    "Text cleaned"
                );
                record.mark_complete(Stage::Cleaning, Some(cleaned.output));
                result.rejections.extend(rejection);
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

fn clean_document(doc: &DocumentRecord, layout: &DataLayout) -> Result<Cleaned, ItemOutcome> {
    let profile = doc
        .source_website
        .as_deref()
        .and_then(SourceProfile::for_source_website)
        .ok_or_else(|| ItemOutcome::Skipped("no cleaning profile".to_string()))?;
    let input = doc
        .input_path(Stage::Cleaning)
        .ok_or_else(|| ItemOutcome::Skipped("text artifact missing".to_string()))?;
    let source = layout.resolve(input);
    if !source.is_file() {
        return Err(ItemOutcome::Skipped("text artifact missing".to_string()));
    }
    let target = output_target(layout, doc, Stage::Cleaning)
        .ok_or_else(|| ItemOutcome::Skipped("no cleaned artifact path".to_string()))?;

    let text = std::fs::read_to_string(&source).map_err(|err| {
        ItemOutcome::Failed(format!("failed to read {}: {err}", source.display()))
    })?;
    let outcome = cleaning::clean(&text, profile);
    write_atomic(&target, outcome.text.as_bytes()).map_err(|err| {
        ItemOutcome::Failed(format!("failed to write {}: {err}", target.display()))
    })?;

    Ok(Cleaned {
        outcome,
        profile,
        input: layout.relativize(&source),
        output: layout.relativize(&target),
    })
}
