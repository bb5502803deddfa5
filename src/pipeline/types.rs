//! Per-item outcomes, stage summaries, and systemic stage errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::chunking::ChunkFileError;
use crate::embedding_log::EmbeddingLogError;
use crate::metadata_store::MetadataStoreError;
use crate::pipeline::DataLayout;
use crate::qdrant::QdrantError;
use crate::registry::{DocumentRecord, RegistryError, Stage};

/// Systemic failures that abort a stage before (further) state is mutated.
#[derive(Debug, Error)]
pub enum StageError {
    /// Registry missing, unparsable, or unsaveable.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Embedding log unreadable or unwritable.
    #[error(transparent)]
    EmbeddingLog(#[from] EmbeddingLogError),
    /// Vector index unreachable at startup.
    #[error("Vector index unavailable: {0}")]
    VectorIndex(#[from] QdrantError),
    /// Metadata store unreachable at startup.
    #[error("Metadata store unavailable: {0}")]
    MetadataStore(#[from] MetadataStoreError),
    /// Chunk tree could not be walked or written.
    #[error(transparent)]
    ChunkFiles(#[from] ChunkFileError),
}

/// Result of processing one document or record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Work done and recorded.
    Succeeded,
    /// Not processable as-is; left untouched.
    Skipped(String),
    /// Processing failed; the item stays eligible for the next run.
    Failed(String),
}

/// A per-item failure kept for the final summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Document identity or record id.
    pub item: String,
    /// Why it failed.
    pub reason: String,
}

/// Aggregated outcomes of one stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSummary {
    /// Stage label used in output.
    pub stage: String,
    /// Items the gate selected.
    pub eligible: usize,
    /// Items processed successfully.
    pub succeeded: usize,
    /// Items skipped.
    pub skipped: usize,
    /// Items that failed.
    pub failed: usize,
    /// Failures in encounter order.
    pub failures: Vec<ItemFailure>,
    /// Whether the run stopped early on an interrupt.
    pub interrupted: bool,
}

impl StageSummary {
    /// Empty summary for `stage` with `eligible` selected items.
    pub fn new(stage: impl Into<String>, eligible: usize) -> Self {
        Self {
            stage: stage.into(),
            eligible,
            ..Default::default()
        }
    }

    /// Count one outcome.
    pub fn record(&mut self, item: &str, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Skipped(reason) => {
                self.skipped += 1;
                tracing::info!(item, reason = %reason, stage = %self.stage, "Skipped");
            }
            ItemOutcome::Failed(reason) => {
                self.failed += 1;
                tracing::error!(item, reason = %reason, stage = %self.stage, "Failed");
                self.failures.push(ItemFailure {
                    item: item.to_string(),
                    reason: reason.clone(),
                });
            }
        }
    }

    /// Items handled so far.
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// Where `stage` should write for `doc`: the recorded path when present, otherwise the path
/// mirrored from the input artifact.
pub fn output_target(layout: &DataLayout, doc: &DocumentRecord, stage: Stage) -> Option<PathBuf> {
    doc.output_path(stage)
        .map(|stored| layout.resolve(stored))
        .or_else(|| layout.expected_output(doc, stage))
}

/// Label used for a document in logs and summaries.
pub fn item_label(doc: &DocumentRecord) -> &str {
    if doc.source_url.is_empty() {
        doc.title_or_empty()
    } else {
        &doc.source_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = StageSummary::new("Cleaning", 3);
        summary.record("a", &ItemOutcome::Succeeded);
        summary.record("b", &ItemOutcome::Skipped("no cleaning profile".into()));
        summary.record("c", &ItemOutcome::Failed("unreadable".into()));
        assert_eq!(
            (summary.succeeded, summary.skipped, summary.failed),
            (1, 1, 1)
        );
        assert_eq!(summary.processed(), 3);
        assert_eq!(
            summary.failures,
            vec![ItemFailure {
                item: "c".into(),
                reason: "unreadable".into()
            }]
        );
    }

    #[test]
    fn recorded_output_path_wins_over_mirrored_path() {
        let layout = DataLayout::rooted_at(Path::new("/srv"));
        let mut doc = DocumentRecord {
            raw_path: Some("data/raw/kp-code/act.pdf".into()),
            ..Default::default()
        };
        assert_eq!(
            output_target(&layout, &doc, Stage::Extraction),
            Some(Path::new("/srv/data/text/kp-code/act.txt").to_path_buf())
        );
        doc.text_path = Some("data/text/elsewhere/act.txt".into());
        assert_eq!(
            output_target(&layout, &doc, Stage::Extraction),
            Some(Path::new("/srv/data/text/elsewhere/act.txt").to_path_buf())
        );
    }
}
