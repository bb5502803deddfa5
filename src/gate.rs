//! Stage gates: decide, per document and stage, whether work is needed.
//!
//! Gates are evaluated fresh against the filesystem on every run so that artifacts deleted
//! behind the pipeline's back are detected and rebuilt.

use crate::chunking::is_valid_chunk_file;
use crate::pipeline::DataLayout;
use crate::registry::{DocumentRecord, Registry, Stage};

/// Outcome of evaluating a stage gate, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateDecision {
    /// The upstream stage has not completed; the document must wait.
    UpstreamIncomplete,
    /// No output path is recorded.
    PathUnset,
    /// The stage's own completion flag is false.
    FlagUnset,
    /// The recorded artifact is missing (or unusable) on disk.
    ArtifactMissing,
    /// Nothing to do.
    Complete,
}

impl GateDecision {
    /// Whether the stage should process the document.
    pub const fn needs_processing(self) -> bool {
        matches!(
            self,
            GateDecision::PathUnset | GateDecision::FlagUnset | GateDecision::ArtifactMissing
        )
    }

    /// Short label for status output.
    pub const fn label(self) -> &'static str {
        match self {
            GateDecision::UpstreamIncomplete => "waiting on upstream",
            GateDecision::PathUnset => "no output path",
            GateDecision::FlagUnset => "flag unset",
            GateDecision::ArtifactMissing => "artifact missing",
            GateDecision::Complete => "complete",
        }
    }
}

/// Evaluate the gate of a file-producing stage.
///
/// `artifact_ok` reports whether a stored output path refers to a usable artifact.
pub fn evaluate(
    doc: &DocumentRecord,
    stage: Stage,
    artifact_ok: impl Fn(&str) -> bool,
) -> GateDecision {
    if let Some(upstream) = stage.upstream()
        && !doc.is_complete(upstream)
    {
        return GateDecision::UpstreamIncomplete;
    }
    let Some(path) = doc.output_path(stage) else {
        return GateDecision::PathUnset;
    };
    if !doc.is_complete(stage) {
        return GateDecision::FlagUnset;
    }
    if !artifact_ok(path) {
        return GateDecision::ArtifactMissing;
    }
    GateDecision::Complete
}

/// Evaluate the gate of a file-producing stage against the real filesystem.
///
/// Chunk files must also be valid, since placeholders and empty files are not chunk output.
pub fn evaluate_on_disk(doc: &DocumentRecord, stage: Stage, layout: &DataLayout) -> GateDecision {
    evaluate(doc, stage, |stored| {
        let path = layout.resolve(stored);
        match stage {
            Stage::Chunking => is_valid_chunk_file(&path),
            _ => path.is_file(),
        }
    })
}

/// Evaluate embedding eligibility.
///
/// A chunked document qualifies when its flag is unset, or when the flag is set but no record
/// in the embedding log belongs to it (`is_logged` answers that).
pub fn evaluate_embedding(
    doc: &DocumentRecord,
    is_logged: impl Fn(&DocumentRecord) -> bool,
) -> GateDecision {
    if !doc.is_complete(Stage::Chunking) {
        return GateDecision::UpstreamIncomplete;
    }
    if !doc.is_complete(Stage::Embedding) {
        return GateDecision::FlagUnset;
    }
    if !is_logged(doc) {
        return GateDecision::ArtifactMissing;
    }
    GateDecision::Complete
}

/// Indices of every record whose gate says work is needed, in registry order.
pub fn select(registry: &Registry, decide: impl Fn(&DocumentRecord) -> GateDecision) -> Vec<usize> {
    registry
        .documents
        .iter()
        .enumerate()
        .filter(|(_, doc)| decide(doc).needs_processing())
        .map(|(index, _)| index)
        .collect()
}

/// Per-decision counts for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateTally {
    /// Waiting on upstream.
    pub upstream_incomplete: usize,
    /// Needing work.
    pub eligible: usize,
    /// Already complete.
    pub complete: usize,
}

impl GateTally {
    /// Tally decisions over every record.
    pub fn over(registry: &Registry, decide: impl Fn(&DocumentRecord) -> GateDecision) -> Self {
        let mut tally = Self::default();
        for doc in &registry.documents {
            match decide(doc) {
                GateDecision::UpstreamIncomplete => tally.upstream_incomplete += 1,
                GateDecision::Complete => tally.complete += 1,
                _ => tally.eligible += 1,
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(upstream: bool, path: Option<&str>, flag: bool) -> DocumentRecord {
        let mut doc = DocumentRecord {
            source_url: "https://example.org/doc".into(),
            raw_path: Some("data/raw/a.pdf".into()),
            ..Default::default()
        };
        doc.processing_status.text_extracted = upstream;
        doc.cleaned_path = path.map(str::to_string);
        doc.processing_status.text_cleaned = flag;
        doc
    }

    #[test]
    fn cleaning_gate_follows_precedence_for_every_combination() {
        for upstream in [false, true] {
            for path in [None, Some("data/cleaned/a.txt")] {
                for flag in [false, true] {
                    for exists in [false, true] {
                        let record = doc(upstream, path, flag);
                        let decision = evaluate(&record, Stage::Cleaning, |_| exists);
                        let expected = if !upstream {
                            GateDecision::UpstreamIncomplete
                        } else if path.is_none() {
                            GateDecision::PathUnset
                        } else if !flag {
                            GateDecision::FlagUnset
                        } else if !exists {
                            GateDecision::ArtifactMissing
                        } else {
                            GateDecision::Complete
                        };
                        assert_eq!(
                            decision, expected,
                            "upstream={upstream} path={path:?} flag={flag} exists={exists}"
                        );
                        assert_eq!(
                            decision.needs_processing(),
                            upstream && !(path.is_some() && flag && exists)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn extraction_has_no_upstream() {
        let record = DocumentRecord {
            raw_path: Some("data/raw/a.pdf".into()),
            ..Default::default()
        };
        assert_eq!(
            evaluate(&record, Stage::Extraction, |_| true),
            GateDecision::PathUnset
        );
    }

    #[test]
    fn null_string_path_counts_as_unset() {
        let record = doc(true, Some("null"), true);
        assert_eq!(
            evaluate(&record, Stage::Cleaning, |_| true),
            GateDecision::PathUnset
        );
    }

    #[test]
    fn on_disk_gate_notices_deleted_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::rooted_at(dir.path());
        let record = doc(true, Some("data/cleaned/a.txt"), true);
        assert_eq!(
            evaluate_on_disk(&record, Stage::Cleaning, &layout),
            GateDecision::ArtifactMissing
        );

        let cleaned = layout.resolve("data/cleaned/a.txt");
        std::fs::create_dir_all(cleaned.parent().expect("parent")).expect("mkdir");
        std::fs::write(&cleaned, "text").expect("write");
        assert_eq!(
            evaluate_on_disk(&record, Stage::Cleaning, &layout),
            GateDecision::Complete
        );
    }

    #[test]
    fn embedding_gate_rechecks_the_log() {
        let mut record = DocumentRecord::default();
        assert_eq!(
            evaluate_embedding(&record, |_| false),
            GateDecision::UpstreamIncomplete
        );
        record.processing_status.chunked = true;
        assert_eq!(evaluate_embedding(&record, |_| true), GateDecision::FlagUnset);
        record.processing_status.embedded = true;
        assert_eq!(
            evaluate_embedding(&record, |_| false),
            GateDecision::ArtifactMissing
        );
        assert_eq!(evaluate_embedding(&record, |_| true), GateDecision::Complete);
    }

    #[test]
    fn select_and_tally_agree() {
        let registry = Registry {
            documents: vec![
                doc(false, None, false),
                doc(true, None, false),
                doc(true, Some("c.txt"), true),
            ],
            ..Default::default()
        };
        let decide = |record: &DocumentRecord| evaluate(record, Stage::Cleaning, |_| true);
        assert_eq!(select(&registry, decide), vec![1]);
        let tally = GateTally::over(&registry, decide);
        assert_eq!(
            tally,
            GateTally {
                upstream_incomplete: 1,
                eligible: 1,
                complete: 1
            }
        );
    }
}
