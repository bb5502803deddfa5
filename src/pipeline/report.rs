//! Operator-facing output: pre-flight counts, progress lines, and run summaries on stdout.

use std::fmt;

use crate::chunking::ScaffoldReport;
use crate::gate::GateTally;
use crate::pipeline::chunk::ChunkReport;
use crate::pipeline::clean::CleanReport;
use crate::pipeline::embed::EmbedReport;
use crate::pipeline::extract::ExtractReport;
use crate::pipeline::maintenance::DedupeReport;
use crate::pipeline::status::StatusReport;
use crate::pipeline::types::StageSummary;
use crate::pipeline::upload::UploadReport;

/// Rejections printed in full before the rest are only counted.
const REJECTIONS_SHOWN: usize = 10;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Print the gate tally before any work starts.
pub fn preflight(stage: &str, tally: &GateTally) {
    println!(
        "{stage}: {} eligible, {} already complete, {} waiting on upstream",
        tally.eligible, tally.complete, tally.upstream_incomplete
    );
}

/// Print the upload pre-flight line.
pub fn preflight_records(records: usize, pending: usize) {
    println!(
        "Upload: {pending} of {records} records pending, {} already uploaded",
        records - pending
    );
}

/// Print a per-item progress line.
pub fn progress(current: usize, total: usize, item: &str) {
    println!("[{current}/{total}] {item}");
}

/// Print an upload progress line.
pub fn upload_progress(done: usize, total: usize) {
    println!("Uploaded {done}/{total} records");
}

fn megabytes(chars: usize) -> f64 {
    chars as f64 / BYTES_PER_MB
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.interrupted { " (interrupted)" } else { "" };
        writeln!(f, "{} summary{state}", self.stage)?;
        writeln!(f, "  eligible:  {}", self.eligible)?;
        writeln!(f, "  succeeded: {}", self.succeeded)?;
        writeln!(f, "  skipped:   {}", self.skipped)?;
        write!(f, "  failed:    {}", self.failed)?;
        for failure in &self.failures {
            write!(f, "\n    {}: {}", failure.item, failure.reason)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        write!(f, "  ocr used:  {}", self.ocr_used)
    }
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        writeln!(
            f,
            "  characters: {} -> {} ({:.2} MB -> {:.2} MB, {:.2}% reduction)",
            self.original_chars,
            self.cleaned_chars,
            megabytes(self.original_chars),
            megabytes(self.cleaned_chars),
            self.reduction_percent()
        )?;
        write!(f, "  validation rejections: {}", self.rejections.len())?;
        for rejection in self.rejections.iter().take(REJECTIONS_SHOWN) {
            write!(
                f,
                "\n    {}: {} ({})",
                rejection.file, rejection.reason, rejection.details
            )?;
        }
        if self.rejections.len() > REJECTIONS_SHOWN {
            write!(
                f,
                "\n    ... and {} more",
                self.rejections.len() - REJECTIONS_SHOWN
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ChunkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        writeln!(f, "  flags repaired: {}", self.repaired)?;
        writeln!(f, "  adopted:        {}", self.adopted)?;
        write!(
            f,
            "  generated:      {} ({} chunks)",
            self.generated, self.chunks_written
        )
    }
}

impl fmt::Display for EmbedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        write!(f, "  chunks appended: {}", self.chunks_appended)?;
        if let (Some(first), Some(last)) = (self.first_id, self.last_id) {
            write!(f, " (ids {first}..={last})")?;
        }
        Ok(())
    }
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        writeln!(f, "  previously uploaded: {}", self.already_uploaded)?;
        if self.collection_created {
            writeln!(f, "  collection created")?;
        }
        write!(
            f,
            "  log rewritten: {}",
            if self.log_rewritten { "yes" } else { "no" }
        )
    }
}

impl fmt::Display for DedupeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Removed {} duplicate entries.", self.removed)?;
        write!(f, "Total documents now: {}", self.after())?;
        if self.counters_repaired {
            write!(f, "\nCounters recomputed.")?;
        }
        if !self.duplicate_source_urls.is_empty() {
            write!(
                f,
                "\n{} source URLs still appear on more than one record:",
                self.duplicate_source_urls.len()
            )?;
            for url in &self.duplicate_source_urls {
                write!(f, "\n  {url}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ScaffoldReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scanned {} cleaned files: {} placeholders created, {} chunk files already present",
            self.scanned, self.created, self.existing
        )
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counters = &self.counters;
        writeln!(f, "documents: {}", counters.total_documents)?;
        writeln!(
            f,
            "extracted: {}  cleaned: {}  chunked: {}  embedded: {}",
            counters.total_extracted,
            counters.total_cleaned,
            counters.total_chunked,
            counters.total_embedded
        )?;
        if !self.counters_consistent {
            writeln!(f, "stored counters are stale; the next save recomputes them")?;
        }
        for status in &self.stages {
            writeln!(
                f,
                "{:<10} eligible {:>6}  complete {:>6}  waiting {:>6}",
                status.stage.to_string(),
                status.tally.eligible,
                status.tally.complete,
                status.tally.upstream_incomplete
            )?;
        }
        write!(
            f,
            "embedding log: {} records, {} pending upload",
            self.log_records, self.pending_upload
        )?;
        if self.unparsed_lines > 0 {
            write!(f, ", {} unparsable lines", self.unparsed_lines)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::{RejectionReason, ValidationRejection};
    use crate::pipeline::types::ItemOutcome;

    #[test]
    fn clean_summary_lists_first_rejections_and_counts_the_rest() {
        let rejections = (0..12)
            .map(|n| ValidationRejection {
                file: format!("data/text/kp-code/{n}.txt"),
                reason: RejectionReason::ExcessiveReduction,
                details: "retained 40%".into(),
            })
            .collect();
        let report = CleanReport {
            summary: StageSummary::new("Cleaning", 12),
            original_chars: 2_000,
            cleaned_chars: 1_500,
            rejections,
        };
        let text = report.to_string();
        assert!(text.contains("validation rejections: 12"));
        assert!(text.contains("data/text/kp-code/9.txt: excessive reduction (retained 40%)"));
        assert!(!text.contains("data/text/kp-code/10.txt"));
        assert!(text.contains("... and 2 more"));
        assert!(text.contains("25.00% reduction"));
    }

    #[test]
    fn summary_marks_interrupted_runs() {
        let mut summary = StageSummary::new("Embedding", 4);
        summary.record("doc", &ItemOutcome::Failed("dimension mismatch".into()));
        summary.interrupted = true;
        let text = summary.to_string();
        assert!(text.starts_with("Embedding summary (interrupted)"));
        assert!(text.contains("doc: dimension mismatch"));
    }
}
