//! Registry and data-tree maintenance tools.

use crate::chunking::{ScaffoldReport, scaffold_placeholders};
use crate::pipeline::DataLayout;
use crate::pipeline::types::StageError;
use crate::registry::RegistryHandle;

/// Outcome of a registry dedupe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeReport {
    /// Records before the pass.
    pub before: usize,
    /// Records removed for sharing a `raw_path` with an earlier record.
    pub removed: usize,
    /// Identities still shared by more than one record.
    pub duplicate_source_urls: Vec<String>,
    /// Whether stored counters disagreed with the records.
    pub counters_repaired: bool,
}

impl DedupeReport {
    /// Records after the pass.
    pub fn after(&self) -> usize {
        self.before - self.removed
    }
}

/// Remove records sharing a `raw_path` (first wins) and repair counters.
///
/// The registry is saved only when something changed.
pub fn run_dedupe(handle: &mut RegistryHandle) -> Result<DedupeReport, StageError> {
    let before = handle.registry().documents.len();
    let stale_counters =
        handle.registry().stored_counters() != handle.registry().derived_counters();

    let mut removed = 0;
    if stale_counters || handle.registry().duplicate_raw_paths() > 0 {
        removed = handle.registry_mut().dedupe_by_raw_path();
        handle.flush()?;
        tracing::info!(
            removed,
            remaining = before - removed,
            registry = %handle.path().display(),
            "Registry deduplicated"
        );
    }

    Ok(DedupeReport {
        before,
        removed,
        duplicate_source_urls: handle.registry().duplicate_source_urls(),
        counters_repaired: stale_counters,
    })
}

/// Create `{}` chunk placeholders for every cleaned artifact that has no chunk file.
pub fn run_scaffold(layout: &DataLayout) -> Result<ScaffoldReport, StageError> {
    let report = scaffold_placeholders(&layout.cleaned_dir(), &layout.chunks_dir())?;
    tracing::info!(
        scanned = report.scanned,
        created = report.created,
        existing = report.existing,
        "Chunk placeholders scaffolded"
    );
    Ok(report)
}
