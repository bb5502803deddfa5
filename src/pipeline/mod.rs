//! Stage drivers.
//!
//! Every driver follows the same cycle: evaluate the stage gate over the whole registry, print
//! the pre-flight tally, process the selected documents one at a time, and record each result
//! as an [`ItemOutcome`]. Per-item failures never abort a run; only [`StageError`]s do.

pub mod chunk;
pub mod clean;
pub mod embed;
pub mod extract;
mod layout;
pub mod maintenance;
pub mod report;
mod shutdown;
pub mod status;
pub mod types;
pub mod upload;

pub use chunk::{ChunkReport, run_chunking};
pub use clean::{CleanReport, run_cleaning};
pub use embed::{EmbedReport, EmbedSettings, embedding_input, run_embedding};
pub use extract::{ExtractReport, run_extraction};
pub use layout::DataLayout;
pub use maintenance::{DedupeReport, run_dedupe, run_scaffold};
pub use shutdown::ShutdownSignal;
pub use status::{StatusReport, collect_status};
pub use types::{ItemOutcome, StageError, StageSummary};
pub use upload::{UploadReport, UploadSettings, run_upload};
