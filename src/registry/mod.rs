//! The document registry: the single source of truth for per-document pipeline progress.

mod store;
mod types;

pub use store::{RegistryError, RegistryHandle, RegistryStore, registry_timestamp};
pub use types::{
    CleaningInfo, DocumentRecord, DocumentStatus, ExtractionInfo, ProcessingStatus, Registry,
    RegistryCounters, Stage,
};
