use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;

use super::types::Registry;
use crate::persist::write_atomic;

/// Failures while loading or persisting the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry file does not exist.
    #[error("Registry not found at {0}")]
    Missing(PathBuf),
    /// Reading or writing the registry failed.
    #[error("Registry I/O failed for {path}: {source}")]
    Io {
        /// Registry location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The registry content is not valid registry JSON.
    #[error("Registry at {path} is unparsable: {source}")]
    Parse {
        /// Registry location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The in-memory registry could not be serialized.
    #[error("Failed to serialize registry: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Location of the registry file and its load/save operations.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    /// Point at the registry file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the registry. A missing or unparsable file is an error, never an empty registry.
    pub fn load(&self) -> Result<Registry, RegistryError> {
        let bytes = std::fs::read(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RegistryError::Missing(self.path.clone())
            } else {
                RegistryError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Recompute counters, stamp `last_updated`, and replace the file atomically.
    pub fn save(&self, registry: &mut Registry) -> Result<(), RegistryError> {
        registry.recompute_counters();
        registry.last_updated = Some(registry_timestamp());
        let mut bytes = serde_json::to_vec_pretty(registry).map_err(RegistryError::Serialize)?;
        bytes.push(b'\n');
        write_atomic(&self.path, &bytes).map_err(|source| RegistryError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(
            registry = %self.path.display(),
            documents = registry.total_documents,
            "Registry saved"
        );
        Ok(())
    }
}

/// An open registry plus a dirty marker so stages only write when something changed.
#[derive(Debug)]
pub struct RegistryHandle {
    store: RegistryStore,
    registry: Registry,
    dirty: bool,
    changes_since_save: usize,
}

impl RegistryHandle {
    /// Load the registry at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let store = RegistryStore::new(path);
        let registry = store.load()?;
        Ok(Self {
            store,
            registry,
            dirty: false,
            changes_since_save: 0,
        })
    }

    /// Read-only view of the records.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access; marks the registry as changed.
    pub fn registry_mut(&mut self) -> &mut Registry {
        self.dirty = true;
        &mut self.registry
    }

    /// Registry location.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Whether unsaved changes exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Count one processed document and save once `every` have accumulated.
    pub fn checkpoint(&mut self, every: usize) -> Result<(), RegistryError> {
        self.changes_since_save += 1;
        if self.changes_since_save >= every.max(1) {
            self.flush()?;
        }
        Ok(())
    }

    /// Save if anything changed since the last save.
    pub fn flush(&mut self) -> Result<(), RegistryError> {
        self.changes_since_save = 0;
        if !self.dirty {
            return Ok(());
        }
        self.store.save(&mut self.registry)?;
        self.dirty = false;
        Ok(())
    }
}

/// Local wall-clock timestamp in the registry's `YYYY-MM-DD hh:mm:ss AM` form.
pub fn registry_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_timestamp(now)
}

fn format_timestamp(moment: OffsetDateTime) -> String {
    let parsed = time::format_description::parse(
        "[year]-[month]-[day] [hour repr:12]:[minute]:[second] [period]",
    );
    parsed
        .ok()
        .and_then(|format| moment.format(&format).ok())
        .unwrap_or_else(|| moment.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DocumentRecord, Stage};
    use serde_json::json;

    fn write_registry(dir: &Path, value: serde_json::Value) -> PathBuf {
        let path = dir.join("documents_metadata.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&value).expect("json")).expect("write");
        path
    }

    #[test]
    fn missing_registry_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = RegistryStore::new(dir.path().join("absent.json"))
            .load()
            .expect_err("missing file");
        assert!(matches!(err, RegistryError::Missing(_)));
    }

    #[test]
    fn unparsable_registry_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");
        let err = RegistryStore::new(&path).load().expect_err("broken file");
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn save_recomputes_counters_and_stamps_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_registry(
            dir.path(),
            json!({
                "total_documents": 99,
                "documents": [
                    {"source_url": "a", "processing_status": {"text_extracted": true}},
                    {"source_url": "b"}
                ]
            }),
        );

        let store = RegistryStore::new(&path);
        let mut registry = store.load().expect("load");
        store.save(&mut registry).expect("save");

        let saved: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(saved["total_documents"], 2);
        assert_eq!(saved["total_extracted"], 1);
        let stamp = saved["last_updated"].as_str().expect("timestamp");
        assert!(stamp.ends_with("AM") || stamp.ends_with("PM"), "{stamp}");
    }

    #[test]
    fn flush_is_a_no_op_without_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_registry(dir.path(), json!({"documents": []}));
        let before = std::fs::read(&path).expect("read");

        let mut handle = RegistryHandle::open(&path).expect("open");
        handle.flush().expect("flush");
        assert_eq!(std::fs::read(&path).expect("read"), before);

        handle.registry_mut().documents.push(DocumentRecord {
            source_url: "new".into(),
            ..Default::default()
        });
        handle.checkpoint(1).expect("checkpoint");
        assert!(!handle.is_dirty());
        let reloaded = RegistryStore::new(&path).load().expect("reload");
        assert_eq!(reloaded.total_documents, 1);
    }

    #[test]
    fn checkpoint_waits_for_interval() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_registry(dir.path(), json!({"documents": [{"source_url": "a"}]}));
        let mut handle = RegistryHandle::open(&path).expect("open");

        handle.registry_mut().documents[0]
            .mark_complete(Stage::Extraction, Some("data/text/a.txt".into()));
        handle.checkpoint(3).expect("first");
        assert!(handle.is_dirty());
        handle.checkpoint(3).expect("second");
        handle.checkpoint(3).expect("third");
        assert!(!handle.is_dirty());
    }

    #[test]
    fn timestamp_uses_twelve_hour_clock() {
        let moment = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid");
        assert_eq!(format_timestamp(moment), "2023-11-14 10:13:20 PM");
    }
}
