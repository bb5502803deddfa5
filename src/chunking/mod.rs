//! Chunk files: format, validity, the built-in section chunker, and placeholder scaffolding.

mod sections;
mod tokens;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use walkdir::WalkDir;

use crate::persist::write_atomic;

pub use sections::{SectionChunker, body_digest};
pub use tokens::{TokenCounter, split_to_budget, token_counter, whitespace_counter};

/// Smallest byte size a real chunk file can have.
const MIN_CHUNK_FILE_BYTES: u64 = 5;

/// Failures reading or writing chunk files.
#[derive(Debug, Error)]
pub enum ChunkFileError {
    /// Filesystem access failed.
    #[error("Chunk file I/O failed for {path}: {source}")]
    Io {
        /// Chunk file location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a chunk file.
    #[error("Chunk file {path} is malformed: {source}")]
    Malformed {
        /// Chunk file location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The file parses but lists no chunks.
    #[error("Chunk file {0} contains no chunks")]
    Empty(PathBuf),
}

/// One retrieval unit of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Ordinal within the document (kept as written by external chunkers).
    #[serde(default)]
    pub chunk_index: Value,
    /// `preamble`, `section`, `passage`, or a label from an external chunker.
    #[serde(default)]
    pub chunk_type: Option<String>,
    /// Heading of the unit.
    #[serde(default)]
    pub chunk_title: Option<String>,
    /// Body text.
    #[serde(default)]
    pub text: String,
    /// Fields added by external chunkers, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkRecord {
    /// Build a chunk produced by this crate.
    pub fn new(index: usize, kind: &str, title: Option<String>, text: String) -> Self {
        Self {
            chunk_index: Value::from(index),
            chunk_type: Some(kind.to_string()),
            chunk_title: title,
            text,
            extra: Map::new(),
        }
    }
}

/// Contents of `<data>/chunks/<source>/<stem>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkFile {
    /// Document category, used when the registry has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    /// Chunks in document order.
    #[serde(default)]
    pub chunks: Vec<ChunkRecord>,
    /// Fields added by external chunkers, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Whether `path` holds a usable chunk file: at least 5 bytes, valid JSON, non-empty `chunks`.
pub fn is_valid_chunk_file(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() || metadata.len() < MIN_CHUNK_FILE_BYTES {
        return false;
    }
    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|value| value.get("chunks").and_then(Value::as_array).map(Vec::len))
        .is_some_and(|count| count > 0)
}

/// Read a chunk file; a file without chunks is an error.
pub fn read_chunk_file(path: &Path) -> Result<ChunkFile, ChunkFileError> {
    let bytes = std::fs::read(path).map_err(|source| ChunkFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ChunkFile =
        serde_json::from_slice(&bytes).map_err(|source| ChunkFileError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    if file.chunks.is_empty() {
        return Err(ChunkFileError::Empty(path.to_path_buf()));
    }
    Ok(file)
}

/// Write a chunk file atomically.
pub fn write_chunk_file(path: &Path, file: &ChunkFile) -> Result<(), ChunkFileError> {
    let bytes = serde_json::to_vec_pretty(file).map_err(|source| ChunkFileError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes).map_err(|source| ChunkFileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Counts from a scaffolding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaffoldReport {
    /// Cleaned artifacts visited.
    pub scanned: usize,
    /// Placeholders written.
    pub created: usize,
    /// Chunk paths that already existed.
    pub existing: usize,
}

/// Create `{}` placeholders in `chunks_dir` mirroring every `.txt` under `cleaned_dir`.
///
/// Existing files are never overwritten.
pub fn scaffold_placeholders(
    cleaned_dir: &Path,
    chunks_dir: &Path,
) -> Result<ScaffoldReport, ChunkFileError> {
    let mut report = ScaffoldReport::default();
    for entry in WalkDir::new(cleaned_dir).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(cleaned_dir).to_path_buf();
            ChunkFileError::Io {
                path,
                source: err.into(),
            }
        })?;
        let is_text = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if !is_text {
            continue;
        }
        report.scanned += 1;

        let relative = entry.path().strip_prefix(cleaned_dir).unwrap_or(entry.path());
        let target = chunks_dir.join(relative).with_extension("json");
        if target.exists() {
            report.existing += 1;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ChunkFileError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let created = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .and_then(|mut file| std::io::Write::write_all(&mut file, b"{}"));
        match created {
            Ok(()) => report.created += 1,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => report.existing += 1,
            Err(source) => {
                return Err(ChunkFileError::Io {
                    path: target,
                    source,
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, contents).expect("write");
    }

    #[test]
    fn validity_requires_non_empty_chunk_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cases = [
            ("missing.json", None, false),
            ("placeholder.json", Some("{}"), false),
            ("tiny.json", Some("[]"), false),
            ("broken.json", Some("{\"chunks\": ["), false),
            ("empty.json", Some("{\"chunks\": []}"), false),
            ("good.json", Some("{\"chunks\": [{\"text\": \"a\"}]}"), true),
        ];
        for (name, contents, expected) in cases {
            let path = dir.path().join(name);
            if let Some(contents) = contents {
                write(&path, contents);
            }
            assert_eq!(is_valid_chunk_file(&path), expected, "{name}");
        }
    }

    #[test]
    fn external_fields_survive_a_rewrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.json");
        write(
            &path,
            &json!({
                "document_type": "Act",
                "annotator": "team-b",
                "chunks": [{"chunk_index": "1", "text": "body", "page": 3}]
            })
            .to_string(),
        );
        let file = read_chunk_file(&path).expect("read");
        assert_eq!(file.document_type.as_deref(), Some("Act"));
        assert_eq!(file.chunks[0].chunk_index, json!("1"));

        write_chunk_file(&path, &file).expect("write");
        let reread: Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(reread["annotator"], "team-b");
        assert_eq!(reread["chunks"][0]["page"], 3);
    }

    #[test]
    fn reading_an_empty_chunk_list_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.json");
        write(&path, "{\"chunks\": []}");
        assert!(matches!(read_chunk_file(&path), Err(ChunkFileError::Empty(_))));
    }

    #[test]
    fn scaffold_never_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cleaned = dir.path().join("cleaned");
        let chunks = dir.path().join("chunks");
        write(&cleaned.join("kp-code").join("a.txt"), "text");
        write(&cleaned.join("kp-code").join("b.txt"), "text");
        write(&cleaned.join("notes.md"), "ignored");
        write(&chunks.join("kp-code").join("b.json"), "{\"chunks\": [{\"text\": \"x\"}]}");

        let report = scaffold_placeholders(&cleaned, &chunks).expect("scaffold");
        assert_eq!(
            report,
            ScaffoldReport {
                scanned: 2,
                created: 1,
                existing: 1
            }
        );
        assert_eq!(
            std::fs::read_to_string(chunks.join("kp-code").join("a.json")).expect("read"),
            "{}"
        );
        assert!(is_valid_chunk_file(&chunks.join("kp-code").join("b.json")));

        let again = scaffold_placeholders(&cleaned, &chunks).expect("rerun");
        assert_eq!(again.created, 0);
        assert_eq!(again.existing, 2);
    }
}
