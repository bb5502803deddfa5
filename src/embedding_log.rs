//! The embedding log: newline-delimited JSON records awaiting (or done with) upload.
//!
//! Records are appended by the embedding stage and only ever rewritten wholesale by the upload
//! stage when it flips `upload` flags. Lines that do not parse are carried through untouched.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::chunking::ChunkRecord;
use crate::persist::write_atomic;
use crate::registry::DocumentRecord;

/// Failures reading or writing the embedding log.
#[derive(Debug, Error)]
pub enum EmbeddingLogError {
    /// Filesystem access failed.
    #[error("Embedding log I/O failed for {path}: {source}")]
    Io {
        /// Log location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A record could not be serialized.
    #[error("Failed to serialize embedding record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Denormalised document and chunk fields stored with each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    /// Log-wide unique, strictly increasing id; also the vector point id.
    pub id: u64,
    /// Document title.
    #[serde(default)]
    pub title: Option<String>,
    /// Listing page the document was found on.
    #[serde(default)]
    pub source_page: Value,
    /// Document identity.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Source collection.
    #[serde(default)]
    pub source_website: Option<String>,
    /// Cleaned artifact the chunk came from.
    #[serde(default)]
    pub cleaned_path: Option<String>,
    /// When the raw artifact was downloaded.
    #[serde(default)]
    pub download_date: Value,
    /// Document category.
    #[serde(default)]
    pub document_type: Option<String>,
    /// Publication year.
    #[serde(default)]
    pub year: Value,
    /// Issuing court.
    #[serde(default)]
    pub court: Value,
    /// Chunk ordinal.
    #[serde(default)]
    pub chunk_index: Value,
    /// Chunk kind.
    #[serde(default)]
    pub chunk_type: Option<String>,
    /// Chunk heading.
    #[serde(default)]
    pub chunk_title: Option<String>,
    /// Fields added by other tools, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Chunk body that was embedded.
    #[serde(default)]
    pub chunk: String,
    /// Vector.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Whether the record reached both the vector index and the metadata store.
    #[serde(default)]
    pub upload: bool,
    /// Filterable metadata; absent on malformed legacy records.
    #[serde(default)]
    pub metadata: Option<EmbeddingMetadata>,
    /// Fields added by other tools, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmbeddingRecord {
    /// Record for one chunk of `doc`, not yet uploaded.
    pub fn for_chunk(
        id: u64,
        doc: &DocumentRecord,
        chunk: &ChunkRecord,
        document_type: &str,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            chunk: chunk.text.clone(),
            embedding,
            upload: false,
            metadata: Some(EmbeddingMetadata {
                id,
                title: Some(doc.title_or_empty().to_string()),
                source_page: doc.extra_field("source_page"),
                source_url: Some(doc.source_url.clone()),
                source_website: doc.source_website.clone(),
                cleaned_path: doc.cleaned_path.clone(),
                download_date: doc.extra_field("download_date"),
                document_type: Some(document_type.to_string()),
                year: doc.year.clone().unwrap_or(Value::Null),
                court: doc.court.clone().map_or(Value::Null, Value::String),
                chunk_index: chunk.chunk_index.clone(),
                chunk_type: chunk.chunk_type.clone(),
                chunk_title: chunk.chunk_title.clone(),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    /// Record id, when metadata is present.
    pub fn id(&self) -> Option<u64> {
        self.metadata.as_ref().map(|meta| meta.id)
    }
}

/// A parsed record or a line kept verbatim because it did not parse.
#[derive(Debug, Clone, PartialEq)]
pub enum LogLine {
    /// Well-formed record.
    Record(Box<EmbeddingRecord>),
    /// Unparsable line.
    Raw(String),
}

impl LogLine {
    fn parse(line: &str) -> Self {
        match serde_json::from_str::<EmbeddingRecord>(line) {
            Ok(record) => LogLine::Record(Box::new(record)),
            Err(_) => LogLine::Raw(line.to_string()),
        }
    }
}

/// What a single scan of the log learned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogIndex {
    /// Highest id present.
    pub max_id: Option<u64>,
    /// Identities referenced by records.
    pub source_urls: HashSet<String>,
    /// Titles of records written without a `source_url`.
    pub legacy_titles: HashSet<String>,
    /// Parsed records.
    pub records: usize,
    /// Records still awaiting upload.
    pub pending_upload: usize,
    /// Lines kept verbatim.
    pub unparsed_lines: usize,
}

impl LogIndex {
    /// First id for new records.
    pub fn next_id(&self) -> u64 {
        self.max_id.map_or(1, |max| max + 1)
    }

    /// Whether any record belongs to `doc`.
    ///
    /// Records are matched by `source_url`; title matching is only used for records that
    /// predate `source_url` being written, so unrelated documents sharing a title are not
    /// mistaken for each other.
    pub fn references(&self, doc: &DocumentRecord) -> bool {
        if !doc.source_url.is_empty() && self.source_urls.contains(&doc.source_url) {
            return true;
        }
        doc.title
            .as_deref()
            .is_some_and(|title| self.legacy_titles.contains(title))
    }

    fn observe(&mut self, line: &LogLine) {
        match line {
            LogLine::Raw(_) => self.unparsed_lines += 1,
            LogLine::Record(record) => {
                self.records += 1;
                if !record.upload {
                    self.pending_upload += 1;
                }
                let Some(meta) = record.metadata.as_ref() else {
                    return;
                };
                self.max_id = Some(self.max_id.map_or(meta.id, |max| max.max(meta.id)));
                match meta.source_url.as_deref().filter(|url| !url.is_empty()) {
                    Some(url) => {
                        self.source_urls.insert(url.to_string());
                    }
                    None => {
                        if let Some(title) = meta.title.as_deref().filter(|t| !t.is_empty()) {
                            self.legacy_titles.insert(title.to_string());
                        }
                    }
                }
            }
        }
    }
}

/// Handle on the log file.
#[derive(Debug, Clone)]
pub struct EmbeddingLog {
    path: PathBuf,
}

impl EmbeddingLog {
    /// Log at `path`; the file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> EmbeddingLogError {
        EmbeddingLogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn for_each_line(&self, mut visit: impl FnMut(LogLine)) -> Result<(), EmbeddingLogError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(self.io_error(err)),
        };
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|err| self.io_error(err))?;
            if line.trim().is_empty() {
                continue;
            }
            visit(LogLine::parse(&line));
        }
        Ok(())
    }

    /// Scan the whole log once. A missing log is empty.
    pub fn scan(&self) -> Result<LogIndex, EmbeddingLogError> {
        let mut index = LogIndex::default();
        self.for_each_line(|line| index.observe(&line))?;
        Ok(index)
    }

    /// Read every line, parsed where possible.
    pub fn read_lines(&self) -> Result<Vec<LogLine>, EmbeddingLogError> {
        let mut lines = Vec::new();
        self.for_each_line(|line| lines.push(line))?;
        Ok(lines)
    }

    /// Append records and force them to stable storage.
    ///
    /// A log whose last line lacks its newline (a torn write) is terminated first.
    pub fn append(&self, records: &[EmbeddingRecord]) -> Result<(), EmbeddingLogError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.io_error(err))?;
        if !ends_with_newline(&mut file).map_err(|err| self.io_error(err))? {
            file.write_all(b"\n").map_err(|err| self.io_error(err))?;
        }
        file.write_all(&buffer).map_err(|err| self.io_error(err))?;
        file.flush().map_err(|err| self.io_error(err))?;
        file.sync_data().map_err(|err| self.io_error(err))
    }

    /// Replace the whole log with `lines` atomically.
    pub fn rewrite(&self, lines: &[LogLine]) -> Result<(), EmbeddingLogError> {
        let mut buffer = Vec::new();
        for line in lines {
            match line {
                LogLine::Record(record) => serde_json::to_writer(&mut buffer, record.as_ref())?,
                LogLine::Raw(raw) => buffer.extend_from_slice(raw.as_bytes()),
            }
            buffer.push(b'\n');
        }
        write_atomic(&self.path, &buffer).map_err(|err| self.io_error(err))
    }
}

/// Empty files count as terminated.
fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(url: &str, title: &str) -> DocumentRecord {
        let mut doc = DocumentRecord {
            source_url: url.into(),
            title: Some(title.into()),
            court: Some("Supreme Court".into()),
            year: Some(json!(1999)),
            ..Default::default()
        };
        doc.extra.insert("download_date".into(), json!("2025-01-02"));
        doc
    }

    fn record(id: u64, doc: &DocumentRecord) -> EmbeddingRecord {
        let chunk = ChunkRecord::new(0, "section", Some("Section 1".into()), "body".into());
        EmbeddingRecord::for_chunk(id, doc, &chunk, "Act", vec![0.5, 0.5])
    }

    #[test]
    fn ids_continue_after_the_highest_existing_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = EmbeddingLog::new(dir.path().join("embeddings.jsonl"));
        assert_eq!(log.scan().expect("scan").next_id(), 1);

        let a = doc("https://example.org/a", "Act A");
        log.append(&[record(1, &a), record(7, &a), record(3, &a)])
            .expect("append");
        let index = log.scan().expect("scan");
        assert_eq!(index.max_id, Some(7));
        assert_eq!(index.next_id(), 8);
        assert_eq!(index.pending_upload, 3);
    }

    #[test]
    fn torn_tail_is_terminated_and_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("embeddings.jsonl");
        let a = doc("https://example.org/a", "Act A");
        let first = serde_json::to_string(&record(1, &a)).expect("json");
        std::fs::write(&path, format!("{first}\n{{\"chunk\": \"half")).expect("write");

        let log = EmbeddingLog::new(&path);
        log.append(&[record(2, &a)]).expect("append");

        let lines = log.read_lines().expect("read");
        assert_eq!(lines.len(), 3);
        assert!(matches!(&lines[1], LogLine::Raw(raw) if raw == "{\"chunk\": \"half"));
        let index = log.scan().expect("scan");
        assert_eq!(index.unparsed_lines, 1);
        assert_eq!(index.next_id(), 3);
    }

    #[test]
    fn references_prefer_source_url_over_title() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = EmbeddingLog::new(dir.path().join("embeddings.jsonl"));
        let a = doc("https://example.org/a", "Shared Title");
        log.append(&[record(1, &a)]).expect("append");
        let index = log.scan().expect("scan");

        assert!(index.references(&a));
        let namesake = doc("https://example.org/b", "Shared Title");
        assert!(!index.references(&namesake));
    }

    #[test]
    fn legacy_records_match_by_title() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("embeddings.jsonl");
        let legacy = json!({
            "chunk": "old",
            "embedding": [0.1],
            "upload": true,
            "metadata": {"id": 4, "title": "Old Act"}
        });
        std::fs::write(&path, format!("{legacy}\n")).expect("write");

        let index = EmbeddingLog::new(&path).scan().expect("scan");
        assert!(index.references(&doc("https://example.org/old", "Old Act")));
        assert_eq!(index.pending_upload, 0);
    }

    #[test]
    fn rewrite_preserves_raw_lines_and_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = EmbeddingLog::new(dir.path().join("embeddings.jsonl"));
        let a = doc("https://example.org/a", "Act A");
        let mut uploaded = record(1, &a);
        uploaded.upload = true;

        log.rewrite(&[
            LogLine::Record(Box::new(uploaded)),
            LogLine::Raw("not json".into()),
        ])
        .expect("rewrite");
        let text = std::fs::read_to_string(log.path()).expect("read");
        assert!(text.ends_with("not json\n"));
        let first: Value = serde_json::from_str(text.lines().next().expect("line")).expect("json");
        assert_eq!(first["upload"], true);
        assert_eq!(first["metadata"]["court"], "Supreme Court");
        assert_eq!(first["metadata"]["download_date"], "2025-01-02");
        assert_eq!(first["metadata"]["year"], 1999);
    }
}
