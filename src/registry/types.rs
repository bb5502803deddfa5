//! Document records, per-stage flags, and the registry aggregate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Pipeline stages that own a completion flag on every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Raw artifact → text artifact.
    Extraction,
    /// Text artifact → cleaned artifact.
    Cleaning,
    /// Cleaned artifact → chunk file.
    Chunking,
    /// Chunk file → embedding log records.
    Embedding,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 4] = [
        Stage::Extraction,
        Stage::Cleaning,
        Stage::Chunking,
        Stage::Embedding,
    ];

    /// Stage whose completion this stage depends on.
    pub const fn upstream(self) -> Option<Stage> {
        match self {
            Stage::Extraction => None,
            Stage::Cleaning => Some(Stage::Extraction),
            Stage::Chunking => Some(Stage::Cleaning),
            Stage::Embedding => Some(Stage::Chunking),
        }
    }

    /// Name of the `processing_status` flag owned by this stage.
    pub const fn flag_name(self) -> &'static str {
        match self {
            Stage::Extraction => "text_extracted",
            Stage::Cleaning => "text_cleaned",
            Stage::Chunking => "chunked",
            Stage::Embedding => "embedded",
        }
    }

    /// Coarse status label a document reaches once this stage completes.
    pub const fn status(self) -> DocumentStatus {
        match self {
            Stage::Extraction => DocumentStatus::TextExtracted,
            Stage::Cleaning => DocumentStatus::TextCleaned,
            Stage::Chunking => DocumentStatus::Chunked,
            Stage::Embedding => DocumentStatus::Embedded,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extraction => "extraction",
            Stage::Cleaning => "cleaning",
            Stage::Chunking => "chunking",
            Stage::Embedding => "embedding",
        };
        f.write_str(name)
    }
}

/// Furthest stage a document has reached, ordered by pipeline progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DocumentStatus {
    /// Registered but not yet downloaded.
    Pending,
    /// Raw artifact present.
    Downloaded,
    /// Text extracted.
    TextExtracted,
    /// Text cleaned.
    TextCleaned,
    /// Chunk file available.
    Chunked,
    /// Embeddings appended to the log.
    Embedded,
}

impl DocumentStatus {
    /// Parse a stored status label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "pending" => Some(Self::Pending),
            "downloaded" => Some(Self::Downloaded),
            "extracted" | "text_extracted" => Some(Self::TextExtracted),
            "text_cleaned" | "cleaned" => Some(Self::TextCleaned),
            "chunked" => Some(Self::Chunked),
            "embedded" => Some(Self::Embedded),
            _ => None,
        }
    }

    /// Label written to the registry.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloaded => "downloaded",
            Self::TextExtracted => "text_extracted",
            Self::TextCleaned => "text_cleaned",
            Self::Chunked => "chunked",
            Self::Embedded => "embedded",
        }
    }
}

/// Per-stage completion flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    /// Text artifact written.
    #[serde(default)]
    pub text_extracted: bool,
    /// Cleaned artifact written.
    #[serde(default)]
    pub text_cleaned: bool,
    /// Valid chunk file available.
    #[serde(default)]
    pub chunked: bool,
    /// Embedding records appended.
    #[serde(default)]
    pub embedded: bool,
    /// Flags written by other tools, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProcessingStatus {
    /// Read the flag owned by `stage`.
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Extraction => self.text_extracted,
            Stage::Cleaning => self.text_cleaned,
            Stage::Chunking => self.chunked,
            Stage::Embedding => self.embedded,
        }
    }

    /// Write the flag owned by `stage`.
    pub fn set(&mut self, stage: Stage, value: bool) {
        match stage {
            Stage::Extraction => self.text_extracted = value,
            Stage::Cleaning => self.text_cleaned = value,
            Stage::Chunking => self.chunked = value,
            Stage::Embedding => self.embedded = value,
        }
    }
}

/// Extraction details recorded alongside the text artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionInfo {
    /// Local timestamp of the extraction.
    pub extracted_at: String,
    /// `"OCR + Text"` or `"Text Only"`.
    pub method: String,
    /// Whether any page needed OCR.
    pub ocr_used: bool,
    /// Extracted length in characters.
    pub text_length: usize,
    /// Whitespace-delimited word count.
    pub word_count: usize,
}

/// Cleaning statistics recorded alongside the cleaned artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningInfo {
    /// Local timestamp of the cleaning pass.
    pub cleaned_at: String,
    /// Source profile that was applied.
    pub profile: String,
    /// Input length in characters.
    pub original_size: usize,
    /// Output length in characters.
    pub cleaned_size: usize,
    /// Percentage of characters removed, rounded to two decimals.
    pub reduction_percent: f64,
    /// Validation veto, when the transformation was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Value>,
}

/// One source artifact and its progress through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable identity; join key across stages.
    #[serde(default)]
    pub source_url: String,
    /// Human-readable document title.
    #[serde(default)]
    pub title: Option<String>,
    /// Publication or enactment year (number or string).
    #[serde(default)]
    pub year: Option<Value>,
    /// Issuing court, when applicable.
    #[serde(default)]
    pub court: Option<String>,
    /// Document category (act, ordinance, judgment, ...).
    #[serde(default)]
    pub document_type: Option<String>,
    /// Collection the document was harvested from; selects the cleaning profile.
    #[serde(default)]
    pub source_website: Option<String>,
    /// Raw artifact path, relative to the base directory.
    #[serde(default)]
    pub raw_path: Option<String>,
    /// Extracted text artifact path.
    #[serde(default)]
    pub text_path: Option<String>,
    /// Cleaned text artifact path.
    #[serde(default)]
    pub cleaned_path: Option<String>,
    /// Chunk file path.
    #[serde(default)]
    pub chunked_path: Option<String>,
    /// Coarse label reflecting the furthest completed stage.
    #[serde(default)]
    pub status: Option<String>,
    /// Per-stage completion flags.
    #[serde(default)]
    pub processing_status: ProcessingStatus,
    /// Extraction statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_info: Option<ExtractionInfo>,
    /// Cleaning statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaning_info: Option<CleaningInfo>,
    /// Fields written by collectors (source_page, download_date, ...), preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentRecord {
    /// Completion flag of `stage`.
    pub fn is_complete(&self, stage: Stage) -> bool {
        self.processing_status.get(stage)
    }

    /// Artifact path written by `stage`, ignoring empty and `"null"` placeholders.
    pub fn output_path(&self, stage: Stage) -> Option<&str> {
        let raw = match stage {
            Stage::Extraction => self.text_path.as_deref(),
            Stage::Cleaning => self.cleaned_path.as_deref(),
            Stage::Chunking => self.chunked_path.as_deref(),
            Stage::Embedding => None,
        };
        present(raw)
    }

    /// Artifact path consumed by `stage`.
    pub fn input_path(&self, stage: Stage) -> Option<&str> {
        match stage.upstream() {
            Some(upstream) => self.output_path(upstream),
            None => present(self.raw_path.as_deref()),
        }
    }

    /// Record a completed stage. The artifact must already be durable.
    pub fn mark_complete(&mut self, stage: Stage, artifact: Option<String>) {
        if let Some(path) = artifact {
            match stage {
                Stage::Extraction => self.text_path = Some(path),
                Stage::Cleaning => self.cleaned_path = Some(path),
                Stage::Chunking => self.chunked_path = Some(path),
                Stage::Embedding => {}
            }
        }
        self.processing_status.set(stage, true);
        self.advance_status(stage.status());
    }

    /// Clear the flag of `stage`, leaving paths untouched for diagnosis.
    pub fn mark_incomplete(&mut self, stage: Stage) {
        self.processing_status.set(stage, false);
    }

    /// Raise the coarse status to `target`; never lowers it.
    pub fn advance_status(&mut self, target: DocumentStatus) {
        let current = self.status.as_deref().and_then(DocumentStatus::from_label);
        if current.is_none_or(|current| current < target) {
            self.status = Some(target.as_str().to_string());
        }
    }

    /// Title or an empty string.
    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Year rendered as text, when present.
    pub fn year_label(&self) -> Option<String> {
        match self.year.as_ref()? {
            Value::Number(number) => Some(number.to_string()),
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        }
    }

    /// Collector field preserved in `extra`.
    pub fn extra_field(&self, name: &str) -> Value {
        self.extra.get(name).cloned().unwrap_or(Value::Null)
    }
}

fn present(path: Option<&str>) -> Option<&str> {
    path.map(str::trim)
        .filter(|value| !value.is_empty() && *value != "null")
}

/// Aggregate counters derived from the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryCounters {
    /// Number of records.
    pub total_documents: usize,
    /// Records with `text_extracted`.
    pub total_extracted: usize,
    /// Records with `text_cleaned`.
    pub total_cleaned: usize,
    /// Records with `chunked`.
    pub total_chunked: usize,
    /// Records with `embedded`.
    pub total_embedded: usize,
}

/// The registry file: ordered records plus derived counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    /// Number of records.
    #[serde(default)]
    pub total_documents: usize,
    /// Records with text extracted.
    #[serde(default)]
    pub total_extracted: usize,
    /// Records with cleaned text.
    #[serde(default)]
    pub total_cleaned: usize,
    /// Records with a valid chunk file.
    #[serde(default)]
    pub total_chunked: usize,
    /// Records with embeddings appended.
    #[serde(default)]
    pub total_embedded: usize,
    /// Locale-formatted timestamp of the last save.
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Document records in insertion order.
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
    /// Top-level fields written by other tools, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Registry {
    /// Count flags across all records.
    pub fn derived_counters(&self) -> RegistryCounters {
        let count = |stage: Stage| {
            self.documents
                .iter()
                .filter(|doc| doc.is_complete(stage))
                .count()
        };
        RegistryCounters {
            total_documents: self.documents.len(),
            total_extracted: count(Stage::Extraction),
            total_cleaned: count(Stage::Cleaning),
            total_chunked: count(Stage::Chunking),
            total_embedded: count(Stage::Embedding),
        }
    }

    /// Stored counters as they appear in the file.
    pub fn stored_counters(&self) -> RegistryCounters {
        RegistryCounters {
            total_documents: self.total_documents,
            total_extracted: self.total_extracted,
            total_cleaned: self.total_cleaned,
            total_chunked: self.total_chunked,
            total_embedded: self.total_embedded,
        }
    }

    /// Overwrite stored counters with values derived from the records.
    pub fn recompute_counters(&mut self) {
        let derived = self.derived_counters();
        self.total_documents = derived.total_documents;
        self.total_extracted = derived.total_extracted;
        self.total_cleaned = derived.total_cleaned;
        self.total_chunked = derived.total_chunked;
        self.total_embedded = derived.total_embedded;
    }

    /// Number of records whose `raw_path` repeats an earlier record's.
    pub fn duplicate_raw_paths(&self) -> usize {
        let mut seen = HashSet::new();
        self.documents
            .iter()
            .filter_map(|doc| doc.input_path(Stage::Extraction))
            .filter(|path| !seen.insert(*path))
            .count()
    }

    /// Drop records whose `raw_path` was already seen, keeping the first occurrence.
    /// Records without a raw path are kept.
    ///
    /// Returns the number of removed records.
    pub fn dedupe_by_raw_path(&mut self) -> usize {
        let before = self.documents.len();
        let mut seen = HashSet::new();
        self.documents.retain(|doc| match doc.input_path(Stage::Extraction) {
            Some(path) => seen.insert(path.to_string()),
            None => true,
        });
        before - self.documents.len()
    }

    /// Identities that appear on more than one record.
    pub fn duplicate_source_urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for doc in &self.documents {
            if !seen.insert(doc.source_url.as_str()) && !duplicates.contains(&doc.source_url) {
                duplicates.push(doc.source_url.clone());
            }
        }
        duplicates
    }
}
