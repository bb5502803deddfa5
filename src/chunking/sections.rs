use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use super::ChunkRecord;
use super::tokens::{TokenCounter, split_to_budget};

static SECTION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(\d+[A-Z]?)\.[ \t]+([A-Z][^\n]*)").expect("valid section start pattern")
});

const TITLE_LIMIT: usize = 120;

/// Splits cleaned legal text along section headers.
///
/// Text before the first header becomes a `preamble` chunk, each numbered section a `section`
/// chunk, and documents without headers are cut into `passage` chunks. Units longer than the
/// token budget are split semantically; repeated bodies are dropped.
pub struct SectionChunker {
    budget: usize,
    counter: TokenCounter,
}

struct Unit {
    kind: &'static str,
    title: Option<String>,
    body: String,
}

impl SectionChunker {
    /// Chunker with the given token budget and counter.
    pub fn new(budget: usize, counter: TokenCounter) -> Self {
        Self { budget, counter }
    }

    /// Chunk `text`; returns an empty list for blank input.
    pub fn chunk(&self, text: &str) -> Vec<ChunkRecord> {
        let units = split_units(text);
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for unit in units {
            for piece in split_to_budget(&unit.body, self.budget, &self.counter) {
                if !seen.insert(body_digest(&piece)) {
                    continue;
                }
                records.push(ChunkRecord::new(
                    records.len(),
                    unit.kind,
                    unit.title.clone(),
                    piece,
                ));
            }
        }
        records
    }
}

fn split_units(text: &str) -> Vec<Unit> {
    let starts: Vec<_> = SECTION_START.captures_iter(text).collect();
    if starts.is_empty() {
        return vec![Unit {
            kind: "passage",
            title: None,
            body: text.to_string(),
        }];
    }

    let mut units = Vec::with_capacity(starts.len() + 1);
    let first = starts[0].get(0).map_or(0, |m| m.start());
    let preamble = &text[..first];
    if !preamble.trim().is_empty() {
        units.push(Unit {
            kind: "preamble",
            title: preamble
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(truncate_title),
            body: preamble.to_string(),
        });
    }

    for (position, caps) in starts.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let end = starts
            .get(position + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let heading = caps
            .get(2)
            .map(|m| section_heading(m.as_str()))
            .unwrap_or_default();
        units.push(Unit {
            kind: "section",
            title: Some(truncate_title(&format!("Section {}: {heading}", &caps[1]))),
            body: text[whole.start()..end].to_string(),
        });
    }
    units
}

/// Heading text up to the `.-` or `:-` that introduces the section body.
fn section_heading(line: &str) -> String {
    let cut = [".-", ".—", ":-", ".–"]
        .iter()
        .filter_map(|marker| line.find(marker))
        .min()
        .unwrap_or(line.len());
    line[..cut].trim().trim_end_matches('.').to_string()
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= TITLE_LIMIT {
        return title.to_string();
    }
    title.chars().take(TITLE_LIMIT).collect::<String>().trim_end().to_string()
}

/// Hex SHA-256 of a chunk body, ignoring surrounding whitespace.
pub fn body_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::tokens::whitespace_counter;

    const ACT: &str = "THE SAMPLE ACT, 2001\nAn Act to provide for samples.\n\n1. Short title and commencement.- (1) This Act may be called the Sample Act.\n\n2. Definitions.- In this Act, unless the context otherwise requires.\n\n2A. Application.- This Act applies to all samples.\n";

    #[test]
    fn sections_become_titled_chunks() {
        let chunker = SectionChunker::new(200, whitespace_counter());
        let chunks = chunker.chunk(ACT);
        let kinds: Vec<_> = chunks.iter().map(|c| c.chunk_type.as_deref().unwrap_or("")).collect();
        assert_eq!(kinds, vec!["preamble", "section", "section", "section"]);
        assert_eq!(chunks[0].chunk_title.as_deref(), Some("THE SAMPLE ACT, 2001"));
        assert_eq!(
            chunks[1].chunk_title.as_deref(),
            Some("Section 1: Short title and commencement")
        );
        assert_eq!(chunks[3].chunk_title.as_deref(), Some("Section 2A: Application"));
        assert!(chunks[2].text.starts_with("2. Definitions"));
        let indices: Vec<serde_json::Value> = chunks.iter().map(|c| c.chunk_index.clone()).collect();
        assert_eq!(indices, vec![serde_json::Value::from(0), 1.into(), 2.into(), 3.into()]);
    }

    #[test]
    fn long_sections_are_split_and_keep_their_title() {
        let words: Vec<String> = (0..50).map(|n| format!("w{n}")).collect();
        let body = format!("1. Long section.- {}", words.join(" "));
        let chunks = SectionChunker::new(20, whitespace_counter()).chunk(&body);
        assert!(chunks.len() >= 3);
        assert!(
            chunks
                .iter()
                .all(|c| c.chunk_title.as_deref() == Some("Section 1: Long section"))
        );
        assert!(chunks.iter().all(|c| c.text.split_whitespace().count() <= 20));
    }

    #[test]
    fn judgments_without_headers_become_passages() {
        let text = "The appeal was heard at length.\n\nThe appeal is dismissed.";
        let chunks = SectionChunker::new(200, whitespace_counter()).chunk(text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type.as_deref(), Some("passage"));
        assert_eq!(chunks[0].chunk_title, None);
    }

    #[test]
    fn duplicate_bodies_are_dropped() {
        let text = "1. Repeal.- Omitted.\n\n1. Repeal.- Omitted.\n";
        let chunks = SectionChunker::new(200, whitespace_counter()).chunk(text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn digest_ignores_surrounding_whitespace() {
        assert_eq!(body_digest(" alpha \n"), body_digest("alpha"));
        assert_ne!(body_digest("alpha"), body_digest("beta"));
    }
}
