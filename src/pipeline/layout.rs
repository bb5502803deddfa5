use std::path::{Component, Path, PathBuf};

use crate::registry::{DocumentRecord, Stage};

/// Resolved on-disk layout: where the registry, artifacts, and embedding log live.
///
/// Registry paths are stored relative to `base_dir` with `/` separators so that the data tree
/// can move between machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    base_dir: PathBuf,
    data_dir: PathBuf,
    registry_file: PathBuf,
    embeddings_file: PathBuf,
}

impl DataLayout {
    /// Build a layout; relative `data_dir`, `registry_file`, and `embeddings_file` are
    /// resolved against `base_dir`.
    pub fn new(
        base_dir: &Path,
        data_dir: &Path,
        registry_file: &Path,
        embeddings_file: &Path,
    ) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            data_dir: base_dir.join(data_dir),
            registry_file: base_dir.join(registry_file),
            embeddings_file: base_dir.join(embeddings_file),
        }
    }

    /// Conventional layout rooted at `base_dir` with the data tree in `data/`.
    pub fn rooted_at(base_dir: &Path) -> Self {
        let data = Path::new("data");
        Self::new(
            base_dir,
            data,
            &data.join("metadata").join("documents_metadata.json"),
            &data.join("embeddings").join("embeddings.jsonl"),
        )
    }

    /// Registry JSON file.
    pub fn registry_file(&self) -> &Path {
        &self.registry_file
    }

    /// Embedding log.
    pub fn embeddings_file(&self) -> &Path {
        &self.embeddings_file
    }

    /// Source artifacts.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Extracted text artifacts.
    pub fn text_dir(&self) -> PathBuf {
        self.data_dir.join("text")
    }

    /// Cleaned text artifacts.
    pub fn cleaned_dir(&self) -> PathBuf {
        self.data_dir.join("cleaned")
    }

    /// Chunk files.
    pub fn chunks_dir(&self) -> PathBuf {
        self.data_dir.join("chunks")
    }

    /// Turn a stored registry path into a filesystem path.
    pub fn resolve(&self, stored: &str) -> PathBuf {
        let mut normalized = stored.trim().replace('\\', "/");
        while let Some(rest) = normalized
            .strip_prefix("./")
            .or_else(|| normalized.strip_prefix("../"))
        {
            normalized = rest.to_string();
        }
        let path = Path::new(&normalized);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Turn a filesystem path into the `/`-separated form stored in the registry.
    pub fn relativize(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::RootDir => Some(String::new()),
                _ => None,
            })
            .collect();
        parts.join("/")
    }

    /// Where `stage` writes its artifact for `doc`.
    ///
    /// The input path is mirrored from the upstream directory into the stage's directory; when
    /// it lies outside the expected tree the file lands under `<dir>/<source_website>/`.
    pub fn expected_output(&self, doc: &DocumentRecord, stage: Stage) -> Option<PathBuf> {
        let (from, to, extension) = match stage {
            Stage::Extraction => (self.raw_dir(), self.text_dir(), "txt"),
            Stage::Cleaning => (self.text_dir(), self.cleaned_dir(), "txt"),
            Stage::Chunking => (self.cleaned_dir(), self.chunks_dir(), "json"),
            Stage::Embedding => return None,
        };
        let input = self.resolve(doc.input_path(stage)?);
        match input.strip_prefix(&from) {
            Ok(relative) => Some(to.join(relative).with_extension(extension)),
            Err(_) => {
                let stem = input.file_stem()?;
                let source = doc
                    .source_website
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .unwrap_or("unknown");
                let file_name = format!("{}.{extension}", stem.to_string_lossy());
                Some(to.join(source).join(file_name))
            }
        }
    }
}
