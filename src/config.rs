use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

use crate::pipeline::DataLayout;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration shared by every pipeline stage.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory against which registry paths are resolved.
    pub base_dir: PathBuf,
    /// Data tree, relative to `base_dir` unless absolute.
    pub data_dir: PathBuf,
    /// Location of the document registry JSON file.
    pub registry_file: PathBuf,
    /// Location of the newline-delimited embedding log.
    pub embeddings_file: PathBuf,
    /// Number of processed documents between registry checkpoints.
    pub checkpoint_every: usize,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection receiving vectors.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Connection string for the metadata store.
    pub mongo_uri: String,
    /// Database holding the metadata collection.
    pub mongo_db: String,
    /// Collection receiving per-embedding metadata.
    pub mongo_collection: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Number of chunk texts sent per embedding request.
    pub embedding_batch_size: usize,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Tesseract language set used for scanned pages.
    pub ocr_languages: String,
    /// Resolution used when rendering pages for OCR.
    pub ocr_dpi: u32,
    /// Aggregate text floor below which the secondary extractor is tried.
    pub min_extracted_chars: usize,
    /// Token ceiling for chunks produced by the built-in chunker.
    pub chunk_token_budget: usize,
}

/// Supported embedding backends for the embedding stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic offline encoder, useful for dry runs.
    Hash,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_dir = PathBuf::from(load_env_or("LAWPIPE_BASE_DIR", "."));
        let data_dir = PathBuf::from(load_env_or("LAWPIPE_DATA_DIR", "data"));
        let registry_file = load_env_optional("LAWPIPE_REGISTRY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("metadata").join("documents_metadata.json"));
        let embeddings_file = load_env_optional("LAWPIPE_EMBEDDINGS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("embeddings").join("embeddings.jsonl"));

        Ok(Self {
            base_dir,
            data_dir,
            registry_file,
            embeddings_file,
            checkpoint_every: parse_env_or("LAWPIPE_CHECKPOINT_EVERY", 25)?,
            qdrant_url: load_env_or("QDRANT_URL", "http://localhost:6333"),
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION", "Embeddings"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            mongo_uri: load_env_or("MONGO_URI", "mongodb://localhost:27017/"),
            mongo_db: load_env_or("MONGO_DB", "lawpipe"),
            mongo_collection: load_env_or("MONGO_COLLECTION", "Embeddings"),
            embedding_provider: load_env_or("EMBEDDING_PROVIDER", "ollama")
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env_or("EMBEDDING_MODEL", "nomic-embed-text"),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", 768)?,
            embedding_batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 16)?,
            ollama_url: load_env_or("OLLAMA_URL", "http://127.0.0.1:11434"),
            ocr_languages: load_env_or("OCR_LANGUAGES", "eng+urd"),
            ocr_dpi: parse_env_or("OCR_DPI", 300)?,
            min_extracted_chars: parse_env_or("MIN_EXTRACTED_CHARS", 50)?,
            chunk_token_budget: parse_env_or("CHUNK_TOKEN_BUDGET", 512)?,
        })
    }

    /// Resolve the on-disk layout described by this configuration.
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(
            &self.base_dir,
            &self.data_dir,
            &self.registry_file,
            &self.embeddings_file,
        )
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        base_dir = %config.base_dir.display(),
        registry = %config.registry_file.display(),
        embeddings = %config.embeddings_file.display(),
        qdrant_url = %config.qdrant_url,
        embedding_provider = ?config.embedding_provider,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_provider_parses_case_insensitively() {
        assert_eq!("Ollama".parse(), Ok(EmbeddingProvider::Ollama));
        assert_eq!("HASH".parse(), Ok(EmbeddingProvider::Hash));
        assert_eq!("openai".parse::<EmbeddingProvider>(), Err(()));
    }

    #[test]
    fn parse_env_or_falls_back_to_default() {
        let value: usize = parse_env_or("LAWPIPE_TEST_UNSET_VARIABLE", 7).expect("default");
        assert_eq!(value, 7);
    }

    #[test]
    fn init_config_caches_first_load() {
        let first = init_config().expect("config");
        let second = init_config().expect("config");
        assert!(std::ptr::eq(first, second));
        assert!(CONFIG.get().is_some_and(|cached| std::ptr::eq(cached, first)));
    }
}
