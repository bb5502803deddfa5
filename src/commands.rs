//! Entry points shared by the stage binaries and the `lawpipe` umbrella CLI.
//!
//! Each command wires the configured collaborators into a stage driver, prints the summary, and
//! returns systemic failures as `anyhow` errors so the process exits non-zero.

use anyhow::{Context, Result};

use crate::chunking::{SectionChunker, token_counter};
use crate::config::Config;
use crate::embedding::build_embedding_client;
use crate::embedding_log::EmbeddingLog;
use crate::extraction::Extractor;
use crate::metadata_store::MongoMetadataStore;
use crate::pipeline::{
    self, EmbedSettings, ShutdownSignal, StageError, UploadSettings, collect_status,
};
use crate::qdrant::QdrantService;
use crate::registry::{RegistryHandle, RegistryStore};

async fn blocking<T, F>(stage: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T, StageError> + Send + 'static,
    T: Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(work)
        .await
        .with_context(|| format!("{stage} worker stopped unexpectedly"))?;
    Ok(outcome?)
}

fn open_registry(config: &Config) -> Result<RegistryHandle> {
    let layout = config.layout();
    RegistryHandle::open(layout.registry_file())
        .context("cannot start without a readable registry")
}

/// Run the extraction stage.
pub async fn extract(config: &Config) -> Result<()> {
    let layout = config.layout();
    let mut handle = open_registry(config)?;
    let extractor = Extractor::with_system_backends(
        &config.ocr_languages,
        config.ocr_dpi,
        config.min_extracted_chars,
    );
    let every = config.checkpoint_every;
    let shutdown = ShutdownSignal::install();

    let report = blocking("extraction", move || {
        pipeline::run_extraction(&mut handle, &layout, &extractor, every, &shutdown)
    })
    .await?;
    println!("{report}");
    Ok(())
}

/// Run the cleaning stage.
pub async fn clean(config: &Config) -> Result<()> {
    let layout = config.layout();
    let mut handle = open_registry(config)?;
    let every = config.checkpoint_every;
    let shutdown = ShutdownSignal::install();

    let report = blocking("cleaning", move || {
        pipeline::run_cleaning(&mut handle, &layout, every, &shutdown)
    })
    .await?;
    println!("{report}");
    Ok(())
}

/// Run the chunking stage.
pub async fn chunk(config: &Config) -> Result<()> {
    let layout = config.layout();
    let mut handle = open_registry(config)?;
    let chunker = SectionChunker::new(config.chunk_token_budget, token_counter());
    let every = config.checkpoint_every;
    let shutdown = ShutdownSignal::install();

    let report = blocking("chunking", move || {
        pipeline::run_chunking(&mut handle, &layout, &chunker, every, &shutdown)
    })
    .await?;
    println!("{report}");
    Ok(())
}

/// Create chunk placeholders for external annotators.
pub async fn scaffold_chunks(config: &Config) -> Result<()> {
    let layout = config.layout();
    let report = blocking("scaffold", move || pipeline::run_scaffold(&layout)).await?;
    println!("{report}");
    Ok(())
}

/// Run the embedding stage.
pub async fn embed(config: &Config) -> Result<()> {
    let layout = config.layout();
    let mut handle = open_registry(config)?;
    let client = build_embedding_client(config).context("failed to build embedding client")?;
    let log = EmbeddingLog::new(layout.embeddings_file());
    let settings = EmbedSettings {
        batch_size: config.embedding_batch_size,
        dimension: config.embedding_dimension,
    };
    let shutdown = ShutdownSignal::install();

    let report = pipeline::run_embedding(
        &mut handle,
        &layout,
        &log,
        client.as_ref(),
        settings,
        &shutdown,
    )
    .await?;
    println!("{report}");
    Ok(())
}

/// Run the upload stage.
pub async fn upload(config: &Config) -> Result<()> {
    let layout = config.layout();
    let log = EmbeddingLog::new(layout.embeddings_file());
    let index = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())
        .context("failed to configure Qdrant client")?;
    let store =
        MongoMetadataStore::connect(&config.mongo_uri, &config.mongo_db, &config.mongo_collection)
            .await
            .context("failed to configure MongoDB client")?;
    let settings = UploadSettings {
        collection: config.qdrant_collection_name.clone(),
        dimension: config.embedding_dimension as u64,
    };
    let shutdown = ShutdownSignal::install();

    let report = pipeline::run_upload(&log, &index, &store, &settings, &shutdown).await?;
    println!("{report}");
    Ok(())
}

/// Remove duplicate registry records.
pub async fn dedupe(config: &Config) -> Result<()> {
    let mut handle = open_registry(config)?;
    let report = blocking("dedupe", move || pipeline::run_dedupe(&mut handle)).await?;
    println!("{report}");
    Ok(())
}

/// Print per-stage eligibility without changing anything.
pub async fn status(config: &Config) -> Result<()> {
    let layout = config.layout();
    let registry = RegistryStore::new(layout.registry_file()).load()?;
    let log_index = EmbeddingLog::new(layout.embeddings_file()).scan()?;
    println!("{}", collect_status(&registry, &layout, &log_index));
    Ok(())
}
