#![deny(missing_docs)]

//! Core library for the lawpipe legal-document ingestion pipeline.

/// Chunk files and the built-in section chunker.
pub mod chunking;
/// Source-profile text cleaning with a validation veto.
pub mod cleaning;
/// Stage entry points used by the binaries.
pub mod commands;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Append-only log of computed embeddings.
pub mod embedding_log;
/// PDF text extraction with OCR fallback.
pub mod extraction;
/// Per-stage processing gates.
pub mod gate;
/// Structured logging and tracing setup.
pub mod logging;
/// MongoDB metadata store.
pub mod metadata_store;
/// Atomic file replacement.
pub mod persist;
/// Stage drivers, reports, and the on-disk layout.
pub mod pipeline;
/// Qdrant vector store integration.
pub mod qdrant;
/// Document registry model and persistence.
pub mod registry;
