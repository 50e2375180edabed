//! Pensum - Course Materials RAG
//!
//! A CLI tool for indexing structured course documents and answering
//! questions about them with cited sources.
//!
//! The name "Pensum" comes from the Norwegian word for "curriculum."
//!
//! # Overview
//!
//! Pensum allows you to:
//! - Parse course documents into lesson-aware, overlapping chunks
//! - Build a searchable vector index over course catalogs and content
//! - Ask questions answered by an LLM that searches the index on demand
//! - Continue conversations across queries within bounded sessions
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `document` - Course document parsing and chunking
//! - `embedding` - Embedding generation
//! - `index` - Vector index over catalog and content collections
//! - `tools` - Search and outline tools exposed to the LLM
//! - `session` - Per-session conversation history
//! - `ingest` - Document ingestion pipeline
//! - `engine` - Query orchestration with a single bounded tool round
//!
//! # Example
//!
//! ```rust,no_run
//! use pensum::config::Settings;
//! use pensum::document::DocumentParser;
//! use pensum::embedding::OpenAIEmbedder;
//! use pensum::index::open_index;
//! use pensum::ingest::Ingestor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let index = open_index(&settings)?;
//!     let embedder = Arc::new(OpenAIEmbedder::new());
//!
//!     let ingestor = Ingestor::new(DocumentParser::new(&settings.chunking), embedder, index);
//!     let report = ingestor.ingest_folder(std::path::Path::new("./docs")).await?;
//!     println!("Indexed {} courses", report.courses_added);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod openai;
pub mod session;
pub mod tools;

pub use error::{PensumError, Result};
