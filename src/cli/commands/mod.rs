//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod ingest;
mod list;
mod search;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use ingest::run_ingest;
pub use list::run_list;
pub use search::run_search;

use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::engine::QueryEngine;
use crate::error::{PensumError, Result};
use crate::index::{open_index, CourseIndex};
use crate::llm::OpenAiChat;
use crate::session::SessionStore;
use crate::tools::{CourseOutlineTool, CourseSearchTool, ToolRegistry};
use std::sync::Arc;

/// Check that the OpenAI API key is available before work that needs it.
fn require_api_key() -> Result<()> {
    if std::env::var("OPENAI_API_KEY").unwrap_or_default().is_empty() {
        return Err(PensumError::Config(
            "OPENAI_API_KEY is not set. Export it before using this command.".to_string(),
        ));
    }
    Ok(())
}

/// Open the index and embedder selected by configuration.
fn open_components(settings: &Settings) -> Result<(Arc<dyn CourseIndex>, Arc<dyn Embedder>)> {
    let index = open_index(settings)?;
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    ));
    Ok((index, embedder))
}

/// Assemble the full query engine: index, embedder, tools, sessions, LLM.
fn build_engine(settings: &Settings, model: Option<String>) -> Result<QueryEngine> {
    let (index, embedder) = open_components(settings)?;

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CourseSearchTool::new(
        index.clone(),
        embedder.clone(),
        settings.rag.max_results,
    )))?;
    registry.register(Arc::new(CourseOutlineTool::new(index, embedder)))?;

    let mut rag = settings.rag.clone();
    if let Some(model) = model {
        rag.model = model;
    }

    Ok(QueryEngine::new(
        Arc::new(OpenAiChat::from_settings(&rag)),
        Arc::new(registry),
        Arc::new(SessionStore::new(settings.rag.max_history)),
    ))
}
