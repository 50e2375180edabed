//! Ingest command implementation.

use crate::cli::commands::{open_components, require_api_key};
use crate::cli::Output;
use crate::config::Settings;
use crate::document::DocumentParser;
use crate::error::Result;
use crate::ingest::{IngestOutcome, Ingestor};
use std::path::Path;

/// Run the ingest command on a file or a folder of documents.
pub async fn run_ingest(path: &str, settings: Settings) -> Result<()> {
    if let Err(e) = require_api_key() {
        Output::error(&format!("{}", e));
        return Err(e);
    }

    let (index, embedder) = open_components(&settings)?;
    let ingestor = Ingestor::new(
        DocumentParser::new(&settings.chunking),
        embedder,
        index,
    );

    let path = Path::new(path);
    let spinner = Output::spinner("Indexing course documents...");

    if path.is_dir() {
        match ingestor.ingest_folder(path).await {
            Ok(report) => {
                spinner.finish_and_clear();
                Output::success(&format!(
                    "Indexed {} course(s), {} chunk(s)",
                    report.courses_added, report.chunks_added
                ));
                if report.skipped > 0 {
                    Output::info(&format!("{} already indexed, skipped", report.skipped));
                }
                if report.failed > 0 {
                    Output::warning(&format!("{} document(s) failed to parse", report.failed));
                }
            }
            Err(e) => {
                spinner.finish_and_clear();
                Output::error(&format!("Ingestion failed: {}", e));
                return Err(e);
            }
        }
    } else {
        let raw = std::fs::read_to_string(path)?;
        match ingestor.ingest_document(&raw).await {
            Ok(IngestOutcome::Added { title, chunks }) => {
                spinner.finish_and_clear();
                Output::success(&format!("Indexed '{}' with {} chunk(s)", title, chunks));
            }
            Ok(IngestOutcome::Skipped { title }) => {
                spinner.finish_and_clear();
                Output::info(&format!("'{}' is already indexed", title));
            }
            Err(e) => {
                spinner.finish_and_clear();
                Output::error(&format!("Ingestion failed: {}", e));
                return Err(e);
            }
        }
    }

    Ok(())
}
