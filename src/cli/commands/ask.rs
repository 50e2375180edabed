//! Ask command implementation.

use crate::cli::commands::{build_engine, require_api_key};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;

/// Run the ask command. Each invocation is a fresh single-turn session;
/// `chat` is the command that carries history across questions.
pub async fn run_ask(question: &str, model: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = require_api_key() {
        Output::error(&format!("{}", e));
        return Err(e);
    }

    let engine = build_engine(&settings, model)?;
    let session_id = engine.sessions().new_session_id();

    let spinner = Output::spinner("Searching course materials...");

    match engine.query(&session_id, question).await {
        Ok(response) => {
            spinner.finish_and_clear();

            println!("\n{}\n", response.answer);

            if !response.citations.is_empty() {
                Output::header("Sources");
                for citation in &response.citations {
                    Output::citation(&citation.to_string(), citation.link.as_deref());
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e);
        }
    }

    Ok(())
}
