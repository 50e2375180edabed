//! Interactive chat command.

use crate::cli::commands::{build_engine, require_api_key};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
///
/// Each question runs through the full query engine; the session store keeps
/// the bounded conversation history between questions.
pub async fn run_chat(model: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = require_api_key() {
        Output::error(&format!("{}", e));
        return Err(e);
    }

    let engine = build_engine(&settings, model)?;
    let mut session_id = engine.sessions().new_session_id();

    println!("\n{}", style("Pensum Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask about your courses, or 'exit' to quit. Use 'clear' to reset conversation.")
            .dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            engine.sessions().clear(&session_id);
            session_id = engine.sessions().new_session_id();
            Output::info("Conversation history cleared.");
            continue;
        }

        match engine.query(&session_id, input).await {
            Ok(response) => {
                println!("\n{} {}\n", style("Pensum:").cyan().bold(), response.answer);
                for citation in &response.citations {
                    Output::citation(&citation.to_string(), citation.link.as_deref());
                }
                if !response.citations.is_empty() {
                    println!();
                }
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
