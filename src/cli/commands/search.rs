//! Search command implementation.

use crate::cli::commands::{open_components, require_api_key};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::index::ChunkFilter;

/// Run the search command: direct retrieval without response generation.
pub async fn run_search(
    query: &str,
    course: Option<String>,
    lesson: Option<u32>,
    limit: usize,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = require_api_key() {
        Output::error(&format!("{}", e));
        return Err(e);
    }

    let (index, embedder) = open_components(&settings)?;

    let spinner = Output::spinner("Searching...");

    // A fuzzy course name narrows the filter only when it resolves.
    let course_title = match course {
        Some(name) => {
            let name_embedding = embedder.embed(&name).await?;
            match index.resolve_course_name(&name_embedding).await? {
                Some(title) => Some(title),
                None => {
                    spinner.finish_and_clear();
                    Output::warning(&format!("No course found matching '{}'", name));
                    return Ok(());
                }
            }
        }
        None => None,
    };

    let filter = ChunkFilter {
        course_title,
        lesson_number: lesson,
    };

    let query_embedding = embedder.embed(query).await?;
    let hits = index.query_chunks(&query_embedding, &filter, limit).await?;

    spinner.finish_and_clear();

    if hits.is_empty() {
        Output::info("No results found.");
    } else {
        Output::header(&format!("Results ({})", hits.len()));
        for hit in &hits {
            Output::search_result(&hit.course_title, hit.lesson_number, hit.score, &hit.content);
        }
    }

    Ok(())
}
