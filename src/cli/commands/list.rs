//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::index::open_index;

/// Run the list command: course analytics over the catalog.
pub async fn run_list(settings: Settings) -> Result<()> {
    let index = open_index(&settings)?;

    let titles = index.course_titles().await?;

    if titles.is_empty() {
        Output::info("No courses indexed yet. Use 'pensum ingest <path>' to add content.");
        return Ok(());
    }

    Output::header(&format!("Indexed Courses ({})", titles.len()));
    println!();

    for title in &titles {
        match index.get_course(title).await? {
            Some(record) => {
                let lessons = record.course.lessons.len();
                Output::list_item(&format!("{} ({} lessons)", title, lessons));
            }
            None => Output::list_item(title),
        }
    }

    println!();
    Output::kv("Total courses", &index.course_count().await?.to_string());
    Output::kv("Total chunks", &index.chunk_count().await?.to_string());

    Ok(())
}
