//! Course content search tool.

use super::{optional_str, optional_u32, required_str, Citation, Tool, ToolOutput};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{ChunkFilter, CourseIndex, CourseRecord};
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Semantic search over course content, with optional course and lesson
/// scoping.
///
/// Failures the model can act on (unresolvable course name, no matching
/// passages) are reported as descriptive result text rather than errors, so
/// the model can retry with different arguments or answer from its own
/// knowledge.
pub struct CourseSearchTool {
    index: Arc<dyn CourseIndex>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
}

impl CourseSearchTool {
    /// Create a search tool over the given index and embedder.
    pub fn new(
        index: Arc<dyn CourseIndex>,
        embedder: Arc<dyn Embedder>,
        max_results: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            max_results,
        }
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &'static str {
        "search_course_content"
    }

    fn definition(&self) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: self.name().to_string(),
                description: Some(
                    "Search course materials for specific educational content. \
                    Use this for questions about what a course actually teaches."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What to search for in the course content"
                        },
                        "course_name": {
                            "type": "string",
                            "description": "Course title to restrict the search to (partial names are resolved fuzzily)"
                        },
                        "lesson_number": {
                            "type": "integer",
                            "description": "Lesson number to restrict the search to"
                        }
                    },
                    "required": ["query"]
                })),
                strict: None,
            },
        }
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput> {
        let query = required_str(&args, "query")?;
        let course_name = optional_str(&args, "course_name");
        let lesson_number = optional_u32(&args, "lesson_number");

        // Resolve the fuzzy course name first so "course does not exist" is
        // distinguishable from "course exists but nothing matched".
        let resolved_title = match &course_name {
            Some(name) => {
                let name_embedding = self.embedder.embed(name).await?;
                match self.index.resolve_course_name(&name_embedding).await? {
                    Some(title) => Some(title),
                    None => {
                        return Ok(ToolOutput::text_only(format!(
                            "No course found matching '{}'",
                            name
                        )));
                    }
                }
            }
            None => None,
        };

        let filter = ChunkFilter {
            course_title: resolved_title.clone(),
            lesson_number,
        };

        let query_embedding = self.embedder.embed(&query).await?;
        let hits = self
            .index
            .query_chunks(&query_embedding, &filter, self.max_results)
            .await?;

        debug!(
            "Search '{}' (course: {:?}, lesson: {:?}) returned {} hits",
            query, resolved_title, lesson_number, hits.len()
        );

        if hits.is_empty() {
            let mut message = String::from("No relevant content found");
            if let Some(title) = &resolved_title {
                message.push_str(&format!(" in course '{}'", title));
            }
            if let Some(number) = lesson_number {
                message.push_str(&format!(" in lesson {}", number));
            }
            message.push('.');
            return Ok(ToolOutput::text_only(message));
        }

        // Format one labeled block per result and build a citation for each,
        // resolving lesson links through the catalog.
        let mut course_cache: HashMap<String, Option<CourseRecord>> = HashMap::new();
        let mut blocks = Vec::with_capacity(hits.len());
        let mut citations = Vec::with_capacity(hits.len());

        for hit in &hits {
            if !course_cache.contains_key(&hit.course_title) {
                let record = self.index.get_course(&hit.course_title).await?;
                course_cache.insert(hit.course_title.clone(), record);
            }
            let record = course_cache[&hit.course_title].as_ref();

            let header = match hit.lesson_number {
                Some(number) => format!("[{} - Lesson {}]", hit.course_title, number),
                None => format!("[{}]", hit.course_title),
            };
            blocks.push(format!("{}\n{}", header, hit.content));

            let link = match hit.lesson_number {
                Some(number) => record
                    .and_then(|r| r.course.lesson(number))
                    .and_then(|l| l.link.clone()),
                None => record.and_then(|r| r.course.link.clone()),
            };
            citations.push(Citation {
                course_title: hit.course_title.clone(),
                lesson_number: hit.lesson_number,
                link,
            });
        }

        Ok(ToolOutput {
            text: blocks.join("\n\n"),
            citations,
        })
    }
}
