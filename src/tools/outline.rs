//! Course outline tool.

use super::{required_str, Citation, Tool, ToolOutput};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::CourseIndex;
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use async_trait::async_trait;
use std::sync::Arc;

/// Returns a course's title, link, and numbered lesson list, for questions
/// about course structure rather than content.
pub struct CourseOutlineTool {
    index: Arc<dyn CourseIndex>,
    embedder: Arc<dyn Embedder>,
}

impl CourseOutlineTool {
    /// Create an outline tool over the given index and embedder.
    pub fn new(index: Arc<dyn CourseIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &'static str {
        "get_course_outline"
    }

    fn definition(&self) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: self.name().to_string(),
                description: Some(
                    "Get a course's outline: its title, link, and full lesson list. \
                    Use this for questions about course structure or overview."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "course_name": {
                            "type": "string",
                            "description": "Course title (partial names are resolved fuzzily)"
                        }
                    },
                    "required": ["course_name"]
                })),
                strict: None,
            },
        }
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput> {
        let course_name = required_str(&args, "course_name")?;

        let name_embedding = self.embedder.embed(&course_name).await?;
        let Some(title) = self.index.resolve_course_name(&name_embedding).await? else {
            return Ok(ToolOutput::text_only(format!(
                "No course found matching '{}'",
                course_name
            )));
        };

        let Some(record) = self.index.get_course(&title).await? else {
            return Ok(ToolOutput::text_only(format!(
                "No course found matching '{}'",
                course_name
            )));
        };

        let course = &record.course;
        let mut lines = vec![format!("Course: {}", course.title)];
        if let Some(link) = &course.link {
            lines.push(format!("Course Link: {}", link));
        }
        if let Some(instructor) = &course.instructor {
            lines.push(format!("Instructor: {}", instructor));
        }
        lines.push(format!("Lessons ({}):", course.lessons.len()));
        for lesson in &course.lessons {
            lines.push(format!("  Lesson {}: {}", lesson.number, lesson.title));
        }

        Ok(ToolOutput {
            text: lines.join("\n"),
            citations: vec![Citation {
                course_title: course.title.clone(),
                lesson_number: None,
                link: course.link.clone(),
            }],
        })
    }
}
