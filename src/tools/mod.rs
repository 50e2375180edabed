//! Tool capabilities exposed to the LLM.
//!
//! Tools share one capability surface: a schema the model can read and an
//! execute entry point. Every invocation returns its text for the model
//! together with the structured citations it used, so the registry can
//! aggregate citations without any retained per-tool state.

mod outline;
mod search;

pub use outline::CourseOutlineTool;
pub use search::CourseSearchTool;

use crate::error::{PensumError, Result};
use async_openai::types::ChatCompletionTool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A source reported alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Course title.
    pub course_title: String,
    /// Lesson the cited text came from, if any.
    pub lesson_number: Option<u32>,
    /// Link to the cited lesson or course.
    pub link: Option<String>,
}

impl std::fmt::Display for Citation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.lesson_number {
            Some(n) => write!(f, "{} - Lesson {}", self.course_title, n),
            None => write!(f, "{}", self.course_title),
        }
    }
}

/// Result of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Human-readable text fed back to the model.
    pub text: String,
    /// Structured citations backing the text.
    pub citations: Vec<Citation>,
}

impl ToolOutput {
    /// A textual result with no citations (e.g. a descriptive failure).
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

/// Trait for tool implementations.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declared tool name, unique within a registry.
    fn name(&self) -> &'static str;

    /// Tool schema in the LLM service's native format.
    fn definition(&self) -> ChatCompletionTool;

    /// Execute with JSON arguments as provided by the model.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput>;
}

/// Registry of tool capabilities, dispatched by declared name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Registering two tools with the same declared name is
    /// a programming error, fatal at startup.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        if self.tools.iter().any(|t| t.name() == tool.name()) {
            return Err(PensumError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Schemas of all registered tools, in registration order.
    pub fn definitions(&self) -> Vec<ChatCompletionTool> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Dispatch an invocation to the named tool.
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> Result<ToolOutput> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| PensumError::UnknownTool(name.to_string()))?;

        tool.execute(args).await
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Extract a required string argument.
pub(crate) fn required_str(args: &serde_json::Value, key: &str) -> Result<String> {
    args[key]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| PensumError::ToolExecution(format!("Missing '{}' argument", key)))
}

/// Extract an optional string argument.
pub(crate) fn optional_str(args: &serde_json::Value, key: &str) -> Option<String> {
    args[key].as_str().map(|s| s.to_string())
}

/// Extract an optional non-negative integer argument. Values outside the
/// u32 range are treated as absent rather than wrapped.
pub(crate) fn optional_u32(args: &serde_json::Value, key: &str) -> Option<u32> {
    args[key].as_u64().and_then(|n| u32::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            self.name
        }

        fn definition(&self) -> ChatCompletionTool {
            use async_openai::types::{ChatCompletionToolType, FunctionObject};
            ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: self.name.to_string(),
                    description: Some("Echo the input".to_string()),
                    parameters: Some(json!({"type": "object", "properties": {}})),
                    strict: None,
                },
            }
        }

        async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput> {
            Ok(ToolOutput::text_only(args["text"].as_str().unwrap_or("")))
        }
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "echo" })).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.definitions().len(), 1);

        let output = registry
            .execute("echo", json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(output.text, "hello");
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "echo" })).unwrap();

        let result = registry.register(Arc::new(EchoTool { name: "echo" }));
        assert!(matches!(result, Err(PensumError::DuplicateTool(_))));
    }

    #[tokio::test]
    async fn test_unknown_tool_fails() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nope", json!({})).await;
        assert!(matches!(result, Err(PensumError::UnknownTool(_))));
    }

    #[test]
    fn test_optional_u32_rejects_out_of_range_values() {
        let args = json!({"lesson_number": 3});
        assert_eq!(optional_u32(&args, "lesson_number"), Some(3));

        // A value past u32::MAX becomes "no filter" instead of wrapping.
        let args = json!({"lesson_number": 4_294_967_296_u64});
        assert_eq!(optional_u32(&args, "lesson_number"), None);

        let args = json!({"lesson_number": -1});
        assert_eq!(optional_u32(&args, "lesson_number"), None);
        assert_eq!(optional_u32(&json!({}), "lesson_number"), None);
    }

    #[test]
    fn test_citation_display() {
        let citation = Citation {
            course_title: "Intro to X".to_string(),
            lesson_number: Some(0),
            link: None,
        };
        assert_eq!(citation.to_string(), "Intro to X - Lesson 0");

        let course_level = Citation {
            course_title: "Intro to X".to_string(),
            lesson_number: None,
            link: None,
        };
        assert_eq!(course_level.to_string(), "Intro to X");
    }
}
