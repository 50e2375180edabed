//! Chat model abstraction.
//!
//! The query engine treats the LLM service as a black-box capability:
//! `generate(messages, tools) -> (text, tool_calls)`. [`OpenAiChat`] is the
//! production implementation; tests substitute a scripted provider.

use crate::config::RagSettings;
use crate::error::{PensumError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionTool, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;

/// One tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Invocation id used to correlate the tool result.
    pub id: String,
    /// Declared tool name.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

/// The model's reply to one generate call.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    /// Text content, if any.
    pub text: Option<String>,
    /// Tool invocations requested this turn, in request order.
    pub tool_calls: Vec<ToolInvocation>,
}

impl ChatTurn {
    /// A plain text reply with no tool use.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one chat completion. `tools` is None when tool use is withheld.
    async fn generate(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Option<Vec<ChatCompletionTool>>,
    ) -> Result<ChatTurn>;
}

/// OpenAI chat completion provider.
pub struct OpenAiChat {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    /// Create a provider for the given model with default generation limits.
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 800,
        }
    }

    /// Create a provider from RAG settings.
    pub fn from_settings(rag: &RagSettings) -> Self {
        Self {
            client: create_client(),
            model: rag.model.clone(),
            temperature: rag.temperature,
            max_tokens: rag.max_tokens,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn generate(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Option<Vec<ChatCompletionTool>>,
    ) -> Result<ChatTurn> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);

        if let Some(tools) = tools {
            if !tools.is_empty() {
                builder.tools(tools);
            }
        }

        let request = builder
            .build()
            .map_err(|e| PensumError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PensumError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PensumError::Generation("No response from model".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolInvocation {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ChatTurn {
            text: choice.message.content,
            tool_calls,
        })
    }
}
