//! Query orchestration.
//!
//! [`QueryEngine`] runs one user query end to end: it assembles the system
//! prompt, retained history, and the new question, offers the registered tool
//! schemas to the model, executes at most one round of tool calls, and then
//! asks the model for a final synthesis with the schemas withheld. Citations
//! come from the executed tools, never from the model text.

use crate::error::{PensumError, Result};
use crate::llm::{ChatProvider, ToolInvocation};
use crate::session::{Role, SessionStore};
use crate::tools::{Citation, ToolRegistry};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolType, FunctionCall,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const SYSTEM_PROMPT: &str = "\
You are an assistant specialized in course materials and educational content, \
with access to tools for course information.

Tool usage:
- Use `get_course_outline` for questions about course structure, lesson lists, \
or course overviews
- Use `search_course_content` for questions about specific educational content \
within a course
- **One tool call per query maximum**
- Synthesize tool results into accurate, fact-based responses
- If a tool yields no results, state this clearly without offering alternatives

Response protocol:
- **General knowledge questions**: answer from existing knowledge without searching
- **Course-specific questions**: use a tool first, then answer
- **No meta-commentary**: provide direct answers only, without reasoning process, \
search explanations, or mentions of the search results

All responses must be brief, clear, and educational. Provide only the direct \
answer to what was asked.";

/// A completed answer to one query.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    /// The model's final answer text.
    pub answer: String,
    /// Citations collected from successful tool executions this query.
    pub citations: Vec<Citation>,
    /// The session the exchange was recorded under.
    pub session_id: String,
}

/// The query orchestrator.
pub struct QueryEngine {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
}

impl QueryEngine {
    /// Create an engine over a chat provider, tool registry, and session store.
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        registry: Arc<ToolRegistry>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            provider,
            registry,
            sessions,
        }
    }

    /// Access the session store, e.g. to mint session ids for callers.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer one user query within a session.
    ///
    /// Runs at most one round of tool execution. Tool execution failures are
    /// fed back to the model as descriptive text; generation failures abort
    /// the turn and leave the session history untouched.
    #[instrument(skip(self, question), fields(session = %session_id))]
    pub async fn query(&self, session_id: &str, question: &str) -> Result<QueryResponse> {
        let mut messages = self.build_messages(session_id, question)?;

        let tools = self.registry.definitions();
        let first = self
            .provider
            .generate(messages.clone(), Some(tools))
            .await?;

        let (answer, citations) = if first.tool_calls.is_empty() {
            let answer = first
                .text
                .ok_or_else(|| PensumError::Generation("Model returned no content".to_string()))?;
            (answer, Vec::new())
        } else {
            debug!("Model requested {} tool call(s)", first.tool_calls.len());
            let citations = self
                .run_tool_round(&mut messages, &first.tool_calls)
                .await?;

            // Final synthesis: schemas withheld, so the model cannot request
            // a second round. Any stray tool request here is ignored.
            let last = self.provider.generate(messages, None).await?;
            if !last.tool_calls.is_empty() {
                warn!("Model requested tools in the final round; ignoring");
            }
            let answer = last
                .text
                .ok_or_else(|| PensumError::Generation("Model returned no content".to_string()))?;
            (answer, citations)
        };

        self.sessions.append_exchange(session_id, question, &answer);

        Ok(QueryResponse {
            answer,
            citations,
            session_id: session_id.to_string(),
        })
    }

    fn build_messages(
        &self,
        session_id: &str,
        question: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PensumError::Generation(e.to_string()))?
                .into(),
        ];

        for turn in self.sessions.history(session_id) {
            let message = match turn.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content)
                    .build()
                    .map_err(|e| PensumError::Generation(e.to_string()))?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content)
                    .build()
                    .map_err(|e| PensumError::Generation(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(question)
                .build()
                .map_err(|e| PensumError::Generation(e.to_string()))?
                .into(),
        );

        Ok(messages)
    }

    /// Execute the requested tool calls and append the assistant request and
    /// each tool result to the transcript. Returns the citations from the
    /// successful executions.
    async fn run_tool_round(
        &self,
        messages: &mut Vec<ChatCompletionRequestMessage>,
        invocations: &[ToolInvocation],
    ) -> Result<Vec<Citation>> {
        let requested: Vec<ChatCompletionMessageToolCall> = invocations
            .iter()
            .map(|inv| ChatCompletionMessageToolCall {
                id: inv.id.clone(),
                r#type: ChatCompletionToolType::Function,
                function: FunctionCall {
                    name: inv.name.clone(),
                    arguments: inv.arguments.clone(),
                },
            })
            .collect();

        messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(requested)
                .build()
                .map_err(|e| PensumError::Generation(e.to_string()))?
                .into(),
        );

        let mut citations = Vec::new();

        for invocation in invocations {
            let result_text = match self.execute_invocation(invocation).await {
                Ok(output) => {
                    citations.extend(output.citations);
                    output.text
                }
                Err(e) => {
                    warn!("Tool '{}' failed: {}", invocation.name, e);
                    format!("Tool execution failed: {}", e)
                }
            };

            messages.push(
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(&invocation.id)
                    .content(result_text)
                    .build()
                    .map_err(|e| PensumError::Generation(e.to_string()))?
                    .into(),
            );
        }

        Ok(citations)
    }

    async fn execute_invocation(
        &self,
        invocation: &ToolInvocation,
    ) -> Result<crate::tools::ToolOutput> {
        let args: serde_json::Value = serde_json::from_str(&invocation.arguments)
            .map_err(|e| PensumError::ToolExecution(format!("Invalid tool arguments: {}", e)))?;
        self.registry.execute(&invocation.name, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Course, CourseChunk, Lesson};
    use crate::embedding::testing::HashEmbedder;
    use crate::embedding::Embedder;
    use crate::index::{ChunkRecord, CourseIndex, CourseRecord, MemoryIndex};
    use crate::llm::ChatTurn;
    use crate::tools::CourseSearchTool;
    use async_openai::types::ChatCompletionTool;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A provider that replays a fixed script and records each call.
    struct ScriptedChat {
        script: Mutex<std::collections::VecDeque<ChatTurn>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    struct RecordedCall {
        messages: Vec<ChatCompletionRequestMessage>,
        tools_offered: bool,
    }

    impl ScriptedChat {
        fn new(turns: Vec<ChatTurn>) -> Self {
            Self {
                script: Mutex::new(turns.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn generate(
            &self,
            messages: Vec<ChatCompletionRequestMessage>,
            tools: Option<Vec<ChatCompletionTool>>,
        ) -> crate::error::Result<ChatTurn> {
            self.calls.lock().unwrap().push(RecordedCall {
                messages,
                tools_offered: tools.map(|t| !t.is_empty()).unwrap_or(false),
            });
            Ok(self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted"))
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ChatTurn {
        ChatTurn {
            text: None,
            tool_calls: vec![ToolInvocation {
                id: "call_1".to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        }
    }

    async fn seeded_index() -> Arc<MemoryIndex> {
        let embedder = HashEmbedder::new();
        let index = Arc::new(MemoryIndex::new());

        let course = Course {
            title: "Intro to X".to_string(),
            link: Some("https://example.com/x".to_string()),
            instructor: None,
            lessons: vec![Lesson {
                number: 0,
                title: "Basics".to_string(),
                link: Some("https://example.com/x/0".to_string()),
            }],
        };
        let title_embedding = embedder.embed(&course.title).await.unwrap();
        index
            .upsert_course(&CourseRecord::new(course, title_embedding))
            .await
            .unwrap();

        let chunk = CourseChunk {
            content: "Widgets are small parts used in assembly.".to_string(),
            course_title: "Intro to X".to_string(),
            lesson_number: Some(0),
            chunk_index: 0,
        };
        let embedding = embedder.embed(&chunk.content).await.unwrap();
        index
            .upsert_chunks(&[ChunkRecord::new(chunk, embedding)])
            .await
            .unwrap();

        index
    }

    async fn engine_with(provider: Arc<ScriptedChat>, max_history: usize) -> QueryEngine {
        let index = seeded_index().await;
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());

        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(CourseSearchTool::new(index, embedder, 5)))
            .unwrap();

        QueryEngine::new(
            provider,
            Arc::new(registry),
            Arc::new(SessionStore::new(max_history)),
        )
    }

    #[tokio::test]
    async fn test_single_tool_round_with_citations() {
        let provider = Arc::new(ScriptedChat::new(vec![
            tool_call("search_course_content", r#"{"query": "widgets"}"#),
            ChatTurn::text("Widgets are small parts used in assembly."),
        ]));
        let engine = engine_with(provider.clone(), 2).await;

        let response = engine.query("s1", "What are widgets?").await.unwrap();

        assert_eq!(response.answer, "Widgets are small parts used in assembly.");
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].course_title, "Intro to X");
        assert_eq!(response.citations[0].lesson_number, Some(0));
        assert_eq!(
            response.citations[0].link.as_deref(),
            Some("https://example.com/x/0")
        );

        // Exactly two generate calls: schemas offered first, withheld second.
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].tools_offered);
        assert!(!calls[1].tools_offered);
        // The second call sees the assistant tool request and the tool result.
        assert_eq!(calls[1].messages.len(), calls[0].messages.len() + 2);
    }

    #[tokio::test]
    async fn test_direct_answer_skips_tool_round() {
        let provider = Arc::new(ScriptedChat::new(vec![ChatTurn::text("Paris.")]));
        let engine = engine_with(provider.clone(), 2).await;

        let response = engine
            .query("s1", "What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(response.answer, "Paris.");
        assert!(response.citations.is_empty());
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_course_yields_no_citations() {
        let provider = Arc::new(ScriptedChat::new(vec![
            tool_call(
                "search_course_content",
                r#"{"query": "juggling", "course_name": "Quantum Juggling"}"#,
            ),
            ChatTurn::text("No course matching that name was found."),
        ]));
        let engine = engine_with(provider, 2).await;

        let response = engine
            .query("s1", "What does Quantum Juggling cover?")
            .await
            .unwrap();

        assert!(response.citations.is_empty());
        assert_eq!(response.answer, "No course matching that name was found.");
    }

    #[tokio::test]
    async fn test_unknown_tool_fed_back_as_failure() {
        let provider = Arc::new(ScriptedChat::new(vec![
            tool_call("summon_gremlins", "{}"),
            ChatTurn::text("I could not complete that request."),
        ]));
        let engine = engine_with(provider.clone(), 2).await;

        let response = engine.query("s1", "Summon gremlins").await.unwrap();
        assert!(response.citations.is_empty());

        // The failure text reaches the model as a tool message.
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn test_history_bounded_to_latest_exchange() {
        let provider = Arc::new(ScriptedChat::new(vec![
            ChatTurn::text("First answer."),
            ChatTurn::text("Second answer."),
            ChatTurn::text("Third answer."),
        ]));
        let engine = engine_with(provider.clone(), 1).await;

        engine.query("s1", "First question?").await.unwrap();
        engine.query("s1", "Second question?").await.unwrap();
        engine.query("s1", "Third question?").await.unwrap();

        // System + one retained exchange + the new question.
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[2].messages.len(), 4);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let provider = Arc::new(ScriptedChat::new(vec![
            ChatTurn::text("Answer A."),
            ChatTurn::text("Answer B."),
        ]));
        let engine = engine_with(provider.clone(), 2).await;

        engine.query("s1", "Question A?").await.unwrap();
        engine.query("s2", "Question B?").await.unwrap();

        // The second session starts fresh: system + its own question only.
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[1].messages.len(), 2);
    }
}
