//! Retrieval-augmented chat turn orchestration.
//!
//! A turn walks an explicit state machine:
//!
//! ```text
//! Start -> CheckCorpus -> EmptyResponse ----------------------> Finalize
//!                      -> Retrieve -> DirectAnswer -----------> Finalize
//!                                  -> ToolDispatch -----------> Finalize
//! ```
//!
//! `DirectAnswer` runs when retrieval produced contexts and makes exactly
//! one model call. `ToolDispatch` offers the model a retrieval tool; if the
//! model asks for it, the call is interpreted into a [`ToolIntent`], executed
//! against the index, and its textual result fed back for one final model
//! call. Every failure resolves to a [`ChatResponse`]; nothing escapes
//! [`ChatService::process_request`].

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use journal_core::defaults::{MAX_RESULTS, QUERY_ARGUMENT};
use journal_core::{
    ChatBackend, ChatCompletion, ChatInvocation, ChatMessage, ChatResponse, Error, PromptMessage,
    RawToolCall, Result, RetrievedContext, SimilarityIndex, ToolInvocationRequest,
};

use crate::config::ChatConfig;
use crate::context::{render_context_block, render_tool_result, ContextAssembler, TOOL_RESULT_FAILURE};
use crate::history;
use crate::prompts::{self, DEFAULT_SYSTEM_MESSAGE, EMPTY_CORPUS_RESPONSE, GENERIC_APOLOGY};
use crate::request::ChatRequest;
use crate::tool_call;

/// Model calls slower than this are logged as slow.
const SLOW_MODEL_CALL_MS: u64 = 30_000;

/// A chat engine answering one message at a time.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Answer `request`, stopping early once `cancel` fires.
    ///
    /// Requests failing [`ChatRequest::validate`] are answered with the
    /// apology without touching the index or the model.
    async fn process_request_with_cancel(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> ChatResponse;

    /// Result limit applied when a caller passes only a message.
    fn default_max_results(&self) -> usize {
        MAX_RESULTS
    }

    async fn process_request(&self, request: &ChatRequest) -> ChatResponse {
        self.process_request_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Answer `message` given prior `history` with the default result limit.
    async fn process_message_with_cancel(
        &self,
        message: &str,
        history: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> ChatResponse {
        let request = ChatRequest::new(message)
            .with_history(history.to_vec())
            .with_max_results(self.default_max_results());
        self.process_request_with_cancel(&request, cancel).await
    }

    /// Answer `message` given prior `history`. Always returns a response.
    async fn process_message(&self, message: &str, history: &[ChatMessage]) -> ChatResponse {
        self.process_message_with_cancel(message, history, &CancellationToken::new())
            .await
    }
}

/// Fail with [`Error::Cancelled`] once the token has fired.
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled("chat turn cancelled".to_string()));
    }
    Ok(())
}

/// Run a model call unless `cancel` fires first.
pub(crate) async fn chat_or_cancel(
    chat: &dyn ChatBackend,
    invocation: ChatInvocation,
    cancel: &CancellationToken,
) -> Result<ChatCompletion> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled("model call cancelled".to_string())),
        result = chat.chat(invocation) => result,
    }
}

/// Map a failed turn to the user-facing apology.
pub(crate) fn apology_for(err: &Error) -> ChatResponse {
    match err {
        Error::Cancelled(_) => info!("Turn cancelled, returning apology"),
        Error::InvalidInput(_) => warn!(error = %err, "Rejected chat request"),
        _ => error!(error = %err, error_debug = ?err, "Turn failed, returning apology"),
    }
    ChatResponse::text(GENERIC_APOLOGY)
}

// =============================================================================
// TURN STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Start,
    CheckCorpus,
    EmptyResponse,
    Retrieve,
    DirectAnswer,
    ToolDispatch,
    Finalize,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::CheckCorpus => "check_corpus",
            Self::EmptyResponse => "empty_response",
            Self::Retrieve => "retrieve",
            Self::DirectAnswer => "direct_answer",
            Self::ToolDispatch => "tool_dispatch",
            Self::Finalize => "finalize",
        }
    }
}

/// A tool call the model asked for, interpreted but not yet executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolIntent {
    /// Id the tool result must answer to.
    pub call_id: String,
    pub request: ToolInvocationRequest,
}

impl ToolIntent {
    /// Interpret every raw tool call from one model response.
    pub fn plan(tool_calls: &[RawToolCall], fallback_query: &str) -> Vec<Self> {
        tool_calls
            .iter()
            .enumerate()
            .map(|(i, raw)| Self {
                call_id: raw.resolved_call_id(i),
                request: tool_call::interpret(raw, fallback_query),
            })
            .collect()
    }
}

// =============================================================================
// SERVICE
// =============================================================================

/// Retrieval-augmented chat over a similarity index.
pub struct RagChatService {
    index: Arc<dyn SimilarityIndex>,
    chat: Arc<dyn ChatBackend>,
    assembler: ContextAssembler,
    config: ChatConfig,
}

impl RagChatService {
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        chat: Arc<dyn ChatBackend>,
        config: ChatConfig,
    ) -> Self {
        Self {
            index,
            chat,
            assembler: ContextAssembler::new(config.snippet_chars),
            config,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    async fn run_turn(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        request.validate()?;
        let message = request.message.as_str();
        let history = request.history.as_slice();
        let limit = request.max_results;

        let mut state = TurnState::Start;
        let mut contexts: Vec<RetrievedContext> = Vec::new();
        let mut response = None;

        loop {
            debug!(turn_state = state.as_str(), "Turn state");
            state = match state {
                TurnState::Start => TurnState::CheckCorpus,
                TurnState::CheckCorpus => {
                    ensure_active(cancel)?;
                    let index_count = self.index.count().await?;
                    debug!(index_count, "Checked corpus");
                    if index_count == 0 {
                        TurnState::EmptyResponse
                    } else {
                        TurnState::Retrieve
                    }
                }
                TurnState::EmptyResponse => {
                    info!("No entries indexed, skipping model call");
                    response = Some(ChatResponse::text(EMPTY_CORPUS_RESPONSE));
                    TurnState::Finalize
                }
                TurnState::Retrieve => {
                    ensure_active(cancel)?;
                    contexts = match self
                        .assembler
                        .search(self.index.as_ref(), message, limit)
                        .await
                    {
                        Ok(found) => found,
                        Err(e) => {
                            warn!(error = %e, "Retrieval failed, continuing without contexts");
                            Vec::new()
                        }
                    };
                    debug!(result_count = contexts.len(), "Retrieved contexts");
                    if contexts.is_empty() {
                        TurnState::ToolDispatch
                    } else {
                        TurnState::DirectAnswer
                    }
                }
                TurnState::DirectAnswer => {
                    let found = std::mem::take(&mut contexts);
                    response = Some(self.direct_answer(message, history, found, cancel).await?);
                    TurnState::Finalize
                }
                TurnState::ToolDispatch => {
                    response = Some(self.tool_dispatch(message, history, limit, cancel).await?);
                    TurnState::Finalize
                }
                TurnState::Finalize => {
                    return response.ok_or_else(|| {
                        Error::Internal("turn finished without a response".to_string())
                    });
                }
            };
        }
    }

    async fn direct_answer(
        &self,
        message: &str,
        history: &[ChatMessage],
        contexts: Vec<RetrievedContext>,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        let prompt = prompts::direct_prompt(
            &history::to_text(history),
            message,
            &render_context_block(&contexts),
        );

        ensure_active(cancel)?;
        let invocation = ChatInvocation::prompt(prompt);
        let text = match self.call_model(invocation, "direct_answer", cancel).await {
            Ok(completion) => completion.text,
            Err(e @ Error::Cancelled(_)) => return Err(e),
            Err(_) => {
                warn!(result_count = contexts.len(), "Using title fallback answer");
                prompts::direct_answer_fallback(&contexts)
            }
        };
        Ok(ChatResponse::new(text, contexts))
    }

    async fn tool_dispatch(
        &self,
        message: &str,
        history: &[ChatMessage],
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        let mut messages = Vec::with_capacity(history.len() + 4);
        messages.push(PromptMessage::system(DEFAULT_SYSTEM_MESSAGE));
        messages.extend(history::to_messages(history));
        messages.push(PromptMessage::human(message));

        ensure_active(cancel)?;
        let invocation =
            ChatInvocation::messages(messages.clone()).with_tools(vec![prompts::retrieval_tool()]);
        let completion = match self.call_model(invocation, "tool_dispatch", cancel).await {
            Ok(completion) => completion,
            Err(e @ Error::Cancelled(_)) => return Err(e),
            Err(_) => {
                warn!("Tool-bound model call failed, returning apology");
                return Ok(ChatResponse::text(GENERIC_APOLOGY));
            }
        };

        if completion.tool_calls.is_empty() {
            debug!("Model answered without tools");
            return Ok(ChatResponse::text(completion.text));
        }

        let intents = ToolIntent::plan(&completion.tool_calls, message);
        debug!(tool_count = intents.len(), "Planned tool calls");
        messages.push(PromptMessage::Assistant {
            content: completion.text,
            tool_calls: completion.tool_calls,
        });

        for intent in &intents {
            ensure_active(cancel)?;
            messages.push(self.execute_tool(intent, limit).await);
        }

        let text = self.final_answer(messages, cancel).await?;
        Ok(ChatResponse::text(text))
    }

    /// Run one interpreted tool call and wrap its result as a tool message.
    ///
    /// Retrieval returns at most `limit` entries. Tool failures become text
    /// for the model rather than errors.
    #[instrument(skip(self, intent), fields(subsystem = "chat", component = "rag", op = "execute_tool", tool_name = %intent.request.tool_name))]
    pub async fn execute_tool(&self, intent: &ToolIntent, limit: usize) -> PromptMessage {
        let request = &intent.request;
        let content = if request.is_retrieval() {
            let query = match request.arguments.get(QUERY_ARGUMENT) {
                Some(JsonValue::String(q)) => q.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            match self
                .assembler
                .retrieve(self.index.as_ref(), &query, limit)
                .await
            {
                Ok(retrieval) => {
                    debug!(result_count = retrieval.contexts().len(), "Tool retrieval complete");
                    render_tool_result(&retrieval)
                }
                Err(e) => {
                    warn!(error = %e, "Tool retrieval failed");
                    TOOL_RESULT_FAILURE.to_string()
                }
            }
        } else {
            warn!(tool_name = %request.tool_name, "No matching tool found");
            format!(
                "Error using this tool: unknown tool '{}'",
                request.tool_name
            )
        };

        PromptMessage::Tool {
            name: request.tool_name.clone(),
            content,
            call_id: Some(intent.call_id.clone()),
        }
    }

    /// Model call after tool results, retried once when configured.
    async fn final_answer(
        &self,
        messages: Vec<PromptMessage>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let attempts = if self.config.retry_final_call { 2 } else { 1 };
        for attempt in 1..=attempts {
            ensure_active(cancel)?;
            let invocation = ChatInvocation::messages(messages.clone());
            match self.call_model(invocation, "final_answer", cancel).await {
                Ok(completion) => return Ok(completion.text),
                Err(e @ Error::Cancelled(_)) => return Err(e),
                Err(_) if attempt < attempts => info!(attempt, "Retrying final model call"),
                Err(_) => {}
            }
        }
        warn!(attempts, "Final model call failed, returning apology");
        Ok(GENERIC_APOLOGY.to_string())
    }

    async fn call_model(
        &self,
        invocation: ChatInvocation,
        phase: &'static str,
        cancel: &CancellationToken,
    ) -> Result<ChatCompletion> {
        let start = Instant::now();
        let prompt_len = invocation.input.len();
        let tool_count = invocation.tools.len();
        let result = chat_or_cancel(self.chat.as_ref(), invocation, cancel).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(completion) => {
                debug!(
                    phase,
                    model = self.chat.model_name(),
                    prompt_len,
                    tool_count,
                    response_len = completion.text.len(),
                    tool_calls = completion.tool_calls.len(),
                    duration_ms,
                    "Model call complete"
                );
                if duration_ms > SLOW_MODEL_CALL_MS {
                    warn!(phase, duration_ms, slow = true, "Slow model call");
                }
            }
            Err(Error::Cancelled(_)) => debug!(phase, duration_ms, "Model call cancelled"),
            Err(e) => warn!(
                phase,
                model = self.chat.model_name(),
                error = %e,
                duration_ms,
                "Model call failed"
            ),
        }
        result
    }
}

#[async_trait]
impl ChatService for RagChatService {
    #[instrument(skip(self, request, cancel), fields(subsystem = "chat", component = "rag", op = "process_request", history_len = request.history.len(), max_results = request.max_results))]
    async fn process_request_with_cancel(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> ChatResponse {
        let start = Instant::now();
        match self.run_turn(request, cancel).await {
            Ok(response) => {
                info!(
                    result_count = response.retrieved_contexts.len(),
                    response_len = response.response.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Turn complete"
                );
                response
            }
            Err(e) => apology_for(&e),
        }
    }

    fn default_max_results(&self) -> usize {
        self.config.max_results
    }
}
