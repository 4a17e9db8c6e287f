//! Chat over the whole journal at once.
//!
//! Instead of retrieving a subset, every note is rendered into the system
//! prompt newest-first and the model is called once. No contexts are
//! returned.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use journal_core::{
    ChatBackend, ChatInvocation, ChatResponse, Error, NoteRepository, PromptMessage, Result,
};

use crate::history;
use crate::orchestrator::{apology_for, chat_or_cancel, ensure_active, ChatService};
use crate::prompts::{
    full_context_system_prompt, render_journal_entries, EMPTY_CORPUS_RESPONSE,
    FULL_CONTEXT_FAILURE_RESPONSE,
};
use crate::request::ChatRequest;

pub struct FullContextChatService {
    notes: Arc<dyn NoteRepository>,
    chat: Arc<dyn ChatBackend>,
}

impl FullContextChatService {
    pub fn new(notes: Arc<dyn NoteRepository>, chat: Arc<dyn ChatBackend>) -> Self {
        Self { notes, chat }
    }

    async fn run_turn(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        request.validate()?;
        ensure_active(cancel)?;
        let notes = self.notes.list_by_recency().await?;
        if notes.is_empty() {
            info!("No entries stored, skipping model call");
            return Ok(ChatResponse::text(EMPTY_CORPUS_RESPONSE));
        }

        let system = full_context_system_prompt(
            &history::to_text(&request.history),
            &render_journal_entries(&notes),
        );
        debug!(note_count = notes.len(), prompt_len = system.len(), "Built full-context prompt");

        ensure_active(cancel)?;
        let invocation = ChatInvocation::messages(vec![
            PromptMessage::system(system),
            PromptMessage::human(request.message.as_str()),
        ]);
        let text = match chat_or_cancel(self.chat.as_ref(), invocation, cancel).await {
            Ok(completion) => completion.text,
            Err(e @ Error::Cancelled(_)) => return Err(e),
            Err(e) => {
                warn!(model = self.chat.model_name(), error = %e, "Full-context model call failed");
                FULL_CONTEXT_FAILURE_RESPONSE.to_string()
            }
        };
        Ok(ChatResponse::text(text))
    }
}

#[async_trait]
impl ChatService for FullContextChatService {
    #[instrument(skip(self, request, cancel), fields(subsystem = "chat", component = "full_context", op = "process_request", history_len = request.history.len()))]
    async fn process_request_with_cancel(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> ChatResponse {
        let start = Instant::now();
        match self.run_turn(request, cancel).await {
            Ok(response) => {
                info!(
                    response_len = response.response.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Turn complete"
                );
                response
            }
            Err(e) => apology_for(&e),
        }
    }
}
