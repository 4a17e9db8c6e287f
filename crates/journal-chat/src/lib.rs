//! # journal-chat
//!
//! Conversational engine answering questions about journal entries.
//!
//! [`RagChatService`] retrieves the entries most similar to the question and
//! grounds one model call in them, falling back to a tool round trip when
//! retrieval finds nothing. [`FullContextChatService`] inlines every entry
//! instead. Both implement [`ChatService`] and never fail outward: every
//! error becomes a user-safe [`ChatResponse`](journal_core::ChatResponse).

pub mod config;
pub mod context;
pub mod full_context;
pub mod history;
pub mod orchestrator;
pub mod prompts;
pub mod request;
pub mod tool_call;

pub use config::{ChatConfig, ChatMode};
pub use context::{ContextAssembler, Parsed, Retrieval};
pub use full_context::FullContextChatService;
pub use orchestrator::{ChatService, RagChatService, ToolIntent, TurnState};
pub use request::ChatRequest;
pub use tool_call::{interpret, ToolCallShape};
