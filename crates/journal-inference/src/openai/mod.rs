//! OpenAI-compatible inference backend.
//!
//! This module provides an inference backend that works with any
//! OpenAI-compatible API endpoint, including:
//!
//! - OpenAI cloud API
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM
//! - LM Studio
//!
//! Typed tool calls returned by these endpoints are surfaced as
//! [`journal_core::RawToolCall::Object`] values.
//!
//! # Example
//!
//! ```rust,no_run
//! use journal_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use journal_core::{ChatBackend, ChatInvocation};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::new(OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         gen_model: "llama3.1:8b".to_string(),
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//!     let completion = backend
//!         .chat(ChatInvocation::prompt("What did I write about last week?"))
//!         .await
//!         .unwrap();
//!     println!("{}", completion.text);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_DIMENSION, DEFAULT_EMBED_MODEL, DEFAULT_GEN_MODEL,
    DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_journal_error, OpenAIErrorCode};
pub use types::*;
