//! # journal-inference
//!
//! LLM inference backend abstraction for the journal assistant.
//!
//! This crate provides:
//! - Ollama implementation (default) of embeddings and tool-aware chat
//! - OpenAI-compatible implementation (feature `openai`)
//! - Backend selection from environment variables or a TOML file
//! - A scripted mock backend for tests (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `openai` (default): Enable OpenAI-compatible backend
//! - `mock`: Expose [`mock::MockInferenceBackend`] to downstream tests
//!
//! # Example
//!
//! ```rust,no_run
//! use journal_inference::OllamaBackend;
//! use journal_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env();
//!     let texts = vec!["Hello".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

pub mod config;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

// Mock inference backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use journal_core::*;

pub use config::{Backends, BackendKind, ConfigError, InferenceConfig};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};
