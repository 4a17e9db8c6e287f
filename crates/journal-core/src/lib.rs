//! # journal-core
//!
//! Core types, traits, and abstractions for the journal assistant.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other journal crates depend on: the note and chat data model, the
//! similarity-index and record-store interfaces consumed by the chat engine,
//! and the provider-agnostic generative backend contract.

pub mod defaults;
pub mod error;
pub mod models;
pub mod prompt;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use prompt::*;
pub use traits::*;
pub use uuid_utils::new_v7;
