//! Boundary validation for incoming chat requests.

use serde::{Deserialize, Serialize};

use journal_core::defaults::{MAX_RESULTS, MAX_RESULTS_MAX, MAX_RESULTS_MIN};
use journal_core::{ChatMessage, Error, Result};

/// A chat turn as submitted by a caller.
///
/// History entries are validated on deserialization by [`ChatMessage`]
/// itself; the message and result limit are checked by [`validate`].
///
/// [`validate`]: ChatRequest::validate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    MAX_RESULTS
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            max_results: MAX_RESULTS,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Message content cannot be empty".to_string(),
            ));
        }
        if !(MAX_RESULTS_MIN..=MAX_RESULTS_MAX).contains(&self.max_results) {
            return Err(Error::InvalidInput(format!(
                "max_results must be between {} and {} (got {})",
                MAX_RESULTS_MIN, MAX_RESULTS_MAX, self.max_results
            )));
        }
        Ok(())
    }
}
