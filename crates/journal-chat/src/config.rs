//! Chat engine configuration.
//!
//! Environment variables:
//! - `JOURNAL_CHAT_MODE`: `rag` (default) or `full`
//! - `JOURNAL_CHAT_MAX_RESULTS`: contexts per turn (default 5)
//! - `JOURNAL_CHAT_SNIPPET_CHARS`: snippet length before truncation (default 300)
//! - `JOURNAL_CHAT_RETRY_FINAL_CALL`: retry the post-tool model call once (default true)

use std::fmt;
use std::str::FromStr;

use journal_core::defaults::{MAX_RESULTS, SNIPPET_CHARS};
use journal_core::Error;

/// Which chat service answers a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatMode {
    /// Similarity retrieval with an optional tool round trip.
    #[default]
    Rag,
    /// Every note inlined into the system prompt.
    FullContext,
}

impl FromStr for ChatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rag" => Ok(Self::Rag),
            "full" | "full-context" | "full_context" => Ok(Self::FullContext),
            other => Err(Error::Config(format!(
                "Unknown chat mode '{}'. Expected 'rag' or 'full'",
                other
            ))),
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rag => write!(f, "rag"),
            Self::FullContext => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub mode: ChatMode,
    pub max_results: usize,
    pub snippet_chars: usize,
    pub retry_final_call: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mode: ChatMode::default(),
            max_results: MAX_RESULTS,
            snippet_chars: SNIPPET_CHARS,
            retry_final_call: true,
        }
    }
}

impl ChatConfig {
    /// Read configuration from the environment, falling back to defaults for
    /// unset or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mode: std::env::var("JOURNAL_CHAT_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mode),
            max_results: std::env::var("JOURNAL_CHAT_MAX_RESULTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_results),
            snippet_chars: std::env::var("JOURNAL_CHAT_SNIPPET_CHARS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.snippet_chars),
            retry_final_call: std::env::var("JOURNAL_CHAT_RETRY_FINAL_CALL")
                .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(defaults.retry_final_call),
        }
    }

    pub fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_retry_final_call(mut self, retry: bool) -> Self {
        self.retry_final_call = retry;
        self
    }
}
