//! Centralized default constants for the journal assistant.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Default number of retrieved contexts per chat turn.
pub const MAX_RESULTS: usize = 5;

/// Smallest `max_results` accepted at the request boundary.
pub const MAX_RESULTS_MIN: usize = 1;

/// Largest `max_results` accepted at the request boundary.
pub const MAX_RESULTS_MAX: usize = 20;

/// Maximum characters kept in a context snippet before the ellipsis.
pub const SNIPPET_CHARS: usize = 300;

/// Suffix appended to truncated snippets.
pub const SNIPPET_ELLIPSIS: &str = "...";

/// Title used when a hit carries no title metadata.
pub const UNTITLED_ENTRY: &str = "Untitled Entry";

/// Date placeholder used when a hit carries no creation date.
pub const UNKNOWN_DATE: &str = "Unknown date";

/// Display format for parsed entry timestamps.
pub const DATE_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

// =============================================================================
// TOOLS
// =============================================================================

/// Name of the canonical retrieval tool offered to the model.
pub const RETRIEVE_TOOL_NAME: &str = "retrieve_entries";

/// Keyword that signals retrieval intent in an unrecognized tool payload.
pub const RETRIEVE_KEYWORD: &str = "retrieve";

/// Argument carrying the search text for the retrieval tool.
pub const QUERY_ARGUMENT: &str = "query";

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "llama3.1:8b";

/// Default sampling temperature for chat turns.
pub const GEN_TEMPERATURE: f32 = 0.7;

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for backend health checks in seconds.
pub const HEALTH_TIMEOUT_SECS: u64 = 5;
