//! Core traits for journal assistant abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::models::Note;
use crate::prompt::{ChatCompletion, ChatInvocation};

/// Embedding vector type.
pub type Vector = Vec<f32>;

/// Free-form metadata attached to an index entry.
pub type Metadata = Map<String, JsonValue>;

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Read access to persisted notes.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// All notes, newest first by creation time.
    async fn list_by_recency(&self) -> Result<Vec<Note>>;

    /// Fetch a single note.
    async fn get(&self, id: &str) -> Result<Option<Note>>;
}

// =============================================================================
// SIMILARITY INDEX TRAITS
// =============================================================================

/// A document submitted to the similarity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
}

impl IndexEntry {
    /// Index entry for a note: title and content as the document, dates as
    /// RFC 3339 strings in the metadata.
    pub fn from_note(note: &Note) -> Self {
        let mut metadata = Map::new();
        metadata.insert("title".to_string(), JsonValue::String(note.title.clone()));
        metadata.insert(
            "created_at".to_string(),
            JsonValue::String(note.created_at.to_rfc3339()),
        );
        metadata.insert(
            "updated_at".to_string(),
            JsonValue::String(note.updated_at.to_rfc3339()),
        );
        Self {
            id: note.id.clone(),
            document: note.document_text(),
            metadata,
        }
    }
}

/// Raw nearest-neighbour results in batch-of-arrays form.
///
/// The outer vector holds one batch per query text; the chat engine issues a
/// single query and reads only the first batch. Every field except `ids` may
/// be absent, and individual documents or metadata may be null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryHits {
    #[serde(default)]
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
}

impl QueryHits {
    /// Results with no batches at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of hits in the first batch.
    pub fn first_batch_len(&self) -> usize {
        self.ids.first().map(Vec::len).unwrap_or(0)
    }
}

/// Semantic store over embedded notes, queried by free text.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Number of indexed documents.
    async fn count(&self) -> Result<usize>;

    /// Nearest neighbours of `text` by cosine distance, closest first.
    async fn query(&self, text: &str, limit: usize) -> Result<QueryHits>;

    /// Insert or replace an entry.
    async fn add(&self, entry: IndexEntry) -> Result<()>;

    /// Insert or replace several entries.
    async fn add_batch(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Replace an existing entry. Fails when the id is unknown.
    async fn update(&self, entry: IndexEntry) -> Result<()>;

    /// Remove an entry. Unknown ids are ignored.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Fetch an entry by id.
    async fn get(&self, id: &str) -> Result<Option<IndexEntry>>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for chat-style generation with optional tool binding.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one model call.
    async fn chat(&self, invocation: ChatInvocation) -> Result<ChatCompletion>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Combined inference backend supporting both embedding and chat.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + ChatBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}
