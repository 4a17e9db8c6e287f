//! In-memory note repository.
//!
//! Backs the CLI and tests. Notes can be seeded from a JSON file holding an
//! array of `{id?, title, content, created_at?, updated_at?}` objects; missing
//! ids are generated and missing dates default to load time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

use journal_core::{new_v7, Note, NoteRepository, Result};

#[derive(Debug, Deserialize)]
struct NoteRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl NoteRecord {
    fn into_note(self, now: DateTime<Utc>) -> Note {
        let created_at = self.created_at.unwrap_or(now);
        Note {
            id: self.id.unwrap_or_else(|| new_v7().to_string()),
            title: self.title,
            content: self.content,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}

/// Note repository held entirely in memory.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: RwLock<Vec<Note>>,
}

impl MemoryNoteStore {
    pub fn new(notes: Vec<Note>) -> Self {
        Self {
            notes: RwLock::new(notes),
        }
    }

    /// Parse a JSON array of note records.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<NoteRecord> = serde_json::from_str(json)?;
        let now = Utc::now();
        let notes: Vec<Note> = records.into_iter().map(|r| r.into_note(now)).collect();
        debug!(note_count = notes.len(), "Parsed note records");
        Ok(Self::new(notes))
    }

    /// Load notes from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_json_str(&json)?;
        info!(path = %path.display(), "Loaded notes from file");
        Ok(store)
    }

    /// Create a note with a fresh id and the current time.
    pub async fn insert(&self, title: impl Into<String>, content: impl Into<String>) -> Note {
        let now = Utc::now();
        let note = Note {
            id: new_v7().to_string(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        };
        self.notes.write().await.push(note.clone());
        note
    }

    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }
}

#[async_trait]
impl NoteRepository for MemoryNoteStore {
    async fn list_by_recency(&self) -> Result<Vec<Note>> {
        let mut notes = self.notes.read().await.clone();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    async fn get(&self, id: &str) -> Result<Option<Note>> {
        Ok(self.notes.read().await.iter().find(|n| n.id == id).cloned())
    }
}
