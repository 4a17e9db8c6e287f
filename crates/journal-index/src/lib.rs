//! # journal-index
//!
//! In-memory storage for the journal assistant: a cosine-distance
//! similarity index over an embedding backend, a note repository, and the
//! sync routine that feeds one into the other.

pub mod memory_index;
pub mod note_store;
pub mod sync;

pub use memory_index::{cosine_distance, cosine_similarity, MemoryIndex};
pub use note_store::MemoryNoteStore;
pub use sync::{sync_index, SyncReport};
