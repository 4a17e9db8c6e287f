//! Rebuild the similarity index from the note repository.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument};

use journal_core::{IndexEntry, NoteRepository, Result, SimilarityIndex};

/// Outcome of a full index sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub previous_count: usize,
    pub current_count: usize,
    /// Notes submitted to the index.
    pub synced: usize,
}

/// Upsert every note into the index in one batch.
///
/// Entries whose notes no longer exist are left in place.
#[instrument(skip(notes, index), fields(subsystem = "index", component = "sync", op = "sync_index"))]
pub async fn sync_index(
    notes: &dyn NoteRepository,
    index: &dyn SimilarityIndex,
) -> Result<SyncReport> {
    let start = Instant::now();
    let previous_count = index.count().await?;

    let entries: Vec<IndexEntry> = notes
        .list_by_recency()
        .await?
        .iter()
        .map(IndexEntry::from_note)
        .collect();
    let synced = entries.len();
    index.add_batch(entries).await?;

    let current_count = index.count().await?;
    info!(
        previous_count,
        current_count,
        synced,
        duration_ms = start.elapsed().as_millis() as u64,
        "Index sync complete"
    );

    Ok(SyncReport {
        previous_count,
        current_count,
        synced,
    })
}
