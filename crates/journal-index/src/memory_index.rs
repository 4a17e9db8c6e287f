//! In-memory similarity index over an embedding backend.
//!
//! Documents are embedded on write and compared by cosine distance
//! (`1 - cosine_similarity`) on query. Distances range over `[0, 2]`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

use journal_core::{
    EmbeddingBackend, Error, IndexEntry, QueryHits, Result, SimilarityIndex, Vector,
};

/// Calculate cosine similarity between two vectors.
///
/// Mismatched or zero-length vectors have similarity 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Cosine distance as reported by the index.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: IndexEntry,
    vector: Vector,
}

/// Similarity index holding every entry and its vector in memory.
pub struct MemoryIndex {
    embedder: Arc<dyn EmbeddingBackend>,
    entries: RwLock<Vec<StoredEntry>>,
}

impl MemoryIndex {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vector> {
        self.embedder
            .embed_texts(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("Embedding backend returned no vector".to_string()))
    }

    fn upsert(entries: &mut Vec<StoredEntry>, stored: StoredEntry) {
        match entries.iter_mut().find(|e| e.entry.id == stored.entry.id) {
            Some(existing) => *existing = stored,
            None => entries.push(stored),
        }
    }
}

#[async_trait]
impl SimilarityIndex for MemoryIndex {
    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    #[instrument(skip(self, text), fields(subsystem = "index", component = "memory_index", op = "query"))]
    async fn query(&self, text: &str, limit: usize) -> Result<QueryHits> {
        let start = Instant::now();
        let query_vector = self.embed_one(text).await?;

        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, &StoredEntry)> = entries
            .iter()
            .map(|stored| (cosine_distance(&query_vector, &stored.vector), stored))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(limit);

        for (distance, stored) in &scored {
            trace!(note_id = %stored.entry.id, distance, "Index hit");
        }

        let mut ids = Vec::with_capacity(scored.len());
        let mut documents = Vec::with_capacity(scored.len());
        let mut metadatas = Vec::with_capacity(scored.len());
        let mut distances = Vec::with_capacity(scored.len());
        for (distance, stored) in scored {
            ids.push(stored.entry.id.clone());
            documents.push(Some(stored.entry.document.clone()));
            metadatas.push(Some(stored.entry.metadata.clone()));
            distances.push(distance);
        }

        debug!(
            result_count = ids.len(),
            index_count = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Index query complete"
        );

        Ok(QueryHits {
            ids: vec![ids],
            documents: Some(vec![documents]),
            metadatas: Some(vec![metadatas]),
            distances: Some(vec![distances]),
        })
    }

    async fn add(&self, entry: IndexEntry) -> Result<()> {
        let vector = self.embed_one(&entry.document).await?;
        debug!(note_id = %entry.id, "Adding entry to index");
        let mut entries = self.entries.write().await;
        Self::upsert(&mut entries, StoredEntry { entry, vector });
        Ok(())
    }

    async fn add_batch(&self, batch: Vec<IndexEntry>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = batch.iter().map(|e| e.document.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "Expected {} vectors, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        debug!(input_count = batch.len(), "Adding batch to index");
        let mut entries = self.entries.write().await;
        for (entry, vector) in batch.into_iter().zip(vectors) {
            Self::upsert(&mut entries, StoredEntry { entry, vector });
        }
        Ok(())
    }

    async fn update(&self, entry: IndexEntry) -> Result<()> {
        if !self.entries.read().await.iter().any(|e| e.entry.id == entry.id) {
            return Err(Error::NotFound(format!("Index entry {}", entry.id)));
        }
        self.add(entry).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.entry.id != id);
        debug!(note_id = %id, removed = before - entries.len(), "Deleted entry from index");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|e| e.entry.id == id)
            .map(|e| e.entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::Metadata;
    use journal_inference::mock::MockInferenceBackend;

    fn entry(id: &str, document: &str) -> IndexEntry {
        let mut metadata = Metadata::new();
        metadata.insert("title".to_string(), serde_json::json!(id));
        IndexEntry {
            id: id.to_string(),
            document: document.to_string(),
            metadata,
        }
    }

    fn index() -> MemoryIndex {
        MemoryIndex::new(Arc::new(MockInferenceBackend::new().with_dimension(128)))
    }

    // =========================================================================
    // cosine
    // =========================================================================

    #[test]
    fn test_cosine_similarity_basic() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        let d = vec![-1.0, 0.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert!((cosine_distance(&a, &d) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    // =========================================================================
    // index operations
    // =========================================================================

    #[tokio::test]
    async fn test_empty_index_query_returns_empty_batch() {
        let index = index();
        assert_eq!(index.count().await.unwrap(), 0);

        let hits = index.query("anything", 5).await.unwrap();
        assert_eq!(hits.ids, vec![Vec::<String>::new()]);
        assert_eq!(hits.first_batch_len(), 0);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = index();
        index
            .add_batch(vec![
                entry("garden", "planted tomatoes in the garden"),
                entry("work", "long meeting with the design team"),
            ])
            .await
            .unwrap();

        let hits = index.query("tomatoes garden", 2).await.unwrap();
        assert_eq!(hits.ids[0][0], "garden");
        let distances = &hits.distances.unwrap()[0];
        assert!(distances[0] <= distances[1]);
        assert!(distances.iter().all(|d| (0.0..=2.0).contains(d)));
    }

    #[tokio::test]
    async fn test_query_respects_limit() {
        let index = index();
        for i in 0..4 {
            index
                .add(entry(&format!("n{}", i), &format!("entry number {}", i)))
                .await
                .unwrap();
        }
        let hits = index.query("entry", 2).await.unwrap();
        assert_eq!(hits.first_batch_len(), 2);
    }

    #[tokio::test]
    async fn test_add_is_upsert() {
        let index = index();
        index.add(entry("a", "first version")).await.unwrap();
        index.add(entry("a", "second version")).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(
            index.get("a").await.unwrap().unwrap().document,
            "second version"
        );
    }

    #[tokio::test]
    async fn test_update_missing_is_error() {
        let index = index();
        let err = index.update(entry("ghost", "boo")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_existing_replaces_document() {
        let index = index();
        index.add(entry("a", "old")).await.unwrap();
        index.update(entry("a", "new")).await.unwrap();
        assert_eq!(index.get("a").await.unwrap().unwrap().document, "new");
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let index = index();
        index.add(entry("a", "text")).await.unwrap();
        index.delete("missing").await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        index.delete("a").await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let index = MemoryIndex::new(Arc::new(
            MockInferenceBackend::new().with_failing_embeddings(),
        ));
        assert!(matches!(
            index.add(entry("a", "text")).await,
            Err(Error::Embedding(_))
        ));
        assert!(index.query("text", 3).await.is_err());
    }

    // =========================================================================
    // tracing
    // =========================================================================

    /// Records the fields of every span opened while installed.
    #[derive(Clone, Default)]
    struct SpanFields(Arc<std::sync::Mutex<Vec<(String, String)>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanFields {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _: &tracing::span::Id,
            _: tracing_subscriber::layer::Context<'_, S>,
        ) {
            struct Collect<'a>(&'a mut Vec<(String, String)>);
            impl tracing::field::Visit for Collect<'_> {
                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    self.0.push((field.name().to_string(), format!("{:?}", value)));
                }
            }
            let mut fields = self.0.lock().unwrap();
            attrs.record(&mut Collect(&mut fields));
        }
    }

    #[tokio::test]
    async fn test_query_span_records_limit() {
        use tracing_subscriber::layer::SubscriberExt;

        let capture = SpanFields::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let index = index();
        index.add(entry("a", "alpha")).await.unwrap();
        index.query("alpha", 3).await.unwrap();

        let fields = capture.0.lock().unwrap();
        assert!(fields.contains(&("op".to_string(), "\"query\"".to_string())));
        assert!(fields.contains(&("limit".to_string(), "3".to_string())));
    }
}
