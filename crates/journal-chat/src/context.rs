//! Context assembly: raw index hits to ranked, prompt-ready contexts.
//!
//! Every per-hit field goes through a parse helper returning [`Parsed`], so
//! a missing title, document, distance, or malformed date degrades that one
//! field to a default instead of failing the batch.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use std::time::Instant;
use tracing::{debug, instrument, trace};

use journal_core::defaults::{SNIPPET_CHARS, SNIPPET_ELLIPSIS, UNTITLED_ENTRY};
use journal_core::{CreatedAt, Metadata, QueryHits, Result, RetrievedContext, SimilarityIndex};

// =============================================================================
// PARSE RESULTS
// =============================================================================

/// Outcome of parsing one field of a hit.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Ok(T),
    /// The field was missing or malformed; carries the default used instead.
    Degraded(T, String),
}

impl<T> Parsed<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Ok(v) | Self::Degraded(v, _) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Ok(v) | Self::Degraded(v, _) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(..))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded(_, reason) => Some(reason),
        }
    }
}

// =============================================================================
// FIELD PARSERS
// =============================================================================

/// Similarity score in `[0, 1]` from a cosine distance.
///
/// Missing or non-finite distances count as maximal distance.
pub fn similarity_from_distance(distance: Option<f32>) -> Parsed<f32> {
    match distance {
        None => Parsed::Degraded(0.0, "missing distance".to_string()),
        Some(d) if !d.is_finite() => Parsed::Degraded(0.0, format!("non-finite distance {}", d)),
        Some(d) => Parsed::Ok((1.0 - d).clamp(0.0, 1.0)),
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], SNIPPET_ELLIPSIS),
        None => text.to_string(),
    }
}

/// Parse a `created_at` metadata value.
///
/// Accepts RFC 3339 strings (including a trailing `Z`), offset-less
/// ISO-8601 date-times (read as UTC) and integer Unix seconds. Anything else
/// is kept verbatim.
pub fn parse_created_at(value: Option<&JsonValue>) -> Parsed<CreatedAt> {
    match value {
        None | Some(JsonValue::Null) => {
            Parsed::Degraded(CreatedAt::unknown(), "missing created_at".to_string())
        }
        Some(JsonValue::String(raw)) => parse_date_str(raw),
        Some(JsonValue::Number(n)) => match n.as_i64().and_then(|s| Utc.timestamp_opt(s, 0).single()) {
            Some(ts) => Parsed::Ok(CreatedAt::from(ts)),
            None => Parsed::Degraded(
                CreatedAt::Raw(n.to_string()),
                "created_at is not a valid Unix timestamp".to_string(),
            ),
        },
        Some(other) => Parsed::Degraded(
            CreatedAt::Raw(other.to_string()),
            "created_at has unexpected type".to_string(),
        ),
    }
}

fn parse_date_str(raw: &str) -> Parsed<CreatedAt> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Parsed::Ok(CreatedAt::Timestamp(ts));
    }
    for format in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M%:z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Parsed::Ok(CreatedAt::Timestamp(ts));
        }
    }
    // Naive values are taken as UTC.
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Parsed::Ok(CreatedAt::from(naive.and_utc()));
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Parsed::Ok(CreatedAt::from(midnight.and_utc()));
    }
    Parsed::Degraded(
        CreatedAt::Raw(raw.to_string()),
        format!("unparseable created_at {:?}", raw),
    )
}

fn parse_title(metadata: Option<&Metadata>) -> Parsed<String> {
    match metadata.and_then(|m| m.get("title")) {
        Some(JsonValue::String(title)) => Parsed::Ok(title.clone()),
        Some(_) => Parsed::Degraded(UNTITLED_ENTRY.to_string(), "title is not a string".to_string()),
        None => Parsed::Degraded(UNTITLED_ENTRY.to_string(), "missing title".to_string()),
    }
}

/// Column `i` of the first batch of an optional batch-of-arrays field.
fn first_batch_at<T>(field: &Option<Vec<Vec<T>>>, i: usize) -> Option<&T> {
    field.as_ref()?.first()?.get(i)
}

// =============================================================================
// ASSEMBLER
// =============================================================================

/// Outcome of a retrieval against the index.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// The index holds no documents at all.
    EmptyCorpus,
    /// The index has documents but none matched.
    NoMatches,
    Found(Vec<RetrievedContext>),
}

impl Retrieval {
    pub fn contexts(&self) -> &[RetrievedContext] {
        match self {
            Self::Found(contexts) => contexts,
            Self::EmptyCorpus | Self::NoMatches => &[],
        }
    }

    pub fn into_contexts(self) -> Vec<RetrievedContext> {
        match self {
            Self::Found(contexts) => contexts,
            Self::EmptyCorpus | Self::NoMatches => Vec::new(),
        }
    }
}

/// Turns raw similarity-index hits into [`RetrievedContext`] records.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    snippet_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(SNIPPET_CHARS)
    }
}

impl ContextAssembler {
    pub fn new(snippet_chars: usize) -> Self {
        Self { snippet_chars }
    }

    /// Normalize the first batch of `hits`, keeping index order and at most
    /// `limit` contexts.
    pub fn assemble(&self, query: &str, hits: &QueryHits, limit: usize) -> Vec<RetrievedContext> {
        let Some(ids) = hits.ids.first() else {
            debug!(query_len = query.len(), "Index returned no result batches");
            return Vec::new();
        };

        let mut contexts = Vec::with_capacity(ids.len().min(limit));
        for (i, id) in ids.iter().take(limit).enumerate() {
            let metadata = first_batch_at(&hits.metadatas, i).and_then(Option::as_ref);

            let score = similarity_from_distance(first_batch_at(&hits.distances, i).copied());
            let title = parse_title(metadata);
            let created_at = parse_created_at(metadata.and_then(|m| m.get("created_at")));
            let document = match first_batch_at(&hits.documents, i).and_then(Option::as_deref) {
                Some(doc) => Parsed::Ok(doc),
                None => Parsed::Degraded("", "missing document".to_string()),
            };

            for (field, reason) in [
                ("similarity_score", score.reason()),
                ("title", title.reason()),
                ("created_at", created_at.reason()),
                ("document", document.reason()),
            ] {
                if let Some(reason) = reason {
                    debug!(note_id = %id, field, reason, "Hit field degraded to default");
                }
            }

            let context = RetrievedContext {
                note_id: id.clone(),
                title: title.into_value(),
                content_snippet: truncate_snippet(document.into_value(), self.snippet_chars),
                similarity_score: score.into_value(),
                created_at: created_at.into_value(),
            };
            trace!(
                note_id = %context.note_id,
                similarity_score = context.similarity_score,
                "Assembled context"
            );
            contexts.push(context);
        }
        contexts
    }

    /// Query the index and assemble the hits.
    pub async fn search(
        &self,
        index: &dyn SimilarityIndex,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedContext>> {
        let hits = index.query(query, limit).await?;
        Ok(self.assemble(query, &hits, limit))
    }

    /// Full retrieval, distinguishing an empty corpus from a query with no
    /// matches.
    #[instrument(skip(self, index, query), fields(subsystem = "chat", component = "context", op = "retrieve"))]
    pub async fn retrieve(
        &self,
        index: &dyn SimilarityIndex,
        query: &str,
        limit: usize,
    ) -> Result<Retrieval> {
        let start = Instant::now();
        let index_count = index.count().await?;
        if index_count == 0 {
            debug!("Index is empty");
            return Ok(Retrieval::EmptyCorpus);
        }

        let contexts = self.search(index, query, limit).await?;
        debug!(
            index_count,
            result_count = contexts.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Retrieval complete"
        );
        if contexts.is_empty() {
            Ok(Retrieval::NoMatches)
        } else {
            Ok(Retrieval::Found(contexts))
        }
    }
}

// =============================================================================
// RENDERING
// =============================================================================

const CONTEXT_BLOCK_HEADER: &str =
    "Here are the relevant journal entries that should be used to answer the query:\n\n";
const CONTEXT_BLOCK_FOOTER: &str = "\nYou MUST use the above information to directly answer the user's query. Do not ask for more information or context.";
const NO_RELEVANT_ENTRIES: &str = "No relevant journal entries found.";

const TOOL_RESULT_HEADER: &str = "Here are the relevant journal entries I found:\n\n";
const TOOL_RESULT_EMPTY_CORPUS: &str =
    "You don't have any journal entries yet. Try adding some entries first!";

/// Text returned to the model when the retrieval tool itself fails.
pub const TOOL_RESULT_FAILURE: &str = "Error retrieving journal entries.";

fn render_entries(out: &mut String, contexts: &[RetrievedContext]) {
    for (i, context) in contexts.iter().enumerate() {
        out.push_str(&format!(
            "Entry {}: {} (Created: {})\nContent: {}\n\n",
            i + 1,
            context.title,
            context.created_at,
            context.content_snippet
        ));
    }
}

/// Prompt block grounding the direct answer.
pub fn render_context_block(contexts: &[RetrievedContext]) -> String {
    if contexts.is_empty() {
        return NO_RELEVANT_ENTRIES.to_string();
    }
    let mut out = String::from(CONTEXT_BLOCK_HEADER);
    render_entries(&mut out, contexts);
    out.push_str(CONTEXT_BLOCK_FOOTER);
    out
}

/// Textual result of the retrieval tool, fed back to the model.
pub fn render_tool_result(retrieval: &Retrieval) -> String {
    match retrieval {
        Retrieval::EmptyCorpus => TOOL_RESULT_EMPTY_CORPUS.to_string(),
        Retrieval::NoMatches => NO_RELEVANT_ENTRIES.to_string(),
        Retrieval::Found(contexts) => {
            let mut out = String::from(TOOL_RESULT_HEADER);
            render_entries(&mut out, contexts);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: JsonValue) -> Option<Metadata> {
        value.as_object().cloned()
    }

    fn hits(ids: &[&str], distances: Option<Vec<f32>>) -> QueryHits {
        QueryHits {
            ids: vec![ids.iter().map(|s| s.to_string()).collect()],
            documents: Some(vec![ids.iter().map(|id| Some(format!("doc {}", id))).collect()]),
            metadatas: Some(vec![ids
                .iter()
                .map(|id| metadata(json!({"title": format!("Title {}", id), "created_at": "2024-02-03T04:05:06Z"})))
                .collect()]),
            distances: distances.map(|d| vec![d]),
        }
    }

    // =========================================================================
    // similarity
    // =========================================================================

    #[test]
    fn test_similarity_is_clamped() {
        let cases = [(-1.0, 1.0), (0.0, 1.0), (0.3, 0.7), (1.0, 0.0), (1.7, 0.0)];
        for (distance, expected) in cases {
            let score = *similarity_from_distance(Some(distance)).value();
            assert!((0.0..=1.0).contains(&score), "distance {} gave {}", distance, score);
            assert!((score - expected).abs() < 1e-6, "distance {} gave {}", distance, score);
        }
    }

    #[test]
    fn test_similarity_missing_or_nan_is_zero() {
        let missing = similarity_from_distance(None);
        assert_eq!(*missing.value(), 0.0);
        assert!(missing.is_degraded());

        for d in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let parsed = similarity_from_distance(Some(d));
            assert_eq!(*parsed.value(), 0.0);
            assert!(parsed.is_degraded());
        }
    }

    // =========================================================================
    // snippets
    // =========================================================================

    #[test]
    fn test_snippet_truncated_at_300_chars() {
        let content = "a".repeat(350);
        let snippet = truncate_snippet(&content, 300);
        assert_eq!(snippet.chars().count(), 303);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn test_snippet_exactly_300_chars_unchanged() {
        let content = "b".repeat(300);
        assert_eq!(truncate_snippet(&content, 300), content);
    }

    #[test]
    fn test_snippet_counts_chars_not_bytes() {
        let content = "é".repeat(301);
        let snippet = truncate_snippet(&content, 300);
        assert_eq!(snippet.chars().count(), 303);
        assert!(snippet.starts_with("éé"));
    }

    // =========================================================================
    // dates
    // =========================================================================

    #[test]
    fn test_parse_created_at_accepts_z_suffix() {
        let parsed = parse_created_at(Some(&json!("2024-01-15T09:30:00Z")));
        assert!(!parsed.is_degraded());
        assert_eq!(parsed.value().to_string(), "2024-01-15 09:30");
    }

    #[test]
    fn test_parse_created_at_accepts_offset_and_naive() {
        let offset = parse_created_at(Some(&json!("2024-01-15T09:30:00+02:00")));
        assert_eq!(offset.value().to_string(), "2024-01-15 09:30");

        let naive = parse_created_at(Some(&json!("2024-01-15T09:30:00.123456")));
        assert!(!naive.is_degraded());
        assert!(naive.value().as_timestamp().is_some());
    }

    #[test]
    fn test_parse_created_at_accepts_minutes_without_seconds() {
        for raw in ["2024-01-15T09:30", "2024-01-15 09:30"] {
            let parsed = parse_created_at(Some(&json!(raw)));
            assert!(!parsed.is_degraded(), "{}", raw);
            assert_eq!(parsed.value().to_string(), "2024-01-15 09:30");
        }

        let offset = parse_created_at(Some(&json!("2024-01-15T09:30+02:00")));
        assert!(!offset.is_degraded());
        assert_eq!(
            offset.value().as_timestamp().map(|ts| ts.timestamp()),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 7, 30, 0).unwrap().timestamp())
        );
    }

    #[test]
    fn test_parse_created_at_date_only_is_utc_midnight() {
        let parsed = parse_created_at(Some(&json!("2024-01-15")));
        assert!(!parsed.is_degraded());
        assert_eq!(parsed.value().to_string(), "2024-01-15 00:00");
    }

    #[test]
    fn test_parse_created_at_keeps_raw_on_failure() {
        let parsed = parse_created_at(Some(&json!("sometime in spring")));
        assert!(parsed.is_degraded());
        assert_eq!(
            parsed.into_value(),
            CreatedAt::Raw("sometime in spring".to_string())
        );
    }

    #[test]
    fn test_parse_created_at_missing_is_unknown() {
        assert_eq!(parse_created_at(None).into_value(), CreatedAt::unknown());
        assert_eq!(
            parse_created_at(Some(&JsonValue::Null)).into_value(),
            CreatedAt::unknown()
        );
    }

    #[test]
    fn test_parse_created_at_unix_seconds() {
        let parsed = parse_created_at(Some(&json!(0)));
        assert_eq!(parsed.value().to_string(), "1970-01-01 00:00");
    }

    // =========================================================================
    // assemble
    // =========================================================================

    #[test]
    fn test_assemble_keeps_index_order() {
        let hits = hits(&["b", "a", "c"], Some(vec![0.5, 0.1, 0.9]));
        let contexts = ContextAssembler::default().assemble("q", &hits, 5);
        let ids: Vec<&str> = contexts.iter().map(|c| c.note_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert!((contexts[0].similarity_score - 0.5).abs() < 1e-6);
        assert_eq!(contexts[1].title, "Title a");
    }

    #[test]
    fn test_assemble_respects_limit() {
        let hits = hits(&["a", "b", "c"], Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(ContextAssembler::default().assemble("q", &hits, 2).len(), 2);
    }

    #[test]
    fn test_assemble_missing_fields_degrade() {
        let hits = QueryHits {
            ids: vec![vec!["x".to_string(), "y".to_string()]],
            documents: None,
            metadatas: Some(vec![vec![None, metadata(json!({"title": 7}))]]),
            distances: None,
        };
        let contexts = ContextAssembler::default().assemble("q", &hits, 5);
        assert_eq!(contexts.len(), 2);
        for context in &contexts {
            assert_eq!(context.title, "Untitled Entry");
            assert_eq!(context.content_snippet, "");
            assert_eq!(context.similarity_score, 0.0);
            assert_eq!(context.created_at, CreatedAt::unknown());
        }
    }

    #[test]
    fn test_assemble_no_batches_or_empty_batch() {
        let assembler = ContextAssembler::default();
        assert!(assembler.assemble("q", &QueryHits::empty(), 5).is_empty());
        assert!(assembler.assemble("q", &hits(&[], None), 5).is_empty());
    }

    // =========================================================================
    // rendering
    // =========================================================================

    #[test]
    fn test_render_context_block() {
        let contexts = ContextAssembler::default().assemble("q", &hits(&["a"], Some(vec![0.2])), 5);
        let block = render_context_block(&contexts);
        assert_eq!(
            block,
            "Here are the relevant journal entries that should be used to answer the query:\n\n\
             Entry 1: Title a (Created: 2024-02-03 04:05)\nContent: doc a\n\n\
             \nYou MUST use the above information to directly answer the user's query. Do not ask for more information or context."
        );
    }

    #[test]
    fn test_render_context_block_empty() {
        assert_eq!(render_context_block(&[]), "No relevant journal entries found.");
    }

    #[test]
    fn test_render_tool_result_variants() {
        assert_eq!(
            render_tool_result(&Retrieval::EmptyCorpus),
            "You don't have any journal entries yet. Try adding some entries first!"
        );
        assert_eq!(
            render_tool_result(&Retrieval::NoMatches),
            "No relevant journal entries found."
        );

        let contexts = ContextAssembler::default().assemble("q", &hits(&["a", "b"], None), 5);
        let text = render_tool_result(&Retrieval::Found(contexts));
        assert!(text.starts_with("Here are the relevant journal entries I found:\n\n"));
        assert!(text.contains("Entry 2: Title b (Created: 2024-02-03 04:05)\nContent: doc b\n\n"));
    }
}
