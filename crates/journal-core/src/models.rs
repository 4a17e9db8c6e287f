//! Core data models for the journal assistant.
//!
//! These types are shared across all journal crates and represent the
//! conversational domain: notes read from the record store, chat messages
//! exchanged with the user, and the grounding context handed to the model.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// NOTE TYPES
// =============================================================================

/// A persisted journal entry. Read-only for the chat engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Opaque identifier assigned by the record store.
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Text submitted to the similarity index for this note.
    pub fn document_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.content)
    }
}

// =============================================================================
// CHAT MESSAGE TYPES
// =============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Capitalized label used in flattened transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(Error::InvalidInput(format!(
                "Role must be one of user, assistant, system (got {:?})",
                s
            ))),
        }
    }
}

/// One turn of conversation history.
///
/// Content is guaranteed non-blank. Construction (including deserialization)
/// goes through [`ChatMessage::new`] or [`ChatMessage::with_timestamp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChatMessage")]
pub struct ChatMessage {
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawChatMessage {
    role: String,
    content: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<RawChatMessage> for ChatMessage {
    type Error = Error;

    fn try_from(raw: RawChatMessage) -> Result<Self> {
        let role = raw.role.parse::<Role>()?;
        ChatMessage::with_timestamp(role, raw.content, raw.timestamp.unwrap_or_else(Utc::now))
    }
}

impl ChatMessage {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self> {
        Self::with_timestamp(role, content, Utc::now())
    }

    pub fn with_timestamp(
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Message content cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            role,
            content,
            timestamp,
        })
    }

    pub fn user(content: impl Into<String>) -> Result<Self> {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self> {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Result<Self> {
        Self::new(Role::System, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

// =============================================================================
// RETRIEVAL TYPES
// =============================================================================

/// Creation date of a retrieved entry.
///
/// Index metadata is loosely typed, so an unparseable date is carried through
/// as the original string instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    Timestamp(DateTime<FixedOffset>),
    Raw(String),
}

impl CreatedAt {
    /// Placeholder for hits without any date metadata.
    pub fn unknown() -> Self {
        Self::Raw(defaults::UNKNOWN_DATE.to_string())
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            Self::Raw(_) => None,
        }
    }
}

impl From<DateTime<Utc>> for CreatedAt {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts.fixed_offset())
    }
}

impl std::fmt::Display for CreatedAt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp(ts) => write!(f, "{}", ts.format(defaults::DATE_DISPLAY_FORMAT)),
            Self::Raw(raw) => write!(f, "{}", raw),
        }
    }
}

/// A note fragment selected by similarity search to ground a model answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    #[serde(rename = "entry_id")]
    pub note_id: String,
    pub title: String,
    /// At most 300 characters of content, plus "..." when truncated.
    pub content_snippet: String,
    /// Always within [0, 1].
    pub similarity_score: f32,
    pub created_at: CreatedAt,
}

// =============================================================================
// TOOL INVOCATION TYPES
// =============================================================================

/// Normalized request by the model to invoke a named tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub tool_name: String,
    pub arguments: Map<String, JsonValue>,
}

impl ToolInvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, JsonValue>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Retrieval request carrying a single `query` argument.
    pub fn retrieval(query: impl Into<String>) -> Self {
        let mut arguments = Map::new();
        arguments.insert(
            defaults::QUERY_ARGUMENT.to_string(),
            JsonValue::String(query.into()),
        );
        Self::new(defaults::RETRIEVE_TOOL_NAME, arguments)
    }

    pub fn is_retrieval(&self) -> bool {
        self.tool_name == defaults::RETRIEVE_TOOL_NAME
    }

    /// The `query` argument, when present as a string.
    pub fn query(&self) -> Option<&str> {
        self.arguments
            .get(defaults::QUERY_ARGUMENT)
            .and_then(JsonValue::as_str)
    }
}

// =============================================================================
// RESPONSE TYPES
// =============================================================================

/// Result of one conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub retrieved_contexts: Vec<RetrievedContext>,
    pub timestamp: DateTime<Utc>,
}

impl ChatResponse {
    pub fn new(response: impl Into<String>, retrieved_contexts: Vec<RetrievedContext>) -> Self {
        Self {
            response: response.into(),
            retrieved_contexts,
            timestamp: Utc::now(),
        }
    }

    /// Response that carries no grounding context.
    pub fn text(response: impl Into<String>) -> Self {
        Self::new(response, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // =========================================================================
    // Role
    // =========================================================================

    #[test]
    fn test_role_roundtrip_via_str() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_rejects_unknown() {
        let err = "moderator".parse::<Role>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_role_label_is_capitalized() {
        assert_eq!(Role::User.label(), "User");
        assert_eq!(Role::Assistant.label(), "Assistant");
        assert_eq!(Role::System.label(), "System");
    }

    // =========================================================================
    // ChatMessage
    // =========================================================================

    #[test]
    fn test_chat_message_rejects_blank_content() {
        assert!(ChatMessage::user("").is_err());
        assert!(ChatMessage::user("   \n\t").is_err());
    }

    #[test]
    fn test_chat_message_keeps_content_verbatim() {
        let msg = ChatMessage::user("  hello  ").unwrap();
        assert_eq!(msg.content(), "  hello  ");
        assert_eq!(msg.role(), Role::User);
    }

    #[test]
    fn test_chat_message_deserialize_validates() {
        let ok: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(ok.role(), Role::Assistant);

        let bad_role = serde_json::from_str::<ChatMessage>(r#"{"role":"bot","content":"hi"}"#);
        assert!(bad_role.is_err());

        let blank = serde_json::from_str::<ChatMessage>(r#"{"role":"user","content":"  "}"#);
        assert!(blank.is_err());
    }

    #[test]
    fn test_chat_message_deserialize_keeps_timestamp() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"role":"user","content":"hi","timestamp":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            msg.timestamp(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
    }

    // =========================================================================
    // CreatedAt
    // =========================================================================

    #[test]
    fn test_created_at_display_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 45).unwrap();
        assert_eq!(CreatedAt::from(ts).to_string(), "2024-01-15 09:30");
    }

    #[test]
    fn test_created_at_display_raw() {
        assert_eq!(CreatedAt::unknown().to_string(), "Unknown date");
        assert_eq!(
            CreatedAt::Raw("last tuesday".to_string()).to_string(),
            "last tuesday"
        );
    }

    // =========================================================================
    // ToolInvocationRequest
    // =========================================================================

    #[test]
    fn test_retrieval_request_carries_query() {
        let req = ToolInvocationRequest::retrieval("sleep habits");
        assert!(req.is_retrieval());
        assert_eq!(req.query(), Some("sleep habits"));
    }

    #[test]
    fn test_query_ignores_non_string_argument() {
        let mut args = Map::new();
        args.insert("query".to_string(), JsonValue::from(42));
        let req = ToolInvocationRequest::new("retrieve_entries", args);
        assert_eq!(req.query(), None);
    }

    // =========================================================================
    // Note / ChatResponse
    // =========================================================================

    #[test]
    fn test_note_document_text() {
        let now = Utc::now();
        let note = Note {
            id: "n1".to_string(),
            title: "Morning".to_string(),
            content: "Went running.".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(note.document_text(), "Morning\n\nWent running.");
    }

    #[test]
    fn test_chat_response_serializes_entry_id() {
        let resp = ChatResponse::new(
            "ok",
            vec![RetrievedContext {
                note_id: "abc".to_string(),
                title: "T".to_string(),
                content_snippet: "S".to_string(),
                similarity_score: 0.5,
                created_at: CreatedAt::unknown(),
            }],
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["retrieved_contexts"][0]["entry_id"], "abc");
        assert_eq!(json["retrieved_contexts"][0]["created_at"], "Unknown date");
    }
}
