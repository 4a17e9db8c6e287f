//! Conversation history rendering.

use journal_core::{ChatMessage, PromptMessage, Role};

/// Rendered in place of an empty transcript.
pub const NO_HISTORY: &str = "No prior chat history.";

/// Role-tagged prompt messages, one per history entry.
pub fn to_messages(history: &[ChatMessage]) -> Vec<PromptMessage> {
    history
        .iter()
        .map(|message| match message.role() {
            Role::User => PromptMessage::human(message.content()),
            Role::Assistant => PromptMessage::assistant(message.content()),
            Role::System => PromptMessage::system(message.content()),
        })
        .collect()
}

/// Flattened transcript, one `"{Role}: {content}\n"` line per message.
pub fn to_text(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return NO_HISTORY.to_string();
    }
    history
        .iter()
        .map(|message| format!("{}: {}\n", message.role().label(), message.content()))
        .collect()
}
