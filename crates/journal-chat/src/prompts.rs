//! Prompt text and canned responses.

use serde_json::json;

use journal_core::defaults::{DATE_DISPLAY_FORMAT, QUERY_ARGUMENT, RETRIEVE_TOOL_NAME};
use journal_core::{Note, RetrievedContext, ToolDefinition};

/// System instructions for retrieval-augmented turns.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are an AI Journal Assistant that helps users analyze and reflect on their journal entries.
You have access to the user's journal entries and can reference specific entries when answering questions.
You will answer questions in the style of the user. 
You are functioning as a second brain for the user. 
The user should feel like they are talking to themselves.
Always be helpful, supportive, and insightful when discussing the user's journal entries.
When a user asks about their journal entries, you should analyze and provide insights based on the content.
IMPORTANT: You already have access to the relevant journal entries through context retrieval. DO NOT ask the user to provide information from their entries - use the information that has been retrieved for you.";

/// System instructions when every entry is inlined in the system prompt.
pub const FULL_CONTEXT_SYSTEM_MESSAGE: &str = "You are an AI Journal Assistant that helps users analyze and reflect on their journal entries.
You have access to the user's journal entries and can reference specific entries when answering questions (provided below in this system message).
You will answer questions in the style of the user. 
You are functioning as a second brain for the user. 
The user should feel like they are talking to themselves.
Always be helpful, supportive, and insightful when discussing the user's journal entries.
When a user asks about their journal entries, you should analyze and provide insights based on the content.
IMPORTANT: You already have access to the journal entries in this system message. DO NOT ask the user to provide information from their entries.
IMPORTANT: Do not explicitly tell the user that you were provided with their journal entries in the system prompt. Just use the information naturally.";

pub const EMPTY_CORPUS_RESPONSE: &str = "It looks like you don't have any journal entries yet. Try adding some entries first, and then I can help you analyze them!";

pub const GENERIC_APOLOGY: &str = "I'm sorry, I encountered an error while processing your message. Please try again or ask a different question.";

pub const FULL_CONTEXT_FAILURE_RESPONSE: &str = "I'm having trouble analyzing your journal entries right now. Could you try asking a different question?";

const NO_JOURNAL_ENTRIES: &str = "No journal entries available.";

/// Single prompt for the direct-answer path.
pub fn direct_prompt(history_text: &str, message: &str, context_block: &str) -> String {
    format!(
        "\nSystem: {DEFAULT_SYSTEM_MESSAGE}\n\nChat History:\n{history_text}\n\nUser Query: {message}\n\nRetrieved Journal Entries:\n{context_block}\n\nInstructions: Analyze the retrieved journal entries above and provide a direct, helpful response to the user query.\nDO NOT ask for additional information - you already have the relevant context.\n"
    )
}

/// Answer used when the direct-answer model call fails.
pub fn direct_answer_fallback(contexts: &[RetrievedContext]) -> String {
    let titles: Vec<&str> = contexts.iter().take(2).map(|c| c.title.as_str()).collect();
    format!(
        "Based on your journal entries, I can see that you have entries about {}. How can I help you analyze or reflect on these entries?",
        titles.join(", ")
    )
}

/// The `retrieve_entries(query)` tool offered on the tool-dispatch path.
pub fn retrieval_tool() -> ToolDefinition {
    ToolDefinition {
        name: RETRIEVE_TOOL_NAME.to_string(),
        description: "Retrieve relevant journal entries based on the provided query".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                QUERY_ARGUMENT: {
                    "type": "string",
                    "description": "The search query to find relevant journal entries"
                }
            },
            "required": [QUERY_ARGUMENT]
        }),
    }
}

/// Every note rendered for the full-context system prompt.
pub fn render_journal_entries(notes: &[Note]) -> String {
    if notes.is_empty() {
        return NO_JOURNAL_ENTRIES.to_string();
    }
    let mut out = String::from("--- JOURNAL ENTRIES ---\n\n");
    for (i, note) in notes.iter().enumerate() {
        out.push_str(&format!(
            "ENTRY {}: {} (Created: {})\nCONTENT: {}\n\n",
            i + 1,
            note.title,
            note.created_at.format(DATE_DISPLAY_FORMAT),
            note.content
        ));
    }
    out.push_str("--- END OF JOURNAL ENTRIES ---\n\n");
    out
}

pub fn full_context_system_prompt(history_text: &str, journal_context: &str) -> String {
    format!("{FULL_CONTEXT_SYSTEM_MESSAGE}\n\nChat History:\n{history_text}\n\n{journal_context}")
}
