//! Ollama inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use journal_core::{
    ChatBackend, ChatCompletion, ChatInvocation, EmbeddingBackend, Error, InferenceBackend,
    PromptInput, PromptMessage, RawToolCall, Result, ToolDefinition, Vector,
};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = journal_core::defaults::OLLAMA_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = journal_core::defaults::EMBED_MODEL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = journal_core::defaults::GEN_MODEL;

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = journal_core::defaults::EMBED_DIMENSION;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = journal_core::defaults::EMBED_TIMEOUT_SECS;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = journal_core::defaults::GEN_TIMEOUT_SECS;

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    gen_model: String,
    dimension: usize,
    temperature: f32,
    embed_timeout_secs: u64,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
            DEFAULT_DIMENSION,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(
        base_url: String,
        embed_model: String,
        gen_model: String,
        dimension: usize,
    ) -> Self {
        let gen_timeout = std::env::var("JOURNAL_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GEN_TIMEOUT_SECS);

        let embed_timeout = std::env::var("JOURNAL_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(EMBED_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout))
            .build()
            .unwrap_or_default();

        info!(
            "Initializing Ollama backend: url={}, embed={}, gen={}",
            base_url, embed_model, gen_model
        );

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            embed_model,
            gen_model,
            dimension,
            temperature: journal_core::defaults::GEN_TEMPERATURE,
            embed_timeout_secs: embed_timeout,
            gen_timeout_secs: gen_timeout,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("JOURNAL_OLLAMA_URL")
            .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let embed_model = std::env::var("JOURNAL_OLLAMA_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let gen_model = std::env::var("JOURNAL_OLLAMA_GENERATION_MODEL")
            .unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let dimension = std::env::var("JOURNAL_OLLAMA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);

        Self::with_config(base_url, embed_model, gen_model, dimension)
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the `/api/chat` payload for an invocation.
    fn build_chat_request(&self, invocation: &ChatInvocation) -> OllamaChatRequest {
        let messages = match &invocation.input {
            PromptInput::Prompt(prompt) => vec![OllamaMessage::plain("user", prompt)],
            PromptInput::Messages(messages) => messages.iter().map(OllamaMessage::from).collect(),
        };

        OllamaChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
            tools: invocation.tools.iter().map(OllamaTool::from).collect(),
            options: Some(OllamaOptions {
                temperature: self.temperature,
            }),
        }
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Chat API message for `/api/chat`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    /// Tool calls are kept as raw JSON; Ollama returns `arguments` as an
    /// object, while some proxies send a string.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl OllamaMessage {
    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }
}

impl From<&PromptMessage> for OllamaMessage {
    fn from(message: &PromptMessage) -> Self {
        match message {
            PromptMessage::System { content } => Self::plain("system", content),
            PromptMessage::Human { content } => Self::plain("user", content),
            PromptMessage::Assistant {
                content,
                tool_calls,
            } => Self {
                tool_calls: tool_calls
                    .iter()
                    .filter_map(|call| serde_json::to_value(call).ok())
                    .collect(),
                ..Self::plain("assistant", content)
            },
            PromptMessage::Tool { name, content, .. } => Self {
                tool_name: Some(name.clone()),
                ..Self::plain("tool", content)
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: JsonValue,
}

impl From<&ToolDefinition> for OllamaTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            tool_type: "function",
            function: OllamaFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

// =============================================================================
// TRAIT IMPLEMENTATIONS
// =============================================================================

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.embed_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            result_count = result.embeddings.len(),
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > 5000 {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok(result.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    #[instrument(skip(self, invocation), fields(subsystem = "inference", component = "ollama", op = "chat", model = %self.gen_model, prompt_len = invocation.input.len(), tool_count = invocation.tools.len()))]
    async fn chat(&self, invocation: ChatInvocation) -> Result<ChatCompletion> {
        let start = Instant::now();
        let request = self.build_chat_request(&invocation);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let tool_calls: Vec<RawToolCall> = result
            .message
            .tool_calls
            .into_iter()
            .map(RawToolCall::Mapping)
            .collect();

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = result.message.content.len(),
            tool_call_count = tool_calls.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = invocation.input.len(),
                slow = true,
                "Slow generation operation"
            );
        }

        Ok(ChatCompletion::text(result.message.content).with_tool_calls(tool_calls))
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(
                journal_core::defaults::HEALTH_TIMEOUT_SECS,
            ))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::{ToolCallObject, FunctionAttr, FunctionPayload};
    use serde_json::json;

    // ==========================================================================
    // Constants Tests
    // ==========================================================================

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_OLLAMA_URL, "http://127.0.0.1:11434");
        assert_eq!(DEFAULT_EMBED_MODEL, "nomic-embed-text");
        assert_eq!(DEFAULT_DIMENSION, 768);
        assert_eq!(EMBED_TIMEOUT_SECS, 30);
        assert_eq!(GEN_TIMEOUT_SECS, 120);
    }

    #[test]
    fn test_with_config_trims_trailing_slash() {
        let backend = OllamaBackend::with_config(
            "http://localhost:11434/".to_string(),
            "embed".to_string(),
            "gen".to_string(),
            384,
        );
        assert_eq!(backend.base_url(), "http://localhost:11434");
        assert_eq!(EmbeddingBackend::model_name(&backend), "embed");
        assert_eq!(ChatBackend::model_name(&backend), "gen");
        assert_eq!(backend.dimension(), 384);
    }

    // ==========================================================================
    // Request Building Tests
    // ==========================================================================

    #[test]
    fn test_prompt_becomes_single_user_message() {
        let backend = OllamaBackend::new();
        let request = backend.build_chat_request(&ChatInvocation::prompt("hello"));

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[0].content, "hello");
        assert!(request.tools.is_empty());

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_message_roles_are_mapped() {
        let backend = OllamaBackend::new();
        let invocation = ChatInvocation::messages(vec![
            PromptMessage::system("sys"),
            PromptMessage::human("question"),
            PromptMessage::assistant("answer"),
            PromptMessage::Tool {
                name: "retrieve_entries".to_string(),
                content: "result".to_string(),
                call_id: None,
            },
        ]);

        let request = backend.build_chat_request(&invocation);
        let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);
        assert_eq!(
            request.messages[3].tool_name.as_deref(),
            Some("retrieve_entries")
        );
    }

    #[test]
    fn test_tools_are_serialized_as_functions() {
        let backend = OllamaBackend::new();
        let invocation = ChatInvocation::prompt("q").with_tools(vec![ToolDefinition {
            name: "retrieve_entries".to_string(),
            description: "Find entries".to_string(),
            parameters: json!({"type": "object"}),
        }]);

        let json = serde_json::to_value(backend.build_chat_request(&invocation)).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "retrieve_entries");
    }

    #[test]
    fn test_assistant_tool_calls_are_echoed() {
        let mapping = json!({"function": {"name": "retrieve_entries", "arguments": {"query": "x"}}});
        let message = PromptMessage::Assistant {
            content: String::new(),
            tool_calls: vec![
                RawToolCall::Mapping(mapping.clone()),
                RawToolCall::Object(ToolCallObject {
                    function: Some(FunctionPayload::Object(FunctionAttr {
                        name: Some("retrieve_entries".to_string()),
                        arguments: None,
                    })),
                    ..Default::default()
                }),
            ],
        };

        let wire = OllamaMessage::from(&message);
        assert_eq!(wire.tool_calls.len(), 2);
        assert_eq!(wire.tool_calls[0], mapping);
        assert_eq!(wire.tool_calls[1]["function"]["name"], "retrieve_entries");
    }

    // ==========================================================================
    // Response Parsing Tests
    // ==========================================================================

    #[test]
    fn test_response_without_tool_calls() {
        let resp: OllamaChatResponse = serde_json::from_str(
            r#"{"model":"m","message":{"role":"assistant","content":"Hi"},"done":true}"#,
        )
        .unwrap();
        assert_eq!(resp.message.content, "Hi");
        assert!(resp.message.tool_calls.is_empty());
    }

    #[test]
    fn test_response_with_tool_calls() {
        let resp: OllamaChatResponse = serde_json::from_str(
            r#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"retrieve_entries","arguments":{"query":"work"}}}]}}"#,
        )
        .unwrap();
        assert_eq!(resp.message.tool_calls.len(), 1);
        assert_eq!(
            resp.message.tool_calls[0]["function"]["arguments"]["query"],
            "work"
        );
    }
}
