//! OpenAI-compatible inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use journal_core::{
    ChatBackend, ChatCompletion, ChatInvocation, EmbeddingBackend, Error, FunctionAttr,
    FunctionPayload, InferenceBackend, PromptInput, PromptMessage, RawToolCall, Result,
    ToolCallObject, ToolDefinition, Vector,
};

use super::error::{to_journal_error, OpenAIErrorCode};
use super::types::*;

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = "gpt-3.5-turbo";

/// Default embedding dimension for text-embedding-3-small.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Default timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for embeddings.
    pub embed_model: String,
    /// Model to use for generation.
    pub gen_model: String,
    /// Expected embedding dimension.
    pub embed_dimension: usize,
    /// Sampling temperature for chat calls.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            embed_dimension: DEFAULT_DIMENSION,
            temperature: journal_core::defaults::GEN_TEMPERATURE,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// OpenAI-compatible inference backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing OpenAI backend: url={}, embed={}, gen={}",
            config.base_url, config.embed_model, config.gen_model
        );

        Ok(Self { client, config })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OpenAIConfig::default())
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = OpenAIConfig {
            base_url: std::env::var("JOURNAL_OPENAI_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_URL.to_string()),
            api_key: std::env::var("JOURNAL_OPENAI_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
            embed_model: std::env::var("JOURNAL_OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string()),
            gen_model: std::env::var("JOURNAL_OPENAI_GENERATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string()),
            embed_dimension: std::env::var("JOURNAL_OPENAI_EMBED_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DIMENSION),
            timeout_seconds: std::env::var("JOURNAL_OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ..Default::default()
        };

        Self::new(config)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    /// Build a GET request with authentication.
    fn build_get_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.get(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req
    }

    fn build_chat_request(&self, invocation: &ChatInvocation) -> ChatCompletionRequest {
        let messages = match &invocation.input {
            PromptInput::Prompt(prompt) => vec![ChatMessage::new("user", prompt)],
            PromptInput::Messages(messages) => messages.iter().map(to_wire_message).collect(),
        };

        ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            tools: invocation.tools.iter().map(to_tool_spec).collect(),
            stream: false,
        }
    }

    /// Read an error body and map it onto the journal error taxonomy.
    async fn error_from_response(
        response: reqwest::Response,
        fallback: fn(String) -> Error,
    ) -> Error {
        let status = response.status();
        let body: OpenAIErrorResponse = response
            .json()
            .await
            .unwrap_or_else(|_| OpenAIErrorResponse::unknown());
        let code = OpenAIErrorCode::from_response(status.as_u16(), &body.error.error_type);
        to_journal_error(
            code,
            &format!("OpenAI returned {}: {}", status, body.error.message),
            fallback,
        )
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

fn to_tool_spec(tool: &ToolDefinition) -> ToolSpec {
    ToolSpec {
        tool_type: "function".to_string(),
        function: FunctionSpec {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

fn to_wire_message(message: &PromptMessage) -> ChatMessage {
    match message {
        PromptMessage::System { content } => ChatMessage::new("system", content),
        PromptMessage::Human { content } => ChatMessage::new("user", content),
        PromptMessage::Assistant {
            content,
            tool_calls,
        } => {
            let calls: Vec<ToolCall> = tool_calls
                .iter()
                .enumerate()
                .filter_map(|(idx, raw)| echo_tool_call(raw, idx))
                .collect();
            ChatMessage {
                role: "assistant".to_string(),
                content: if content.is_empty() && !calls.is_empty() {
                    None
                } else {
                    Some(content.clone())
                },
                tool_calls: if calls.is_empty() { None } else { Some(calls) },
                tool_call_id: None,
            }
        }
        PromptMessage::Tool {
            content, call_id, ..
        } => ChatMessage {
            tool_call_id: Some(call_id.clone().unwrap_or_else(|| "call_0".to_string())),
            ..ChatMessage::new("tool", content)
        },
    }
}

/// Rebuild the wire form of a tool call so it can be echoed in the
/// follow-up request. Calls without a resolvable name are dropped.
fn echo_tool_call(raw: &RawToolCall, index: usize) -> Option<ToolCall> {
    let (name, arguments) = match raw {
        RawToolCall::Object(obj) => match &obj.function {
            Some(FunctionPayload::Object(attr)) => (attr.name.clone(), attr.arguments.clone()),
            Some(FunctionPayload::Mapping(value)) => mapping_parts(value),
            None => (obj.name.clone(), obj.args.clone()),
        },
        RawToolCall::Mapping(value) => match value.get("function") {
            Some(function) => mapping_parts(function),
            None => (
                value.get("name").and_then(JsonValue::as_str).map(str::to_string),
                value.get("args").or_else(|| value.get("arguments")).cloned(),
            ),
        },
    };

    let name = name.filter(|n| !n.is_empty())?;
    let arguments = match arguments {
        Some(JsonValue::String(s)) => s,
        Some(other) => other.to_string(),
        None => "{}".to_string(),
    };

    Some(ToolCall {
        id: raw.resolved_call_id(index),
        call_type: "function".to_string(),
        function: FunctionCall { name, arguments },
    })
}

fn mapping_parts(value: &JsonValue) -> (Option<String>, Option<JsonValue>) {
    (
        value.get("name").and_then(JsonValue::as_str).map(str::to_string),
        value.get("arguments").cloned(),
    )
}

/// Typed tool call from the API, kept as an attribute object.
fn to_raw_tool_call(call: ToolCall) -> RawToolCall {
    RawToolCall::Object(ToolCallObject {
        id: Some(call.id),
        name: None,
        args: None,
        function: Some(FunctionPayload::Object(FunctionAttr {
            name: Some(call.function.name),
            arguments: Some(JsonValue::String(call.function.arguments)),
        })),
    })
}

// =============================================================================
// TRAIT IMPLEMENTATIONS
// =============================================================================

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "openai", op = "embed_texts", model = %self.config.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
            encoding_format: Some("float".to_string()),
        };

        let response = self
            .build_request("/embeddings")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, Error::Embedding).await);
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        // Sort by index to ensure correct ordering
        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        let vectors: Vec<Vector> = data.into_iter().map(|d| d.embedding).collect();

        debug!(result_count = vectors.len(), "Embedding complete");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl ChatBackend for OpenAIBackend {
    #[instrument(skip(self, invocation), fields(subsystem = "inference", component = "openai", op = "chat", model = %self.config.gen_model, prompt_len = invocation.input.len(), tool_count = invocation.tools.len()))]
    async fn chat(&self, invocation: ChatInvocation) -> Result<ChatCompletion> {
        let start = Instant::now();
        let request = self.build_chat_request(&invocation);

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, Error::Inference).await);
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let message = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| Error::Inference("OpenAI returned no choices".to_string()))?;

        let tool_calls: Vec<RawToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(to_raw_tool_call)
            .collect();
        let text = message.content.unwrap_or_default();

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = text.len(),
            tool_call_count = tool_calls.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(duration_ms = elapsed, slow = true, "Slow generation operation");
        }

        Ok(ChatCompletion::text(text).with_tool_calls(tool_calls))
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OpenAIBackend {
    async fn health_check(&self) -> Result<bool> {
        // For OpenAI-compatible APIs, we try a minimal models list request
        let response = self
            .build_get_request("/models")
            .timeout(Duration::from_secs(
                journal_core::defaults::HEALTH_TIMEOUT_SECS,
            ))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("OpenAI health check passed");
                    Ok(true)
                } else {
                    warn!("OpenAI health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("OpenAI health check error: {}", e);
                Ok(false)
            }
        }
    }
}
