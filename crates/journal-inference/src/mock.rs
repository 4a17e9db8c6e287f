//! Mock inference backend for deterministic testing.
//!
//! Provides a scripted implementation of the inference traits: embeddings are
//! derived from the words of the input text, and chat replies are popped from
//! a queue so tests can drive the chat engine through every branch.
//!
//! ## Usage
//!
//! ```rust
//! use journal_inference::mock::{MockInferenceBackend, MockReply};
//!
//! let backend = MockInferenceBackend::new()
//!     .with_dimension(64)
//!     .with_reply(MockReply::text("First answer"))
//!     .with_reply(MockReply::failure("model offline"));
//! assert_eq!(backend.chat_call_count(), 0);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use journal_core::{
    ChatBackend, ChatCompletion, ChatInvocation, EmbeddingBackend, Error, InferenceBackend,
    RawToolCall, Result, Vector,
};

/// One scripted chat outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    Completion(ChatCompletion),
    Failure(String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Completion(ChatCompletion::text(text))
    }

    pub fn tool_calls(calls: Vec<RawToolCall>) -> Self {
        Self::Completion(ChatCompletion::default().with_tool_calls(calls))
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }
}

/// A recorded backend call.
#[derive(Debug, Clone)]
pub enum MockCall {
    Embed(Vec<String>),
    Chat(ChatInvocation),
}

#[derive(Debug)]
struct MockState {
    replies: VecDeque<MockReply>,
    calls: Vec<MockCall>,
}

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    dimension: usize,
    default_response: String,
    fail_embeddings: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            dimension: 64,
            default_response: "Mock response".to_string(),
            fail_embeddings: false,
            state: Arc::new(Mutex::new(MockState {
                replies: VecDeque::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Text returned once the scripted replies run out.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Queue a reply for the next chat call.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.lock().replies.push_back(reply);
        self
    }

    /// Make every embedding call fail.
    pub fn with_failing_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Chat invocations received so far.
    pub fn chat_calls(&self) -> Vec<ChatInvocation> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Chat(invocation) => Some(invocation.clone()),
                MockCall::Embed(_) => None,
            })
            .collect()
    }

    /// Get number of chat calls.
    pub fn chat_call_count(&self) -> usize {
        self.chat_calls().len()
    }

    /// Get number of embed calls.
    pub fn embed_call_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::Embed(_)))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.lock().calls.push(MockCall::Embed(texts.to_vec()));
        if self.fail_embeddings {
            return Err(Error::Embedding("Simulated failure for testing".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| MockEmbeddingGenerator::generate(t, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl ChatBackend for MockInferenceBackend {
    async fn chat(&self, invocation: ChatInvocation) -> Result<ChatCompletion> {
        let reply = {
            let mut state = self.lock();
            state.calls.push(MockCall::Chat(invocation));
            state.replies.pop_front()
        };
        match reply {
            Some(MockReply::Completion(completion)) => Ok(completion),
            Some(MockReply::Failure(message)) => Err(Error::Inference(message)),
            None => Ok(ChatCompletion::text(self.default_response.clone())),
        }
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Mock embedding generator with deterministic output.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Generate a deterministic embedding from text.
    ///
    /// Each lower-cased word is hashed into a bucket, so texts sharing words
    /// have a high cosine similarity and the same text always produces the
    /// same vector.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension.max(1)];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
                });
            let idx = (hash % vec.len() as u64) as usize;
            vec[idx] += 1.0;
        }

        Self::normalize(&mut vec);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}
