//! Generation provider trait for abstracting text-generation backends
//!
//! The orchestration core treats the generation service as an opaque
//! awaitable collaborator: it must not care whether the backend is a remote
//! HTTP API or an in-process stub, only that it returns text plus zero or
//! more requested tool calls.

use async_trait::async_trait;

use crate::core::{Message, Result, ToolCall, ToolSpec};

/// Response from a generation provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Text content of the response
    pub content: String,
    /// Any tool invocations the model requests before finishing
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

impl LLMResponse {
    /// A plain text response with no tool calls
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: None,
            model: String::new(),
        }
    }

    /// A response requesting the given tool calls
    pub fn tool_requests(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
            usage: None,
            model: String::new(),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Options for generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    /// Options with just a temperature set
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }
}

/// Callback function for streaming tokens
pub type StreamCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Trait for generation providers.
///
/// Providers must surface rate-limit and other transient failures as
/// `EnsembleError::Generation { transient: true, .. }` so an outer retry
/// boundary can distinguish them; the orchestration core itself never
/// retries.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response, offering the given tool specs to the model
    async fn generate(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSpec],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    /// Generate a streaming response with a callback for each token.
    ///
    /// Backends without streaming support fall back to a single callback
    /// with the whole response.
    async fn generate_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
        on_token: StreamCallback,
    ) -> Result<LLMResponse> {
        let response = self.generate(model, messages, &[], options).await?;
        on_token(&response.content);
        Ok(response)
    }

    /// Get the provider name
    fn name(&self) -> &str;
}
