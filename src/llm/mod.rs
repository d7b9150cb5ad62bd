//! LLM module - generation service integrations
//!
//! Provides the provider abstraction the orchestration core calls through,
//! with the Gemini API as the primary backend.

pub mod gemini;
pub mod traits;

pub use gemini::GeminiClient;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage};
