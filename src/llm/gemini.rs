//! Gemini API client implementation
//!
//! Async HTTP client for the Gemini generateContent API with tool calling
//! and streaming support.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{Config, EnsembleError, Message, Result, ToolCall, ToolSpec};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage};

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    debug: bool,
}

/// Gemini generateContent request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDeclarations>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

/// A content block: one role plus its parts
#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// A single part: text or a function call
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

/// Function call requested by the model
#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Tool declarations block
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

/// One advertised function
#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Generation options in wire format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Gemini generateContent response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

/// A response candidate
#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

/// Token usage in wire format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GeminiClient {
    /// Create a new client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let base = config.api_base_url()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gemini.timeout_secs))
            .build()
            .map_err(EnsembleError::Http)?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key()?,
            debug: config.agent.debug,
        })
    }

    /// Create a client with a custom base URL (mainly for tests)
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(EnsembleError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            debug: false,
        })
    }

    /// Enable or disable debug output
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Convert internal messages to the wire format.
    ///
    /// System messages become the systemInstruction block; the API only
    /// accepts "user" and "model" roles in contents.
    fn to_request(
        messages: &[Message],
        tools: &[ToolSpec],
        options: Option<GenerateOptions>,
    ) -> GenerateRequest {
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();

        let system_instruction = if system_text.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part {
                    text: Some(system_text.join("\n")),
                    function_call: None,
                }],
            })
        };

        let contents = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| Content {
                role: Some(if m.role == "assistant" {
                    "model".to_string()
                } else {
                    "user".to_string()
                }),
                parts: vec![Part {
                    text: Some(m.content.clone()),
                    function_call: None,
                }],
            })
            .collect();

        let tool_block = if tools.is_empty() {
            None
        } else {
            Some(vec![ToolDeclarations {
                function_declarations: tools
                    .iter()
                    .map(|spec| FunctionDeclaration {
                        name: spec.name.clone(),
                        description: spec.description.clone(),
                        parameters: spec.parameters.clone(),
                    })
                    .collect(),
            }])
        };

        let generation_config = options.map(|opts| GenerationConfig {
            temperature: opts.temperature,
            max_output_tokens: opts.max_tokens,
        });

        GenerateRequest {
            contents,
            system_instruction,
            tools: tool_block,
            generation_config,
        }
    }

    /// Convert a wire response to an LLMResponse
    fn to_llm_response(response: GenerateResponse, model: &str) -> LLMResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        if let Some(candidate) = response.candidates.into_iter().next() {
            if let Some(body) = candidate.content {
                for part in body.parts {
                    if let Some(text) = part.text {
                        content.push_str(&text);
                    }
                    if let Some(call) = part.function_call {
                        tool_calls.push(ToolCall {
                            name: call.name,
                            arguments: call.args,
                        });
                    }
                }
            }
        }

        let usage = response.usage_metadata.map(|meta| TokenUsage {
            prompt_tokens: meta.prompt_token_count,
            completion_tokens: meta.candidates_token_count,
            total_tokens: meta.total_token_count,
        });

        LLMResponse {
            content,
            tool_calls,
            usage,
            model: response.model_version.unwrap_or_else(|| model.to_string()),
        }
    }

    /// Map an error status to the transient/fatal split the orchestration
    /// core relies on: 429 and 5xx are retryable at an outer boundary,
    /// everything else is fatal for the run.
    fn status_error(status: reqwest::StatusCode, body: String) -> EnsembleError {
        let transient = status.as_u16() == 429 || status.is_server_error();
        EnsembleError::generation(format!("Gemini API error ({}): {}", status, body), transient)
    }

    /// Debug print if enabled
    fn debug_print(&self, label: &str, content: &str) {
        if self.debug {
            let clipped = clip(content, 500);
            if clipped.len() < content.len() {
                eprintln!("DEBUG {}: {}...", label, clipped);
            } else {
                eprintln!("DEBUG {}: {}", label, content);
            }
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, model, method, self.api_key
        )
    }
}

/// Clip to at most `max` bytes without splitting a UTF-8 character
fn clip(content: &str, max: usize) -> &str {
    if content.len() <= max {
        return content;
    }
    let mut end = max;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

#[async_trait]
impl LLMProvider for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSpec],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = Self::to_request(messages, tools, options);

        let request_json = serde_json::to_string(&request)?;
        self.debug_print("Request", &request_json);

        let response = self
            .client
            .post(self.endpoint(model, "generateContent"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    EnsembleError::generation(format!("Gemini unreachable: {}", e), true)
                } else {
                    EnsembleError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_text));
        }

        let response_text = response.text().await?;
        self.debug_print("Response", &response_text);

        let wire: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| EnsembleError::generation(format!("Failed to parse response: {}", e), false))?;

        Ok(Self::to_llm_response(wire, model))
    }

    async fn generate_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
        on_token: StreamCallback,
    ) -> Result<LLMResponse> {
        let request = Self::to_request(messages, &[], options);

        let response = self
            .client
            .post(format!(
                "{}&alt=sse",
                self.endpoint(model, "streamGenerateContent")
            ))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    EnsembleError::generation(format!("Gemini unreachable: {}", e), true)
                } else {
                    EnsembleError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_text));
        }

        let mut full_content = String::new();
        let mut final_model = model.to_string();
        let mut usage = None;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result
                .map_err(|e| EnsembleError::generation(format!("Stream error: {}", e), true))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE frames: one "data: {json}" per line
            while let Some(newline_pos) = buffer.find('\n') {
                let line = buffer[..newline_pos].trim().to_string();
                buffer = buffer[newline_pos + 1..].to_string();

                let Some(payload) = line.strip_prefix("data:") else {
                    continue;
                };
                let payload = payload.trim();
                if payload.is_empty() || payload == "[DONE]" {
                    continue;
                }

                match serde_json::from_str::<GenerateResponse>(payload) {
                    Ok(wire) => {
                        let piece = Self::to_llm_response(wire, model);
                        if !piece.content.is_empty() {
                            full_content.push_str(&piece.content);
                            on_token(&piece.content);
                        }
                        if piece.usage.is_some() {
                            usage = piece.usage;
                        }
                        final_model = piece.model;
                    }
                    Err(e) => {
                        self.debug_print("Parse Error", &format!("{}: {}", e, payload));
                    }
                }
            }
        }

        Ok(LLMResponse {
            content: full_content,
            tool_calls: Vec::new(),
            usage,
            model: final_model,
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_messages_become_instruction() {
        let messages = vec![Message::system("You are concise."), Message::user("hi")];
        let request = GeminiClient::to_request(&messages, &[], None);

        assert!(request.system_instruction.is_some());
        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].role.as_deref(), Some("user"));
    }

    #[test]
    fn test_tool_specs_advertised() {
        let specs = vec![ToolSpec::new(
            "exit_loop",
            "Stop the enclosing loop",
            json!({"type": "object", "properties": {}}),
        )];
        let request = GeminiClient::to_request(&[Message::user("go")], &specs, None);

        let tools = request.tools.unwrap();
        assert_eq!(tools[0].function_declarations[0].name, "exit_loop");
    }

    #[test]
    fn test_response_parsing_with_function_call() {
        let wire: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "calling a tool"},
                        {"functionCall": {"name": "append_to_state", "args": {"key": "PLAN"}}}
                    ]
                }
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        }))
        .unwrap();

        let response = GeminiClient::to_llm_response(wire, "gemini-2.0-flash");
        assert_eq!(response.content, "calling a tool");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "append_to_state");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        // 3-byte characters: 500 bytes lands mid-character
        let long = "日".repeat(200);
        let clipped = clip(&long, 500);
        assert_eq!(clipped.len(), 498);
        assert!(long.starts_with(clipped));

        assert_eq!(clip("short", 500), "short");
    }

    #[test]
    fn test_status_error_transience() {
        let err = GeminiClient::status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(err.is_transient());

        let err = GeminiClient::status_error(reqwest::StatusCode::BAD_REQUEST, String::new());
        assert!(!err.is_transient());
    }
}
