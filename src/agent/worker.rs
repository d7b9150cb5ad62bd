//! Worker agents
//!
//! The leaf unit of an orchestration tree: one agent wraps one generation
//! call plus the tools it is permitted to invoke. Constructed once at
//! definition time and reused across runs and loop iterations.

use std::sync::Arc;

use serde_json::Value;

use crate::agent::template;
use crate::agent::turn::{Observation, TurnState};
use crate::core::{EnsembleError, Message, Result};
use crate::llm::{GenerateOptions, LLMProvider};
use crate::state::{StateStore, WriteMode};
use crate::tools::ToolRegistry;

/// Outcome of one agent invocation
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final text produced by the agent (empty if the run was cut short
    /// by the early-exit signal)
    pub text: String,
    /// Whether a dispatched tool raised the early-exit signal
    pub exit: bool,
}

/// A leaf agent in an orchestration tree
#[derive(Clone)]
pub struct Agent {
    /// Name, unique among its composite's direct children
    name: String,
    /// Instruction template, resolved against state before each invocation
    instruction: String,
    /// State key the final text is written to
    output_key: Option<String>,
    /// How the final text is written
    output_mode: WriteMode,
    /// Which tool names this agent may use (empty = all registered)
    allowed_tools: Vec<String>,
    /// Generation provider
    llm: Arc<dyn LLMProvider>,
    /// Model to use
    model: String,
    /// Tool registry
    tools: Arc<ToolRegistry>,
    /// Sampling temperature
    temperature: Option<f32>,
    /// Hard cap on the tool-dispatch loop
    max_turns: usize,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("instruction", &self.instruction)
            .field("output_key", &self.output_key)
            .field("output_mode", &self.output_mode)
            .field("allowed_tools", &self.allowed_tools)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_turns", &self.max_turns)
            .finish_non_exhaustive()
    }
}

/// Builder for creating agents
pub struct AgentBuilder {
    name: String,
    instruction: String,
    output_key: Option<String>,
    output_mode: WriteMode,
    allowed_tools: Vec<String>,
    llm: Option<Arc<dyn LLMProvider>>,
    model: Option<String>,
    tools: Option<Arc<ToolRegistry>>,
    temperature: Option<f32>,
    max_turns: usize,
}

impl AgentBuilder {
    /// Create a new builder with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: String::new(),
            output_key: None,
            output_mode: WriteMode::Set,
            allowed_tools: Vec::new(),
            llm: None,
            model: None,
            tools: None,
            temperature: None,
            max_turns: 10,
        }
    }

    /// Set the instruction template
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Write the final text to this key, overwriting any prior value
    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self.output_mode = WriteMode::Set;
        self
    }

    /// Append the final text under this key instead of overwriting
    pub fn append_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self.output_mode = WriteMode::Append;
        self
    }

    /// Set allowed tools (empty = all registered tools)
    pub fn allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = tools;
        self
    }

    /// Set the generation provider
    pub fn llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Set the model to use
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the tool registry
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the dispatch-loop turn cap
    pub fn max_turns(mut self, max: usize) -> Self {
        self.max_turns = max;
        self
    }

    /// Build the agent
    pub fn build(self) -> Result<Agent> {
        let llm = self
            .llm
            .ok_or_else(|| EnsembleError::config("agent requires a generation provider"))?;

        Ok(Agent {
            name: self.name,
            instruction: self.instruction,
            output_key: self.output_key,
            output_mode: self.output_mode,
            allowed_tools: self.allowed_tools,
            llm,
            model: self
                .model
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            tools: self.tools.unwrap_or_else(|| Arc::new(ToolRegistry::new())),
            temperature: self.temperature,
            max_turns: self.max_turns,
        })
    }
}

impl Agent {
    /// Create a builder
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// Get the name of this agent
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the agent against the shared state.
    ///
    /// Resolves the instruction template, then drives the tool-dispatch
    /// loop: each turn offers the permitted tools to the model, executes
    /// whatever it requests, and feeds the observations back until the
    /// model produces a final text response. The loop is hard-capped at
    /// `max_turns`; exceeding the cap without a final response is fatal.
    pub async fn run(&self, state: &StateStore) -> Result<AgentOutcome> {
        let instruction = template::resolve(&self.instruction, state);

        let specs = if self.allowed_tools.is_empty() {
            self.tools.specs()
        } else {
            self.tools.specs_for(&self.allowed_tools)
        };

        let mut turn = TurnState::new(self.max_turns);

        while turn.should_continue() {
            let content = if turn.observations.is_empty() {
                instruction.clone()
            } else {
                format!("{}{}", instruction, turn.format_observations())
            };
            let messages = vec![Message::user(content)];

            let response = self
                .llm
                .generate(
                    &self.model,
                    &messages,
                    &specs,
                    self.temperature.map(GenerateOptions::with_temperature),
                )
                .await?;

            if response.tool_calls.is_empty() {
                // No tool calls = final answer
                let text = response.content;
                self.write_output(state, &text);
                return Ok(AgentOutcome { text, exit: false });
            }

            for call in &response.tool_calls {
                let result = self.tools.execute(state, call).await;
                let exit = result.exit;
                turn.record(Observation::from(result));

                if exit {
                    // Signal propagates immediately; the turn's remaining
                    // tool calls are not executed.
                    return Ok(AgentOutcome {
                        text: String::new(),
                        exit: true,
                    });
                }
            }

            turn.next_turn();
        }

        Err(EnsembleError::TurnLimitExceeded {
            agent: self.name.clone(),
            limit: self.max_turns,
        })
    }

    fn write_output(&self, state: &StateStore, text: &str) {
        if let Some(ref key) = self.output_key {
            let value = Value::String(text.to_string());
            match self.output_mode {
                WriteMode::Set => state.set(key, value),
                WriteMode::Append => state.append(key, value),
            }
        }
    }
}
