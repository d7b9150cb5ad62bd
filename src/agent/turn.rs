//! Tool-dispatch turn state
//!
//! Tracks one agent invocation's dispatch loop: how many turns have run
//! against the hard cap, and the observations collected from tool
//! executions that are fed back to the model as context.

use crate::core::ToolResult;

/// State of an agent's tool-dispatch loop
#[derive(Debug, Clone)]
pub struct TurnState {
    /// Current turn number (0-indexed)
    pub turn: usize,
    /// Maximum allowed turns
    pub max_turns: usize,
    /// Observations collected from tool executions
    pub observations: Vec<Observation>,
}

impl TurnState {
    /// Create a new turn state with the given cap
    pub fn new(max_turns: usize) -> Self {
        Self {
            turn: 0,
            max_turns,
            observations: Vec::new(),
        }
    }

    /// Check if the dispatch loop may run another turn
    pub fn should_continue(&self) -> bool {
        self.turn < self.max_turns
    }

    /// Record an observation from a tool execution
    pub fn record(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Increment the turn counter
    pub fn next_turn(&mut self) {
        self.turn += 1;
    }

    /// Format observations for inclusion in the next prompt
    pub fn format_observations(&self) -> String {
        if self.observations.is_empty() {
            return String::new();
        }

        let mut output = String::from("\n\n## Tool Observations:\n");
        for (i, obs) in self.observations.iter().enumerate() {
            let status = if obs.success { "ok" } else { "FAILED" };
            output.push_str(&format!(
                "\n### Observation {} ({}, {})\n{}\n",
                i + 1,
                obs.tool_name,
                status,
                obs.output
            ));
        }
        output
    }
}

/// An observation from a tool execution
#[derive(Debug, Clone)]
pub struct Observation {
    /// Name of the tool that produced this observation
    pub tool_name: String,
    /// Whether the tool execution was successful
    pub success: bool,
    /// Output from the tool (error text on failure)
    pub output: String,
}

impl From<ToolResult> for Observation {
    fn from(result: ToolResult) -> Self {
        Self {
            tool_name: result.tool_name,
            success: result.success,
            output: result.output,
        }
    }
}
