//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering tools at orchestration-definition time and
//! routing the model's requested calls to implementations by name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{ToolCall, ToolResult, ToolSpec};
use crate::state::StateStore;
use crate::tools::builtin::{
    AppendToStateTool, ExitLoopTool, GenerateRecordIdTool, WriteDocumentTool,
};
use crate::tools::Tool;

/// Registry of available tools, keyed by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in tools registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ExitLoopTool));
        registry.register(Arc::new(AppendToStateTool));
        registry.register(Arc::new(GenerateRecordIdTool));
        registry.register(Arc::new(WriteDocumentTool));
        registry
    }

    /// Register a tool under its declared name. A later registration with
    /// the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.spec().name, tool);
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tool specs, sorted by name for stable advertisement
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Specs for the named subset of tools, in the given order. Unknown
    /// names are skipped.
    pub fn specs_for(&self, names: &[String]) -> Vec<ToolSpec> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name).map(|t| t.spec()))
            .collect()
    }

    /// Execute a tool call against the shared state.
    ///
    /// Never fails: unknown tools and invocation errors both become failed
    /// results the invoking agent feeds back to the model as observations.
    pub async fn execute(&self, state: &StateStore, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult::failure(&call.name, format!("Unknown tool: {}", call.name));
        };

        match tool.invoke(state, call).await {
            Ok(output) => {
                let text = match output.content {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                ToolResult::success(&call.name, text).with_exit(output.exit)
            }
            Err(e) => ToolResult::failure(&call.name, e.to_string()),
        }
    }
}
