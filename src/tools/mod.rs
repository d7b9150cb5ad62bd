//! Tools module - capabilities agents may invoke during generation
//!
//! A tool is a named callable with a declared signature. Tools read and
//! write the shared `StateStore` through its operations only, and may raise
//! the early-exit signal that terminates an enclosing Loop node.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{Result, ToolCall, ToolSpec};
use crate::state::StateStore;

pub mod builtin;
pub mod registry;

pub use builtin::{AppendToStateTool, ExitLoopTool, GenerateRecordIdTool, WriteDocumentTool};
pub use registry::ToolRegistry;

/// Outcome of a successful tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Result value fed back to the model as an observation
    pub content: Value,
    /// Whether this invocation raises the early-exit signal
    pub exit: bool,
}

impl ToolOutput {
    /// A plain text output
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            exit: false,
        }
    }

    /// A structured JSON output
    pub fn json(content: Value) -> Self {
        Self {
            content,
            exit: false,
        }
    }

    /// An output that raises the early-exit signal
    pub fn exit(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            exit: true,
        }
    }
}

/// A named, schema-described callable an agent may invoke.
///
/// Implementations must confine state mutation to the `StateStore`
/// operations so the store's atomicity guarantee holds. Invocation errors
/// are non-fatal: the registry feeds them back to the model as failed
/// observations.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declared signature, advertised to the generation service
    fn spec(&self) -> ToolSpec;

    /// Invoke the tool against the shared state
    async fn invoke(&self, state: &StateStore, call: &ToolCall) -> Result<ToolOutput>;
}
