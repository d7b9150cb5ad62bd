//! Custom error types for Ensemble
//!
//! Provides a unified error handling system across all modules.
//!
//! The early-exit signal a tool can raise is deliberately NOT an error:
//! it travels as a control-flow value (`agent::node::Flow::Exit`) so that
//! a Loop node can absorb it without touching the error path.

use thiserror::Error;

/// Main error type for Ensemble operations
#[derive(Error, Debug)]
pub enum EnsembleError {
    /// Generation service errors. Transient errors (rate limits, 5xx)
    /// may be retried by an outer boundary; non-transient errors are
    /// fatal for the current run.
    #[error("generation service error (transient={transient}): {message}")]
    Generation { transient: bool, message: String },

    /// Tool execution errors. These are surfaced to the invoking agent
    /// as failed observations and never unwind the orchestration on
    /// their own.
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// The agent's tool-dispatch loop exceeded its turn cap without the
    /// generation service producing a final response.
    #[error("agent '{agent}' exceeded its turn limit of {limit}")]
    TurnLimitExceeded { agent: String, limit: usize },

    /// A fatal error annotated with the path of the node it escaped from
    #[error("node '{path}': {source}")]
    Node {
        path: String,
        #[source]
        source: Box<EnsembleError>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Ensemble operations
pub type Result<T> = std::result::Result<T, EnsembleError>;

impl EnsembleError {
    /// Create a generation service error
    pub fn generation(msg: impl Into<String>, transient: bool) -> Self {
        Self::Generation {
            transient,
            message: msg.into(),
        }
    }

    /// Create a tool execution error
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Annotate an error with the node path it escaped from.
    ///
    /// Applied once at the leaf, where the accumulated path is complete;
    /// composite nodes re-raise without re-wrapping.
    pub fn at_node(path: impl Into<String>, source: EnsembleError) -> Self {
        Self::Node {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error is worth retrying at the collaborator boundary
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Generation { transient, .. } => *transient,
            Self::Node { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
