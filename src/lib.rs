//! Ensemble - Stateful Multi-Agent Orchestration
//!
//! A library for composing tool-augmented agents into directed pipelines:
//! agents read and write a shared append-only state store, run under
//! Sequential, Parallel, and Loop control nodes, and may stop a bounded
//! loop early through a cooperative exit signal raised by a tool.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **State**: The append/overwrite key-value store shared per run
//! - **LLM**: Generation provider abstraction with a Gemini implementation
//! - **Tools**: Tool trait, registry, and built-in tools
//! - **Agent**: Worker agents, composite nodes, and the orchestrator
//! - **CLI**: The binary's built-in advisory pipeline
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ensemble::agent::{Agent, Loop, Node, Orchestrator};
//! use ensemble::llm::GeminiClient;
//! use ensemble::tools::ToolRegistry;
//! use ensemble::Config;
//!
//! #[tokio::main]
//! async fn main() -> ensemble::Result<()> {
//!     let config = Config::load();
//!     let llm = Arc::new(GeminiClient::from_config(&config)?);
//!     let tools = Arc::new(ToolRegistry::with_builtins());
//!
//!     let planner = Agent::builder("planner")
//!         .instruction("Draft a plan for: {{ REQUEST? }}")
//!         .append_key("PLAN")
//!         .llm(llm.clone())
//!         .tools(tools.clone())
//!         .build()?;
//!
//!     let orchestrator = Orchestrator::new(Loop::new("draft", vec![Node::from(planner)], 3));
//!     let state = orchestrator
//!         .run_seeded([("REQUEST", serde_json::json!("save for a house"))])
//!         .await?;
//!     println!("{:?}", state.get("PLAN"));
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod state;
pub mod tools;

// Re-export commonly used items
pub use agent::{Agent, Orchestrator};
pub use core::{Config, EnsembleError, Result};
pub use state::StateStore;
