//! Agent module - worker agents and orchestration control flow
//!
//! Contains the leaf agent (template resolution plus the tool-dispatch
//! loop), the composite node tree, and the orchestrator that drives it.

pub mod node;
pub mod orchestrator;
pub mod template;
pub mod turn;
pub mod worker;

pub use node::{Flow, Loop, Node, Parallel, Sequential};
pub use orchestrator::Orchestrator;
pub use turn::{Observation, TurnState};
pub use worker::{Agent, AgentBuilder, AgentOutcome};
