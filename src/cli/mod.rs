//! CLI module - the binary's built-in advisory pipeline
//!
//! The orchestration core is a library; this module is the one consumer
//! shipped with it.

pub mod commands;

pub use commands::{build_advisory_pipeline, run_advisory};
