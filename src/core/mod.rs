//! Core module - shared infrastructure for Ensemble
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{EnsembleError, Result};
pub use types::*;
