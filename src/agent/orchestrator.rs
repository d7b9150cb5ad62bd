//! Orchestrator
//!
//! Drives an orchestration tree to completion against one shared state
//! store and returns the final contents to the caller.

use std::sync::Arc;

use crate::agent::node::{Flow, Node};
use crate::core::Result;
use crate::state::StateStore;

/// Runs an orchestration tree rooted at one entry node.
///
/// The tree is constructed once and may be run any number of times, each
/// run against a fresh (or caller-seeded) `StateStore`.
pub struct Orchestrator {
    root: Arc<Node>,
}

impl Orchestrator {
    /// Create an orchestrator for the given root node
    pub fn new(root: impl Into<Node>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Name of the root node
    pub fn root_name(&self) -> &str {
        self.root.name()
    }

    /// Run the tree to completion.
    ///
    /// An early-exit signal that escapes the root is absorbed here, since
    /// there is no further enclosing Loop: the run still completes
    /// successfully with the state written so far. Fatal errors surface
    /// with the failing node path.
    pub async fn run(&self, state: StateStore) -> Result<StateStore> {
        let path = self.root.name().to_string();
        let _flow: Flow = self.root.clone().execute(state.clone(), path).await?;
        Ok(state)
    }

    /// Convenience: run with a store seeded from key/value pairs
    pub async fn run_seeded<I, K>(&self, seed: I) -> Result<StateStore>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let state = StateStore::new();
        for (key, value) in seed {
            state.set(key, value);
        }
        self.run(state).await
    }
}
