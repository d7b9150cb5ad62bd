//! Shared orchestration state
//!
//! A `StateStore` is created once per orchestration run and threaded by
//! handle into every node's execution. All clones share one underlying map,
//! so a write made by one agent is visible to every subsequently scheduled
//! node in the same run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

/// How an agent's final text is written into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite the key's sequence with a single element
    Set,
    /// Add one element to the end of the key's sequence
    Append,
}

/// Append/overwrite key-value store shared across one orchestration run.
///
/// Keys map to sequences of JSON values. Keys are created lazily on first
/// write; reading an absent key yields an empty sequence, never an error.
/// Each `append` is atomic: concurrent appends to the same key from
/// Parallel siblings never lose an element, though their relative order is
/// unspecified.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<HashMap<String, Vec<Value>>>>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // Mutex poisoning cannot corrupt the map (every critical section is a
    // plain insert/push), so a poisoned lock is recovered rather than
    // propagated.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the full sequence for a key. Absent keys yield an empty vec.
    pub fn get(&self, key: &str) -> Vec<Value> {
        self.lock().get(key).cloned().unwrap_or_default()
    }

    /// Get the most recent value for a key
    pub fn latest(&self, key: &str) -> Option<Value> {
        self.lock().get(key).and_then(|seq| seq.last().cloned())
    }

    /// Append a value to the end of a key's sequence, creating the key
    /// if absent
    pub fn append(&self, key: impl Into<String>, value: Value) {
        self.lock().entry(key.into()).or_default().push(value);
    }

    /// Overwrite a key's entire sequence with `[value]`
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.lock().insert(key.into(), vec![value]);
    }

    /// Check whether a key has at least one value
    pub fn contains(&self, key: &str) -> bool {
        self.lock().get(key).is_some_and(|seq| !seq.is_empty())
    }

    /// All keys currently present, sorted for stable output
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copy of the full contents, returned to the caller at run completion
    pub fn snapshot(&self) -> HashMap<String, Vec<Value>> {
        self.lock().clone()
    }
}
