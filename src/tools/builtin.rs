//! Built-in tools
//!
//! The small standing set every pipeline can draw on: loop control, state
//! writes, record-id minting, and the document-writer collaborator.

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;

use crate::core::{EnsembleError, Result, ToolCall, ToolSpec};
use crate::state::StateStore;
use crate::tools::{Tool, ToolOutput};

/// Raises the early-exit signal, stopping the nearest enclosing Loop node
/// before its iteration cap. Outside a Loop the signal propagates up and
/// ends the run.
pub struct ExitLoopTool;

#[async_trait]
impl Tool for ExitLoopTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "exit_loop",
            "Call this when the current result is satisfactory and the review loop should stop.",
            json!({
                "type": "object",
                "properties": {
                    "reason": {
                        "type": "string",
                        "description": "Why the loop can stop now"
                    }
                }
            }),
        )
    }

    async fn invoke(&self, _state: &StateStore, call: &ToolCall) -> Result<ToolOutput> {
        let reason = call
            .get_string("reason")
            .unwrap_or_else(|| "loop exit requested".to_string());
        Ok(ToolOutput::exit(reason))
    }
}

/// Appends a value to a key's sequence in the shared state
pub struct AppendToStateTool;

#[async_trait]
impl Tool for AppendToStateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "append_to_state",
            "Append a value to a named key in the shared session state.",
            json!({
                "type": "object",
                "properties": {
                    "key": {
                        "type": "string",
                        "description": "State key to append under"
                    },
                    "value": {
                        "type": "string",
                        "description": "Value to append"
                    }
                },
                "required": ["key", "value"]
            }),
        )
    }

    async fn invoke(&self, state: &StateStore, call: &ToolCall) -> Result<ToolOutput> {
        let key = call
            .get_string("key")
            .ok_or_else(|| EnsembleError::tool(&call.name, "missing 'key' argument"))?;
        let value = call
            .get("value")
            .cloned()
            .ok_or_else(|| EnsembleError::tool(&call.name, "missing 'value' argument"))?;

        state.append(&key, value);
        Ok(ToolOutput::text(format!("appended to '{}'", key)))
    }
}

/// Mints a random record identifier.
///
/// Not idempotent: each call produces a fresh id, so callers must not
/// assume repeated calls with the same arguments return the same value.
pub struct GenerateRecordIdTool;

#[async_trait]
impl Tool for GenerateRecordIdTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "generate_record_id",
            "Generate a unique identifier for a new user or session record.",
            json!({
                "type": "object",
                "properties": {
                    "prefix": {
                        "type": "string",
                        "description": "Optional prefix for the identifier"
                    }
                }
            }),
        )
    }

    async fn invoke(&self, _state: &StateStore, call: &ToolCall) -> Result<ToolOutput> {
        let prefix = call.get_string("prefix").unwrap_or_else(|| "rec".to_string());
        let suffix: u64 = rand::rng().random();
        Ok(ToolOutput::text(format!("{}-{:016x}", prefix, suffix)))
    }
}

/// Writes a document to disk as a side-effect artifact.
///
/// The file/document writer collaborator: the orchestration core owns no
/// part of the artifact's lifecycle beyond this call.
pub struct WriteDocumentTool;

#[async_trait]
impl Tool for WriteDocumentTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "write_document",
            "Write text content to a file on disk.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Destination file path"
                    },
                    "content": {
                        "type": "string",
                        "description": "Text content to write"
                    }
                },
                "required": ["path", "content"]
            }),
        )
    }

    async fn invoke(&self, _state: &StateStore, call: &ToolCall) -> Result<ToolOutput> {
        let path = call
            .get_string("path")
            .ok_or_else(|| EnsembleError::tool(&call.name, "missing 'path' argument"))?;
        let content = call
            .get_string("content")
            .ok_or_else(|| EnsembleError::tool(&call.name, "missing 'content' argument"))?;

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| EnsembleError::tool(&call.name, format!("write failed: {}", e)))?;

        Ok(ToolOutput::text(format!("wrote {}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolCall;

    #[tokio::test]
    async fn test_exit_loop_raises_signal() {
        let state = StateStore::new();
        let output = ExitLoopTool
            .invoke(
                &state,
                &ToolCall::new("exit_loop", json!({"reason": "approved"})),
            )
            .await
            .unwrap();

        assert!(output.exit);
        assert_eq!(output.content, json!("approved"));
    }

    #[tokio::test]
    async fn test_append_to_state_writes_through_store() {
        let state = StateStore::new();
        AppendToStateTool
            .invoke(
                &state,
                &ToolCall::new("append_to_state", json!({"key": "log", "value": "one"})),
            )
            .await
            .unwrap();

        assert_eq!(state.get("log"), vec![json!("one")]);
    }

    #[tokio::test]
    async fn test_append_to_state_missing_args() {
        let state = StateStore::new();
        let err = AppendToStateTool
            .invoke(&state, &ToolCall::new("append_to_state", json!({})))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("missing 'key'"));
    }

    #[tokio::test]
    async fn test_record_ids_are_unique() {
        let state = StateStore::new();
        let call = ToolCall::new("generate_record_id", json!({"prefix": "user"}));

        let a = GenerateRecordIdTool.invoke(&state, &call).await.unwrap();
        let b = GenerateRecordIdTool.invoke(&state, &call).await.unwrap();

        assert_ne!(a.content, b.content);
        assert!(a.content.as_str().unwrap().starts_with("user-"));
    }
}
