//! Instruction template resolution
//!
//! Agent instructions may reference shared state through `{{ key }}`
//! placeholders. A trailing `?` marks the reference optional, matching the
//! `{{ FINANCIAL_REQUEST? }}` convention, but both forms resolve the same
//! way: the most recent value for the key, or an empty string when absent.

use serde_json::Value;

use crate::state::StateStore;

/// Resolve all placeholders in a template against the current state.
///
/// String values substitute verbatim; other JSON values render compactly.
/// Unterminated `{{` sequences pass through literally.
pub fn resolve(template: &str, state: &StateStore) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        match after_open.find("}}") {
            Some(close) => {
                let key = after_open[..close].trim().trim_end_matches('?').trim_end();
                output.push_str(&render(state.latest(key)));
                rest = &after_open[close + 2..];
            }
            None => {
                // No closing braces: keep the remainder as-is
                output.push_str(&rest[open..]);
                return output;
            }
        }
    }

    output.push_str(rest);
    output
}

fn render(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
