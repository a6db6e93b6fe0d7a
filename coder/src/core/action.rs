//! Extraction of one JSON action from free-form model output.
//!
//! Models wrap their JSON in prose or markdown fences, so the parser slices
//! from the first `{` to the last `}` and decodes that span. This is a
//! best-effort substring extraction: two independent objects, or trailing
//! commentary containing a `}`, make the slice undecodable and yield
//! [`Action::Error`]. Braces inside string literals are fine as long as they
//! sit within the outer object.

use serde_json::{Map, Value};

/// Action name that ends a run successfully.
pub const DONE_ACTION: &str = "DONE";
/// Action name a model may use to report its own failure.
pub const ERROR_ACTION: &str = "ERROR";
/// Result reported when a `DONE` action carries no `result`.
pub const DEFAULT_DONE_RESULT: &str = "Task completed.";
/// Loose completion marker accepted from sub-agents.
pub const COMPLETION_SENTINEL: &str = "TASK_COMPLETE:";

/// One decoded model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Invoke the named tool with JSON arguments (always an object or null).
    Tool { name: String, args: Value },
    /// Terminal success.
    Done { result: String },
    /// The response could not be decoded into an action.
    Error { message: String },
}

impl Action {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Parse a raw model response into an [`Action`]. Never panics.
pub fn parse_action(raw: &str) -> Action {
    let object = match extract_json_object(raw) {
        Ok(object) => object,
        Err(message) => return Action::Error { message },
    };
    action_from_object(object)
}

/// Decode the first-`{`-to-last-`}` span of `raw` as a JSON object.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, String> {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err("Failed to parse JSON: no JSON object found in response".to_string());
    };
    if end < start {
        return Err("Failed to parse JSON: no JSON object found in response".to_string());
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Failed to parse JSON: expected an object".to_string()),
        Err(err) => Err(format!("Failed to parse JSON: {err}")),
    }
}

fn action_from_object(mut object: Map<String, Value>) -> Action {
    let name = match object.remove("action") {
        Some(Value::String(name)) => name,
        Some(_) => {
            return Action::Error {
                message: "Field 'action' must be a string".to_string(),
            };
        }
        None => {
            return Action::Error {
                message: "Response must be valid JSON with 'action' field".to_string(),
            };
        }
    };

    match name.as_str() {
        DONE_ACTION => Action::Done {
            result: done_result(object.remove("result")),
        },
        ERROR_ACTION => Action::Error {
            message: object
                .get("args")
                .and_then(|args| args.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("model reported an error")
                .to_string(),
        },
        _ => Action::Tool {
            args: object.remove("args").unwrap_or(Value::Object(Map::new())),
            name,
        },
    }
}

fn done_result(result: Option<Value>) -> String {
    match result {
        Some(Value::String(text)) => text,
        None | Some(Value::Null) => DEFAULT_DONE_RESULT.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Text following the first [`COMPLETION_SENTINEL`] in `raw`, if present.
///
/// An empty remainder reports [`DEFAULT_DONE_RESULT`].
pub fn find_completion_sentinel(raw: &str) -> Option<String> {
    let index = raw.find(COMPLETION_SENTINEL)?;
    let rest = raw[index + COMPLETION_SENTINEL.len()..].trim();
    if rest.is_empty() {
        Some(DEFAULT_DONE_RESULT.to_string())
    } else {
        Some(rest.to_string())
    }
}
