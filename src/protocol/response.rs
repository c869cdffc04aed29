use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The bare `{"error": "..."}` object an encoder emits in place of the
/// closing `]` when its cursor fails mid-stream.
///
/// `deny_unknown_fields` keeps this from matching ordinary rows: only an
/// object whose single key is `error` is treated as a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorPayload {
    pub error: String,
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error)
    }
}

impl std::error::Error for ErrorPayload {}

/// Interpret a recovered-tail object as an error payload, if it is one.
pub fn as_error_payload(map: &Map<String, Value>) -> Option<ErrorPayload> {
    if map.len() != 1 {
        return None;
    }
    match map.get("error") {
        Some(Value::String(message)) => Some(ErrorPayload {
            error: message.clone(),
        }),
        _ => None,
    }
}
