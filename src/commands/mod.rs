//! JSON bridge for the counter UI.
//!
//! Handlers take the raw first argument the UI sends (a bare string or an
//! object with camelCase or snake_case keys) and answer with a JSON value or
//! a user-facing error string.

pub mod catalog;
pub mod customers;
pub mod payments;

use serde_json::Value;

/// Wrap a bare string argument as `{ key: value }` so one `Deserialize`
/// struct handles both call styles.
pub(crate) fn object_payload(arg0: Option<Value>, key: &str) -> Value {
    match arg0 {
        Some(Value::String(s)) => serde_json::json!({ key: s }),
        Some(v) => v,
        None => serde_json::json!({}),
    }
}
