//! Response body decoding
//!
//! Backends answer with the document itself or wrapped in one of several
//! equivalent envelopes, optionally behind a `)]}'` anti-hijacking prefix.

use serde_json::Value;

use super::RemoteError;

const XSSI_PREFIX: &str = ")]}'";
const MAX_STRING_DEPTH: usize = 4;

/// Strip the anti-hijacking prefix and surrounding whitespace
pub fn sanitize(text: &str) -> &str {
    text.strip_prefix(XSSI_PREFIX).unwrap_or(text).trim()
}

/// Decode a response body down to the document payload
pub fn decode_body(text: &str) -> Result<Value, RemoteError> {
    let clean = sanitize(text);
    if clean.is_empty() {
        return Err(RemoteError::Malformed("empty response body".to_string()));
    }
    let value: Value =
        serde_json::from_str(clean).map_err(|e| RemoteError::Malformed(e.to_string()))?;
    unwrap_payload(value, 0)
}

/// Unwrap envelopes in order: JSON string, `menu` string, `menu`, `data`,
/// `result`, `body` objects, then the object itself
fn unwrap_payload(value: Value, depth: usize) -> Result<Value, RemoteError> {
    if depth > MAX_STRING_DEPTH {
        return Err(RemoteError::Malformed(
            "payload nested too deeply".to_string(),
        ));
    }

    match value {
        Value::String(encoded) => {
            let inner: Value = serde_json::from_str(&encoded)
                .map_err(|e| RemoteError::Malformed(format!("encoded payload: {}", e)))?;
            unwrap_payload(inner, depth + 1)
        }
        Value::Object(mut map) => {
            if map.contains_key("restaurants") {
                return Ok(Value::Object(map));
            }
            if let Some(Value::String(_)) = map.get("menu") {
                let encoded = map.remove("menu").unwrap_or(Value::Null);
                return unwrap_payload(encoded, depth + 1);
            }
            for key in ["menu", "data", "result", "body"] {
                if matches!(map.get(key), Some(Value::Object(_))) {
                    return Ok(map.remove(key).unwrap_or(Value::Null));
                }
            }
            Ok(Value::Object(map))
        }
        Value::Null => Err(RemoteError::Malformed("null payload".to_string())),
        other => Err(RemoteError::Malformed(format!(
            "unexpected payload type: {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
