//! Stream envelopes
//!
//! Each stream record is a JSON object whose `message` field carries the
//! text to tokenize. Other fields are ignored.

use serde_json::Value;
use tracing::warn;
use wrs_common::Result;

/// Parse one envelope. `Ok(None)` when the payload is valid JSON but not an
/// object.
fn parse(raw: &[u8]) -> Result<Option<String>> {
    let Value::Object(mut fields) = serde_json::from_slice::<Value>(raw)? else {
        return Ok(None);
    };

    Ok(Some(match fields.remove("message") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    }))
}

/// Extract the message text from one raw envelope
///
/// - missing or `null` field → empty string
/// - string → as is
/// - any other JSON value → its JSON text
/// - payload that is not a JSON object (including invalid UTF-8) → logged,
///   empty string
pub fn message_text(raw: &[u8]) -> String {
    match parse(raw) {
        Ok(Some(text)) => text,
        Ok(None) => {
            warn!("Discarding envelope that is not a JSON object ({} bytes)", raw.len());
            String::new()
        }
        Err(e) => {
            warn!("Discarding malformed envelope ({} bytes): {}", raw.len(), e);
            String::new()
        }
    }
}
