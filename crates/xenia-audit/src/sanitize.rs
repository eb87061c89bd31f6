//! Payload sanitization.
//!
//! Payloads are arbitrary JSON supplied by clients. Before an entry is
//! stored, every payload passes through here: values under sensitive keys
//! are redacted, oversized strings are truncated, and raw bodies that do
//! not parse as a JSON object degrade to a single `_raw` key. Sanitization
//! never fails.

use serde_json::Value;

use crate::entry::JsonMap;

/// Keys whose values are always redacted. Matching is case-insensitive and
/// includes substring containment ("user_password" matches "password").
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "access_token",
    "refresh_token",
    "card_number",
    "card",
    "cvv",
    "credit_card",
    "ssn",
];

/// Replacement value for redacted fields.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Appended to string field values cut at [`MAX_STRING_LEN`].
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Appended to raw bodies cut at [`MAX_RAW_PAYLOAD`].
pub const RAW_TRUNCATION_MARKER: &str = "...[TRUNCATED]";

/// Maximum length, in characters, of an individual string field value.
pub const MAX_STRING_LEN: usize = 5_000;

/// Maximum size, in bytes, of a raw body kept for logging.
pub const MAX_RAW_PAYLOAD: usize = 4_096;

/// Synthetic key holding bodies that did not parse as a JSON object.
pub const RAW_PAYLOAD_KEY: &str = "_raw";

/// Redacts sensitive keys and truncates long string values, recursing into
/// nested objects. Keys are preserved; only values are replaced. Arrays and
/// other non-string, non-object values pass through unchanged.
#[must_use]
pub fn sanitize_map(map: JsonMap) -> JsonMap {
    let mut out = JsonMap::new();
    for (key, value) in map {
        if is_sensitive_key(&key.to_lowercase()) {
            out.insert(key, Value::String(REDACTION_MARKER.to_string()));
        } else {
            out.insert(key, sanitize_value(value));
        }
    }
    out
}

/// Sanitizes a raw request/response body.
///
/// The body is capped at [`MAX_RAW_PAYLOAD`] bytes before parsing. If the
/// capped bytes form a JSON object it is sanitized with [`sanitize_map`];
/// anything else (malformed JSON, non-object JSON, binary) degrades to a
/// map holding the capped text under [`RAW_PAYLOAD_KEY`].
#[must_use]
pub fn sanitize_raw(bytes: &[u8]) -> JsonMap {
    let truncated = bytes.len() > MAX_RAW_PAYLOAD;
    let capped = if truncated {
        &bytes[..MAX_RAW_PAYLOAD]
    } else {
        bytes
    };

    match serde_json::from_slice::<JsonMap>(capped) {
        Ok(map) => sanitize_map(map),
        Err(_) => {
            let mut raw = String::from_utf8_lossy(capped).into_owned();
            if truncated {
                raw.push_str(RAW_TRUNCATION_MARKER);
            }
            let mut out = JsonMap::new();
            out.insert(RAW_PAYLOAD_KEY.to_string(), Value::String(raw));
            out
        }
    }
}

fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize_map(map)),
        Value::String(s) => Value::String(truncate_chars(s, MAX_STRING_LEN)),
        other => other,
    }
}

fn is_sensitive_key(lowercase_key: &str) -> bool {
    SENSITIVE_KEYS
        .iter()
        .any(|sensitive| lowercase_key == *sensitive || lowercase_key.contains(sensitive))
}

fn truncate_chars(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        return s;
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
