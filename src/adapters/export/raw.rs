//! Raw chat-export shapes (Instagram/Messenger style JSON and close relatives).
//!
//! Only the fields the normalizer reads are modelled; everything else is ignored.

use serde::Deserialize;
use serde_json::Value;

/// Name used when a participant entry carries no usable name.
pub const UNKNOWN_PARTICIPANT: &str = "Unknown User";

/// Placeholder participants when nothing in the export names anyone.
pub const PLACEHOLDER_PARTICIPANTS: [&str; 2] = ["User 1", "User 2"];

/// Participant entry: `{"name": ..}`, `{"username": ..}` or a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawParticipant {
    Plain(String),
    Named {
        name: Option<String>,
        username: Option<String>,
    },
}

impl RawParticipant {
    pub fn display_name(&self) -> String {
        let name = match self {
            RawParticipant::Plain(s) => Some(s.as_str()),
            RawParticipant::Named { name, username } => name.as_deref().or(username.as_deref()),
        };
        match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => UNKNOWN_PARTICIPANT.to_string(),
        }
    }
}

/// One exported message. Field spellings vary between exports, so each field has a list of
/// accepted keys, first match wins.
///
/// Every field is optional and read leniently: a value of the wrong type reads as absent instead
/// of discarding the message.
#[derive(Debug, Default, PartialEq)]
pub struct RawMessage {
    pub sender_name: Option<String>,
    pub timestamp_ms: Option<i64>,
    pub content: Option<String>,
    pub photos: bool,
    pub videos: bool,
    pub audio_files: bool,
    pub share: bool,
    pub sticker: bool,
}

const SENDER_KEYS: &[&str] = &["sender_name", "sender", "author"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp_ms", "timestampMs"];
const CONTENT_KEYS: &[&str] = &["content", "text"];

impl RawMessage {
    /// `None` only when `value` is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let first = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null());

        Some(Self {
            sender_name: first(SENDER_KEYS).and_then(scalar_text),
            timestamp_ms: first(TIMESTAMP_KEYS).and_then(epoch_ms),
            content: first(CONTENT_KEYS).and_then(scalar_text),
            photos: non_empty_list(obj.get("photos")),
            videos: non_empty_list(obj.get("videos")),
            audio_files: non_empty_list(obj.get("audio_files")),
            share: obj.get("share").is_some_and(|v| !v.is_null()),
            sticker: obj.get("sticker").is_some_and(|v| !v.is_null()),
        })
    }
}

/// Strings as-is; numbers and booleans in their JSON spelling.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integer or integral float milliseconds, or a numeric string.
fn epoch_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f.round() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// A media list counts only when it is a non-empty array.
fn non_empty_list(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty())
}
