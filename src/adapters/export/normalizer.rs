//! Map raw chat-export JSON to the canonical `ParsedChatData`.
//!
//! Shape detection is a fixed list of rules tried in priority order, producing a
//! `ParticipantSource` tag; nothing downstream reads raw fields again.

use crate::adapters::export::raw::{PLACEHOLDER_PARTICIPANTS, RawMessage, RawParticipant};
use crate::domain::{DomainError, MediaKind, Message, ParsedChatData};
use serde_json::Value;
use tracing::{debug, warn};

/// Where the participant list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantSource {
    /// Top-level `participants[]`.
    Participants(Vec<String>),
    /// Top-level `users[]`.
    Users(Vec<String>),
    /// Nested `conversation.participants[]`.
    Conversation(Vec<String>),
    /// Unique `sender_name` values, first-seen order.
    Senders(Vec<String>),
    /// Nobody is named anywhere.
    Placeholder,
}

impl ParticipantSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ParticipantSource::Participants(_) => "participants",
            ParticipantSource::Users(_) => "users",
            ParticipantSource::Conversation(_) => "conversation",
            ParticipantSource::Senders(_) => "senders",
            ParticipantSource::Placeholder => "placeholder",
        }
    }

    pub fn into_names(self) -> Vec<String> {
        match self {
            ParticipantSource::Participants(names)
            | ParticipantSource::Users(names)
            | ParticipantSource::Conversation(names)
            | ParticipantSource::Senders(names) => names,
            ParticipantSource::Placeholder => {
                PLACEHOLDER_PARTICIPANTS.iter().map(|s| s.to_string()).collect()
            }
        }
    }
}

/// Parse an export from its JSON text. Uses the current time for timestamp-less chats.
pub fn parse_export(json: &str) -> Result<ParsedChatData, DomainError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| DomainError::Format(format!("not valid JSON: {}", e)))?;
    normalize(&value)
}

/// Normalize an already-parsed export.
pub fn normalize(value: &Value) -> Result<ParsedChatData, DomainError> {
    normalize_at(value, chrono::Utc::now().timestamp_millis())
}

/// Normalize with an explicit "now" (epoch ms) for chats without timestamps.
pub fn normalize_at(value: &Value, now_ms: i64) -> Result<ParsedChatData, DomainError> {
    let raw_messages = find_messages(value)?;
    let messages: Vec<Message> = raw_messages
        .iter()
        .enumerate()
        .filter_map(|(i, v)| message_to_domain(i, v))
        .collect();

    let source = detect_participants(value, &messages);
    debug!(
        source = source.kind(),
        messages = messages.len(),
        "detected export shape"
    );

    Ok(ParsedChatData::from_messages(
        source.into_names(),
        messages,
        now_ms,
    ))
}

/// `messages` is the only required field: top-level, under `conversation`, or the root array.
fn find_messages(value: &Value) -> Result<&Vec<Value>, DomainError> {
    if let Some(arr) = value.as_array() {
        return Ok(arr);
    }
    let obj = value
        .as_object()
        .ok_or_else(|| DomainError::Format("export must be a JSON object or array".into()))?;

    let candidates = [
        obj.get("messages"),
        obj.get("conversation").and_then(|c| c.get("messages")),
    ];
    match candidates.into_iter().flatten().next() {
        Some(Value::Array(arr)) => Ok(arr),
        Some(_) => Err(DomainError::Format("`messages` is not an array".into())),
        None => Err(DomainError::Format("missing `messages` array".into())),
    }
}

type ParticipantRule = fn(&Value) -> Option<ParticipantSource>;

/// Detection rules in priority order.
const PARTICIPANT_RULES: &[ParticipantRule] = &[from_participants, from_users, from_conversation];

fn from_participants(v: &Value) -> Option<ParticipantSource> {
    names_at(v.get("participants")).map(ParticipantSource::Participants)
}

fn from_users(v: &Value) -> Option<ParticipantSource> {
    names_at(v.get("users")).map(ParticipantSource::Users)
}

fn from_conversation(v: &Value) -> Option<ParticipantSource> {
    names_at(v.get("conversation").and_then(|c| c.get("participants")))
        .map(ParticipantSource::Conversation)
}

fn detect_participants(value: &Value, messages: &[Message]) -> ParticipantSource {
    if let Some(source) = PARTICIPANT_RULES.iter().find_map(|rule| rule(value)) {
        return source;
    }

    let mut senders: Vec<String> = Vec::new();
    for name in messages.iter().filter_map(|m| m.sender.as_deref()) {
        if !senders.iter().any(|s| s == name) {
            senders.push(name.to_string());
        }
    }
    if senders.is_empty() {
        warn!("no participants found in export, using placeholders");
        ParticipantSource::Placeholder
    } else {
        ParticipantSource::Senders(senders)
    }
}

/// Non-empty participant array at `node`, mapped to display names.
fn names_at(node: Option<&Value>) -> Option<Vec<String>> {
    let arr = node?.as_array()?;
    let names: Vec<String> = arr
        .iter()
        .filter_map(|p| serde_json::from_value::<RawParticipant>(p.clone()).ok())
        .map(|p| p.display_name())
        .collect();
    (!names.is_empty()).then_some(names)
}

fn message_to_domain(index: usize, value: &Value) -> Option<Message> {
    let Some(raw) = RawMessage::from_value(value) else {
        warn!(index, "skipping message that is not a JSON object");
        return None;
    };

    let timestamp_ms = match raw.timestamp_ms {
        Some(ts) if ts < 0 => {
            warn!(index, ts, "ignoring negative timestamp");
            None
        }
        other => other,
    };

    let media: Vec<MediaKind> = [
        (raw.photos, MediaKind::Photo),
        (raw.videos, MediaKind::Video),
        (raw.audio_files, MediaKind::Audio),
        (raw.share, MediaKind::Share),
        (raw.sticker, MediaKind::Sticker),
    ]
    .into_iter()
    .filter_map(|(present, kind)| present.then_some(kind))
    .collect();

    Some(Message {
        sender: raw
            .sender_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        timestamp_ms,
        text: raw.content,
        media,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn sample() -> Value {
        json!({
            "participants": [{"name": "Tanisha"}, {"name": "Kaushik"}],
            "messages": [
                {"sender_name": "Tanisha", "timestamp_ms": 1623457189000i64,
                 "content": "Wow, it looks amazing!"},
                {"sender_name": "Kaushik", "timestamp_ms": 1623457089000i64,
                 "photos": [{"uri": "photos/1.jpg", "creation_timestamp": 1623457089}]},
                {"sender_name": "Tanisha", "timestamp_ms": 1623456989000i64,
                 "content": "That's awesome!"},
                {"sender_name": "Kaushik", "timestamp_ms": 1623456889000i64,
                 "content": "Check this", "share": {"link": "https://example.com"}},
                {"sender_name": "Tanisha", "timestamp_ms": 1623456789000i64,
                 "content": "Hey, how are you?"}
            ],
            "title": "Tanisha and Kaushik",
            "thread_path": "inbox/tanishakaushik_123456789"
        })
    }

    #[test]
    fn test_instagram_shape() {
        let data = normalize_at(&sample(), NOW).unwrap();
        assert_eq!(data.participants, vec!["Tanisha", "Kaushik"]);
        assert_eq!(data.message_count, 5);
        assert_eq!(data.messages_by_participant["Tanisha"], 3);
        assert_eq!(data.messages_by_participant["Kaushik"], 2);
        assert_eq!(data.text_messages.len(), 3);
        assert_eq!(data.media_messages.len(), 2);
        assert_eq!(data.time_span.start_ms, 1623456789000);
        assert_eq!(data.time_span.end_ms, 1623457189000);
        assert_eq!(data.time_span.duration_days, 1);
        assert_eq!(data.average_messages_per_day, 5);
        // export is newest-first; normalized views are ascending
        assert_eq!(
            data.text_messages[0].text.as_deref(),
            Some("Hey, how are you?")
        );
    }

    #[test]
    fn test_users_shape_with_usernames() {
        let value = json!({
            "users": [{"username": "alex"}, {"name": "Sam"}, {}],
            "messages": [{"sender_name": "alex", "content": "hi"}]
        });
        let data = normalize_at(&value, NOW).unwrap();
        assert_eq!(data.participants, vec!["alex", "Sam", "Unknown User"]);
    }

    #[test]
    fn test_conversation_shape() {
        let value = json!({
            "conversation": {"participants": ["A", "B"]},
            "messages": [{"sender": "A", "text": "yo", "timestampMs": 5}]
        });
        let data = normalize_at(&value, NOW).unwrap();
        assert_eq!(data.participants, vec!["A", "B"]);
        assert_eq!(data.messages_by_participant["A"], 1);
        assert_eq!(data.text_messages.len(), 1);
    }

    #[test]
    fn test_participants_derived_from_senders() {
        let value = json!({
            "messages": [
                {"sender_name": "B", "content": "1", "timestamp_ms": 2},
                {"sender_name": "A", "content": "2", "timestamp_ms": 1},
                {"sender_name": "B", "content": "3", "timestamp_ms": 3}
            ]
        });
        let data = normalize_at(&value, NOW).unwrap();
        // first-seen order of the export, not of the sorted view
        assert_eq!(data.participants, vec!["B", "A"]);
        assert_eq!(data.attributed_count(), 3);
    }

    #[test]
    fn test_placeholder_participants() {
        let value = json!({"messages": [{"content": "anonymous"}]});
        let data = normalize_at(&value, NOW).unwrap();
        assert_eq!(data.participants, vec!["User 1", "User 2"]);
        assert_eq!(data.message_count, 1);
        assert_eq!(data.attributed_count(), 0);
    }

    #[test]
    fn test_empty_participants_array_falls_through() {
        let value = json!({
            "participants": [],
            "messages": [{"sender_name": "Z", "content": "x"}]
        });
        let data = normalize_at(&value, NOW).unwrap();
        assert_eq!(data.participants, vec!["Z"]);
    }

    #[test]
    fn test_missing_timestamps_default_to_now() {
        let value = json!({"messages": [
            {"sender_name": "A", "content": "x"},
            {"sender_name": "A", "content": "y"}
        ]});
        let data = normalize_at(&value, NOW).unwrap();
        assert_eq!(data.time_span.start_ms, NOW);
        assert_eq!(data.time_span.duration_days, 1);
        assert_eq!(data.average_messages_per_day, data.message_count as u64);
    }

    #[test]
    fn test_root_array_is_message_list() {
        let value = json!([{"sender_name": "A", "content": "x", "timestamp_ms": 1}]);
        let data = normalize_at(&value, NOW).unwrap();
        assert_eq!(data.message_count, 1);
    }

    #[test]
    fn test_missing_messages_is_format_error() {
        let err = normalize_at(&json!({"participants": [{"name": "A"}]}), NOW).unwrap_err();
        assert!(matches!(err, DomainError::Format(_)));
        let err = normalize_at(&json!({"messages": "nope"}), NOW).unwrap_err();
        assert!(matches!(err, DomainError::Format(_)));
        let err = normalize_at(&json!(42), NOW).unwrap_err();
        assert!(matches!(err, DomainError::Format(_)));
    }

    #[test]
    fn test_invalid_json_is_format_error() {
        assert!(matches!(
            parse_export("{not json"),
            Err(DomainError::Format(_))
        ));
    }

    #[test]
    fn test_negative_timestamp_treated_as_missing() {
        let value = json!({"messages": [
            {"sender_name": "A", "content": "x", "timestamp_ms": -5},
            {"sender_name": "A", "content": "y", "timestamp_ms": 1000}
        ]});
        let data = normalize_at(&value, NOW).unwrap();
        assert_eq!(data.time_span.start_ms, 1000);
        assert_eq!(data.messages[0].timestamp_ms, None);
    }

    #[test]
    fn test_wrong_typed_optional_fields_keep_the_message() {
        let value = json!({"messages": [
            {"sender_name": "A", "content": "ok", "timestamp_ms": 1700000000000i64},
            {"sender_name": "A", "timestamp_ms": 1700000000001.0},
            {"sender_name": "A", "content": 17},
            {"sender_name": "A", "photos": {"uri": "x.jpg"}},
            "garbage"
        ]});
        let data = normalize_at(&value, NOW).unwrap();

        // only the non-object entry is dropped
        assert_eq!(data.message_count, 4);
        assert_eq!(data.attributed_count(), 4);
        assert_eq!(data.time_span.end_ms, 1_700_000_000_001);
        assert!(data.messages.iter().any(|m| m.text.as_deref() == Some("17")));
    }
}
