//! CSV utilities for prompt context. Uses the `csv` crate for safe serialization.
//!
//! Converts domain messages to CSV format suitable for LLM context input.

use crate::domain::{MediaKind, Message};
use chrono::{DateTime, Utc};

/// Convert messages to a CSV string for LLM context.
///
/// Format: `Date;User;Message` (semicolon-delimited for LLM token efficiency)
///
/// # Arguments
/// * `messages` - Slice of messages to convert (one chunk)
///
/// # Returns
/// CSV string with header row, or error if serialization fails.
pub fn messages_to_csv(messages: &[Message]) -> Result<String, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_writer(Vec::new());

    wtr.write_record(["Date", "User", "Message"])?;

    for msg in messages {
        wtr.write_record(row_fields(msg))?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;

    String::from_utf8(bytes).map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}

fn row_fields(msg: &Message) -> [String; 3] {
    let date_str = msg
        .timestamp_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    let user_str = msg.sender.clone().unwrap_or_else(|| "unknown".to_string());

    // Newlines flattened for LLM readability; the csv crate handles quoting
    let mut text = msg
        .text
        .as_deref()
        .unwrap_or_default()
        .replace('\n', " ")
        .replace('\r', "");
    if text.trim().is_empty() {
        if let Some(kind) = msg.media.first() {
            text = format!("[{}]", media_label(*kind));
        }
    }

    [date_str, user_str, text]
}

fn media_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo",
        MediaKind::Video => "video",
        MediaKind::Audio => "audio",
        MediaKind::Share => "shared link",
        MediaKind::Sticker => "sticker",
    }
}
