//! Domain entities. Pure data structures for the core business.
//!
//! No export-format/IO types here; raw chat exports are mapped in `adapters::export`.

use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Milliseconds in one day.
pub const MS_PER_DAY: i64 = 86_400_000;

/// A single chat event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Participant display name. `None` when the export did not name the sender.
    pub sender: Option<String>,
    /// Epoch milliseconds, never negative.
    pub timestamp_ms: Option<i64>,
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaKind>,
}

impl Message {
    /// Has non-blank text content.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Forwarded share (link/post). Never counted as a text message.
    pub fn is_share(&self) -> bool {
        self.media.contains(&MediaKind::Share)
    }

    pub fn is_text(&self) -> bool {
        self.has_text() && !self.is_share()
    }

    pub fn is_media(&self) -> bool {
        !self.media.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Share,
    Sticker,
}

/// Inclusive time span of a chat. `duration_days` is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_days: u64,
}

impl TimeSpan {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        // saturating: hostile exports can carry timestamps at either end of i64
        let elapsed = end_ms.saturating_sub(start_ms).max(0) as u64;
        let days = elapsed.div_ceil(MS_PER_DAY as u64);
        Self {
            start_ms,
            end_ms,
            duration_days: days.max(1),
        }
    }

    /// Span over all timestamped messages; `now_ms..now_ms` when none carry a timestamp.
    pub fn from_messages(messages: &[Message], now_ms: i64) -> Self {
        let mut stamps = messages.iter().filter_map(|m| m.timestamp_ms);
        match stamps.next() {
            Some(first) => {
                let (min, max) =
                    stamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));
                Self::new(min, max)
            }
            None => Self::new(now_ms, now_ms),
        }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.start_ms)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.end_ms)
    }
}

/// Canonical normalized chat. Built once per export, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedChatData {
    /// Unique display names in first-seen order.
    pub participants: Vec<String>,
    pub message_count: usize,
    /// Attributed message counts, in participant order. Unknown senders are not counted here.
    pub messages_by_participant: IndexMap<String, usize>,
    pub time_span: TimeSpan,
    pub average_messages_per_day: u64,
    pub messages: Vec<Message>,
    pub text_messages: Vec<Message>,
    pub media_messages: Vec<Message>,
}

impl ParsedChatData {
    /// Build the canonical record: dedupes participants, attributes counts, sorts by timestamp
    /// and derives the text/media views.
    pub fn from_messages(
        participants: Vec<String>,
        mut messages: Vec<Message>,
        now_ms: i64,
    ) -> Self {
        let mut messages_by_participant: IndexMap<String, usize> = IndexMap::new();
        for name in participants {
            messages_by_participant.entry(name).or_insert(0);
        }

        let mut unattributed = 0usize;
        for msg in &messages {
            match msg
                .sender
                .as_deref()
                .and_then(|s| messages_by_participant.get_mut(s))
            {
                Some(count) => *count += 1,
                None => unattributed += 1,
            }
        }
        if unattributed > 0 {
            warn!(
                unattributed,
                total = messages.len(),
                "messages from unknown senders (kept, not attributed)"
            );
        }

        // Stable: equal timestamps keep export order
        messages.sort_by_key(|m| m.timestamp_ms);

        let time_span = TimeSpan::from_messages(&messages, now_ms);
        let text_messages: Vec<Message> =
            messages.iter().filter(|m| m.is_text()).cloned().collect();
        let media_messages: Vec<Message> =
            messages.iter().filter(|m| m.is_media()).cloned().collect();

        Self {
            participants: messages_by_participant.keys().cloned().collect(),
            message_count: messages.len(),
            average_messages_per_day: average_per_day(messages.len(), time_span.duration_days),
            messages_by_participant,
            time_span,
            messages,
            text_messages,
            media_messages,
        }
    }

    /// Merge several chats (upload order) into one.
    ///
    /// Participants are unioned in first-seen order, counts summed, message views concatenated
    /// and re-sorted by timestamp. Duration and average are recomputed from the combined totals.
    pub fn combine(chats: Vec<ParsedChatData>) -> Result<Self, DomainError> {
        let mut iter = chats.into_iter();
        let first = iter.next().ok_or(DomainError::NoData)?;
        let rest: Vec<ParsedChatData> = iter.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        let mut by_participant: IndexMap<String, usize> = IndexMap::new();
        let mut message_count = 0usize;
        let mut start_ms = first.time_span.start_ms;
        let mut end_ms = first.time_span.end_ms;
        let mut messages = Vec::new();
        let mut text_messages = Vec::new();
        let mut media_messages = Vec::new();

        for chat in std::iter::once(first).chain(rest) {
            for name in &chat.participants {
                by_participant.entry(name.clone()).or_insert(0);
            }
            for (name, count) in &chat.messages_by_participant {
                *by_participant.entry(name.clone()).or_insert(0) += count;
            }
            message_count += chat.message_count;
            start_ms = start_ms.min(chat.time_span.start_ms);
            end_ms = end_ms.max(chat.time_span.end_ms);
            messages.extend(chat.messages);
            text_messages.extend(chat.text_messages);
            media_messages.extend(chat.media_messages);
        }

        messages.sort_by_key(|m| m.timestamp_ms);
        text_messages.sort_by_key(|m| m.timestamp_ms);
        media_messages.sort_by_key(|m| m.timestamp_ms);

        let time_span = TimeSpan::new(start_ms, end_ms);
        debug!(
            participants = by_participant.len(),
            message_count,
            days = time_span.duration_days,
            "combined chats"
        );

        Ok(Self {
            participants: by_participant.keys().cloned().collect(),
            message_count,
            messages_by_participant: by_participant,
            time_span,
            average_messages_per_day: average_per_day(message_count, time_span.duration_days),
            messages,
            text_messages,
            media_messages,
        })
    }

    /// Messages attributed to a known participant.
    pub fn attributed_count(&self) -> usize {
        self.messages_by_participant.values().sum()
    }

    /// Statistics view without the message bodies (for reports).
    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            participants: self.participants.clone(),
            message_count: self.message_count,
            messages_by_participant: self.messages_by_participant.clone(),
            time_span: self.time_span,
            average_messages_per_day: self.average_messages_per_day,
            text_message_count: self.text_messages.len(),
            media_message_count: self.media_messages.len(),
        }
    }
}

/// Structural statistics of a chat, as written to reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub participants: Vec<String>,
    pub message_count: usize,
    pub messages_by_participant: IndexMap<String, usize>,
    pub time_span: TimeSpan,
    pub average_messages_per_day: u64,
    pub text_message_count: usize,
    pub media_message_count: usize,
}

fn average_per_day(count: usize, duration_days: u64) -> u64 {
    (count as f64 / duration_days.max(1) as f64).round() as u64
}
