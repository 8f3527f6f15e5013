//! Splits a message sequence into bounded, order-preserving chunks for LLM context limits.

use crate::domain::Message;
use serde::{Deserialize, Serialize};

/// Chunk size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPolicy {
    /// At most N messages per chunk.
    MaxMessages(usize),
    /// At most N estimated tokens per chunk (see [`estimate_tokens`]).
    MaxTokens(usize),
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self::MaxMessages(30)
    }
}

/// Rough token estimate: ceil(chars / 4) of the message text. Not a tokenizer.
pub fn estimate_tokens(msg: &Message) -> usize {
    msg.text.as_deref().map_or(0, |t| t.chars().count().div_ceil(4))
}

/// Split `messages` into contiguous slices under `policy`.
///
/// Never yields an empty chunk and never reorders; concatenating the chunks gives back the input.
/// A message larger than the token budget on its own gets a chunk to itself.
pub fn chunk_messages(messages: &[Message], policy: ChunkPolicy) -> Vec<&[Message]> {
    if messages.is_empty() {
        return Vec::new();
    }
    match policy {
        ChunkPolicy::MaxMessages(n) => messages.chunks(n.max(1)).collect(),
        ChunkPolicy::MaxTokens(budget) => {
            let mut chunks = Vec::new();
            let mut start = 0usize;
            let mut used = 0usize;
            for (i, msg) in messages.iter().enumerate() {
                let cost = estimate_tokens(msg);
                if i > start && used + cost > budget {
                    chunks.push(&messages[start..i]);
                    start = i;
                    used = 0;
                }
                used += cost;
            }
            chunks.push(&messages[start..]);
            chunks
        }
    }
}
