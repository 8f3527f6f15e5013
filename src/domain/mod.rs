//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here: normalized chats, chunking, the analysis model,
//! its canonical schema and the aggregation policy. Dependencies flow inward.

pub mod analysis;
pub mod chunker;
pub mod entities;
pub mod errors;
pub mod report;
pub mod schema;

pub use analysis::{AnalysisResult, Metric, aggregate};
pub use chunker::{ChunkPolicy, chunk_messages, estimate_tokens};
pub use entities::{ChatSummary, MS_PER_DAY, MediaKind, Message, ParsedChatData, TimeSpan};
pub use errors::DomainError;
pub use report::{AnalysisReport, FileReport};
