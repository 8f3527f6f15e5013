//! Chat-export adapter. Reads uploaded export files and normalizes them into domain chats.

pub mod normalizer;
pub mod raw;

use crate::domain::{DomainError, ParsedChatData};
use std::path::Path;
use tokio::fs;
use tracing::info;

pub use normalizer::{ParticipantSource, normalize, normalize_at, parse_export};

/// One uploaded export: a display name plus its raw JSON text.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub name: String,
    pub contents: String,
}

impl ExportFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Read an export from disk (UTF-8 JSON).
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| DomainError::Format(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), bytes = contents.len(), "read chat export");
        Ok(Self {
            name: path.display().to_string(),
            contents,
        })
    }

    pub fn parse(&self) -> Result<ParsedChatData, DomainError> {
        parse_export(&self.contents)
    }
}
