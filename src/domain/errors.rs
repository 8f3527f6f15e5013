//! Domain errors. Used by ports, adapters and use cases.
//!
//! Adapters map infrastructure errors (HTTP, JSON, IO) into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// The chat export is malformed or has no usable `messages` array.
    #[error("Invalid chat export: {0}")]
    Format(String),

    /// An empty collection was given where at least one chat is required.
    #[error("No chat data to combine")]
    NoData,

    /// An empty collection was given where at least one analysis is required.
    #[error("No analyses to aggregate")]
    NoAnalyses,

    /// Provider reply was not valid JSON or lacked the required top-level keys.
    /// `raw` keeps the original reply for diagnostics.
    #[error("Failed to parse analysis response: {message}")]
    Parse { message: String, raw: String },

    /// Backend call failed. Only `transient` (overload/timeout) errors are retried.
    #[error("Provider '{provider}' failed: {message}")]
    Provider {
        provider: String,
        message: String,
        transient: bool,
    },

    #[error("No analysis provider configured (set at least one usable API key)")]
    NoProviderConfigured,

    /// A chunk failed permanently (non-transient error or retries exhausted).
    #[error("Chunk {chunk_index} failed after {attempts} attempt(s): {source}")]
    ChunkFailed {
        chunk_index: usize,
        attempts: usize,
        #[source]
        source: Box<DomainError>,
    },

    /// A whole file's analysis failed; the originating error is preserved.
    #[error("File {file_index} failed: {source}")]
    FileFailed {
        file_index: usize,
        #[source]
        source: Box<DomainError>,
    },

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DomainError {
    /// Shorthand for a non-transient provider failure.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Shorthand for a transient (overloaded / timed out) provider failure.
    pub fn overloaded(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// True only for backend-reported temporary unavailability. The retry predicate.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Provider {
                transient: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_provider_errors_are_retryable() {
        assert!(DomainError::overloaded("gemini", "503 overloaded").is_transient());
        assert!(!DomainError::provider("gemini", "401").is_transient());
        let parse = DomainError::Parse {
            message: "eof".into(),
            raw: "{".into(),
        };
        assert!(!parse.is_transient());
    }

    #[test]
    fn test_chunk_failure_keeps_source_message() {
        let err = DomainError::ChunkFailed {
            chunk_index: 2,
            attempts: 4,
            source: Box::new(DomainError::overloaded("gemini", "model is overloaded")),
        };
        let text = err.to_string();
        assert!(text.contains("Chunk 2"));
        assert!(text.contains("4 attempt"));
        assert!(text.contains("model is overloaded"));
    }
}
