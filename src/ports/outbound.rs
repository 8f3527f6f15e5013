//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{AnalysisReport, DomainError};
use std::path::PathBuf;

/// A text-generation backend: one prompt in, one completion out.
///
/// Implementations are stateless apart from their HTTP client; rate limiting, retries and
/// timeouts are applied by the gateway and orchestrator, never here.
#[async_trait::async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Stable provider name (e.g. "gemini"). Keys rate-limit bookkeeping.
    fn name(&self) -> &str;

    /// Send `prompt` and return the raw completion text.
    ///
    /// Errors: `DomainError::Provider` with `transient = true` only for overload/timeouts.
    async fn analyze(&self, prompt: &str) -> Result<String, DomainError>;

    /// Cheap authenticated call that proves the credentials work. Backends without
    /// credentials accept by default.
    async fn validate_key(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Persistence port for finished reports.
#[async_trait::async_trait]
pub trait ResultStorePort: Send + Sync {
    /// Persist `report` and return where it was written.
    async fn save_report(&self, report: &AnalysisReport) -> Result<PathBuf, DomainError>;
}
