//! Implements ResultStorePort using a pretty-printed JSON file.

use crate::domain::{AnalysisReport, DomainError};
use crate::ports::ResultStorePort;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// JSON file-based report storage. Every save replaces the file.
pub struct ReportJson {
    path: PathBuf,
}

impl ReportJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a previously saved report.
    pub async fn load(&self) -> Result<AnalysisReport, DomainError> {
        let s = fs::read_to_string(&self.path)
            .await
            .map_err(|e| DomainError::Repo(format!("read report: {}", e)))?;
        serde_json::from_str(&s).map_err(|e| DomainError::Repo(format!("decode report: {}", e)))
    }

    /// Atomic save using write-replace:
    /// 1. Write to temp file
    /// 2. sync_all() to flush to disk
    /// 3. Rename over the target path
    async fn write_atomic(&self, json: &str) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Repo(format!("create report dir: {}", e)))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Repo(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Repo(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Repo(format!("sync temp file: {}", e)))?;
        drop(f); // Close file handle before rename

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Repo(format!("atomic rename failed: {}", e)))
    }
}

#[async_trait::async_trait]
impl ResultStorePort for ReportJson {
    async fn save_report(&self, report: &AnalysisReport) -> Result<PathBuf, DomainError> {
        let json =
            serde_json::to_string_pretty(report).map_err(|e| DomainError::Repo(e.to_string()))?;
        self.write_atomic(&json).await?;
        info!(path = %self.path.display(), bytes = json.len(), "report saved");
        Ok(self.path.clone())
    }
}
