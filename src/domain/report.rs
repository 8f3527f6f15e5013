//! Final report written after a run.

use crate::domain::schema::SCHEMA_VERSION;
use crate::domain::{AnalysisResult, ChatSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One analyzed chat (or the combined view of several) plus its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub name: String,
    pub chat: ChatSummary,
    pub analysis: AnalysisResult,
    pub category_scores: BTreeMap<String, u32>,
}

impl FileReport {
    pub fn new(name: impl Into<String>, chat: ChatSummary, analysis: AnalysisResult) -> Self {
        let category_scores = analysis.category_scores();
        Self {
            name: name.into(),
            chat,
            analysis,
            category_scores,
        }
    }
}

/// Batch report. `analysis` is the aggregate over every entry in `files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    pub analysis: AnalysisResult,
    pub category_scores: BTreeMap<String, u32>,
}

impl AnalysisReport {
    pub fn new(files: Vec<FileReport>, analysis: AnalysisResult) -> Self {
        let category_scores = analysis.category_scores();
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            files,
            analysis,
            category_scores,
        }
    }
}
