//! Mock provider for demo runs and testing without API calls.
//!
//! Returns a fixed, schema-complete analysis reply.

use crate::domain::DomainError;
use crate::domain::schema::{DESCRIPTIVE_FIELDS, score_keys};
use crate::ports::AnalysisProvider;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::info;

/// Mock provider.
///
/// Replies with demo data without making API calls.
/// Simulates network latency with configurable delay.
pub struct MockAdapter {
    /// Simulated network delay in milliseconds.
    delay_ms: u64,
}

impl MockAdapter {
    /// Create a new mock adapter with default delay (100ms).
    pub fn new() -> Self {
        Self { delay_ms: 100 }
    }

    /// Create a mock adapter with custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// The demo reply: every descriptive field flagged as demo text, every score in 60..95.
pub fn demo_reply() -> Value {
    let descriptive: Map<String, Value> = DESCRIPTIVE_FIELDS
        .iter()
        .map(|(key, _)| {
            (
                key.to_string(),
                Value::String("[DEMO] No API key configured; this is sample output.".to_string()),
            )
        })
        .collect();

    let mut quantitative: Map<String, Value> = score_keys()
        .enumerate()
        .map(|(i, key)| (key.to_string(), json!(60 + (i * 7) % 35)))
        .collect();
    quantitative.insert(
        "emotion_scores".to_string(),
        json!({"positive": 70, "negative": 10, "neutral": 20}),
    );

    json!({
        "descriptive": descriptive,
        "quantitative": quantitative,
    })
}

#[async_trait::async_trait]
impl AnalysisProvider for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, prompt: &str) -> Result<String, DomainError> {
        info!(prompt_len = prompt.len(), "[MOCK] Simulating AI analysis");

        // Simulate network delay
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        Ok(demo_reply().to_string())
    }
}
