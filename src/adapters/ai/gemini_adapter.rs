//! Google Gemini adapter (`generateContent` REST endpoint).

use crate::adapters::ai::http_errors::{classify_status, classify_transport};
use crate::domain::DomainError;
use crate::ports::AnalysisProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini provider. The API key travels as a query parameter.
pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiAdapter {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self::with_base_url(GEMINI_API_BASE.to_string(), api_key, model)
    }

    /// Point at a different API root (proxies, tests).
    pub fn with_base_url(base_url: String, api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn models_endpoint(&self) -> String {
        format!("{}/models", self.base_url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[async_trait::async_trait]
impl AnalysisProvider for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, prompt: &str) -> Result<String, DomainError> {
        info!(model = %self.model, prompt_len = prompt.len(), "sending prompt to Gemini");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(self.name(), &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(self.name(), status, &text));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            DomainError::provider(self.name(), format!("Failed to parse API response: {}", e))
        })?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(DomainError::provider(self.name(), "Empty response from model"));
        }

        debug!(raw_len = text.len(), "received Gemini completion");
        Ok(text)
    }

    async fn validate_key(&self) -> Result<(), DomainError> {
        let response = self
            .client
            .get(self.models_endpoint())
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| classify_transport(self.name(), &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(self.name(), status, &text));
        }
        debug!("Gemini key accepted");
        Ok(())
    }
}
