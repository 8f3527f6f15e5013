//! OpenAI-compatible adapter for AI analysis.
//!
//! Serves OpenRouter, Together AI and any other `/chat/completions` endpoint.
//! Implements `AnalysisProvider` as a thin pass-through: one user prompt, one text reply.

use crate::adapters::ai::http_errors::{classify_status, classify_transport};
use crate::domain::DomainError;
use crate::ports::AnalysisProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
/// OpenRouter's model list is public; this endpoint requires the key.
pub const OPENROUTER_KEY_URL: &str = "https://openrouter.ai/api/v1/auth/key";
pub const OPENROUTER_DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";
pub const TOGETHER_API_URL: &str = "https://api.together.xyz/v1/chat/completions";
pub const TOGETHER_DEFAULT_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free";

/// OpenAI-compatible AI adapter.
///
/// Can be configured to work with:
/// - OpenRouter (openrouter.ai), optionally with attribution headers
/// - Together AI (api.together.xyz)
/// - Any OpenAI-compatible API
pub struct OpenAiAdapter {
    name: String,
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    extra_headers: Vec<(String, String)>,
    key_check_url: Option<String>,
}

impl OpenAiAdapter {
    /// Create a new OpenAI-compatible adapter.
    ///
    /// # Arguments
    /// * `name` - Provider name used in logs and rate-limit bookkeeping
    /// * `api_url` - Chat completions endpoint
    /// * `api_key` - Bearer token
    /// * `model` - Model name
    pub fn new(name: &str, api_url: String, api_key: String, model: String) -> Self {
        Self {
            name: name.to_string(),
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
            extra_headers: Vec::new(),
            key_check_url: None,
        }
    }

    /// OpenRouter. With a `site_url`, sends the `HTTP-Referer`/`X-Title` attribution headers.
    pub fn openrouter(api_key: String, model: Option<String>, site_url: Option<String>) -> Self {
        let mut adapter = Self::new(
            "openrouter",
            OPENROUTER_API_URL.to_string(),
            api_key,
            model.unwrap_or_else(|| OPENROUTER_DEFAULT_MODEL.to_string()),
        )
        .with_key_check_url(OPENROUTER_KEY_URL);
        if let Some(url) = site_url {
            adapter = adapter
                .with_header("HTTP-Referer", &url)
                .with_header("X-Title", "Chat Analysis App");
        }
        adapter
    }

    pub fn together(api_key: String, model: Option<String>) -> Self {
        Self::new(
            "together",
            TOGETHER_API_URL.to_string(),
            api_key,
            model.unwrap_or_else(|| TOGETHER_DEFAULT_MODEL.to_string()),
        )
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.extra_headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Endpoint used by `validate_key` instead of `<root>/models`.
    pub fn with_key_check_url(mut self, url: &str) -> Self {
        self.key_check_url = Some(url.to_string());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Model listing endpoint next to the completions endpoint, unless overridden.
    fn models_url(&self) -> String {
        if let Some(url) = &self.key_check_url {
            return url.clone();
        }
        let root = self.api_url.trim_end_matches('/');
        let root = root.strip_suffix("/chat/completions").unwrap_or(root);
        format!("{}/models", root)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        for (key, value) in &self.extra_headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }
}

/// OpenAI API request structure.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI API response structure.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[async_trait::async_trait]
impl AnalysisProvider for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, prompt: &str) -> Result<String, DomainError> {
        info!(
            provider = %self.name,
            model = %self.model,
            prompt_len = prompt.len(),
            "sending prompt"
        );

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.3,
        };

        let response = self
            .authorized(self.client.post(&self.api_url))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.name, status, &text));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            DomainError::provider(&self.name, format!("Failed to parse API response: {}", e))
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| DomainError::provider(&self.name, "No content received"))?;

        debug!(provider = %self.name, raw_len = content.len(), "received completion");
        Ok(content)
    }

    async fn validate_key(&self) -> Result<(), DomainError> {
        let response = self
            .authorized(self.client.get(self.models_url()))
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.name, status, &text));
        }
        debug!(provider = %self.name, "key accepted");
        Ok(())
    }
}
