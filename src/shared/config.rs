//! Application configuration. Provider credentials, pipeline pacing, output path.
//!
//! Read from `CHAT_INSIGHT_*` environment variables (a `.env` file is honored) and, optionally,
//! the file named by `CHAT_INSIGHT_CONFIG`.

use crate::adapters::ai::ProviderCredentials;
use crate::domain::ChunkPolicy;
use crate::usecases::{AnalysisOptions, DispatchMode, RateLimit, RetryPolicy};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 30;
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 5000;
/// Minimum spacing between two requests to the same provider.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 6000;
pub const DEFAULT_REQUESTS_PER_MINUTE: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OUTPUT_PATH: &str = "./analysis.json";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Provider credentials
    // ─────────────────────────────────────────────────────────────────────────
    /// Gemini API key. Read from CHAT_INSIGHT_GEMINI_API_KEY or GOOGLE_AI_API_KEY.
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default)]
    pub gemini_model: Option<String>,

    /// OpenRouter API key. Read from CHAT_INSIGHT_OPENROUTER_API_KEY or OPENAI_API_KEY.
    #[serde(default)]
    pub openrouter_api_key: Option<String>,

    #[serde(default)]
    pub openrouter_model: Option<String>,

    /// Together AI API key. Read from CHAT_INSIGHT_TOGETHER_API_KEY or TOGETHER_API_KEY.
    #[serde(default)]
    pub together_api_key: Option<String>,

    #[serde(default)]
    pub together_model: Option<String>,

    /// Public site URL sent to OpenRouter as attribution.
    #[serde(default)]
    pub site_url: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────────
    /// Messages per chunk (default 30). Ignored when `max_tokens_per_chunk` is set.
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Estimated token budget per chunk; switches chunking to token mode.
    #[serde(default)]
    pub max_tokens_per_chunk: Option<usize>,

    /// Retries after the first attempt on transient failures (default 3).
    #[serde(default)]
    pub max_retries: Option<usize>,

    #[serde(default)]
    pub retry_base_delay_ms: Option<u64>,

    #[serde(default)]
    pub request_delay_ms: Option<u64>,

    #[serde(default)]
    pub requests_per_minute: Option<usize>,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// `round_robin` (default) or `fan_out`.
    #[serde(default)]
    pub dispatch_mode: Option<DispatchMode>,

    #[serde(default)]
    pub continue_on_file_error: Option<bool>,

    #[serde(default)]
    pub combine_files: Option<bool>,

    /// Check every API key against its provider before analyzing (default false).
    #[serde(default)]
    pub verify_keys: Option<bool>,

    /// Fall back to demo output when no provider is configured (default true).
    #[serde(default)]
    pub demo_fallback: Option<bool>,

    #[serde(default)]
    pub output_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("CHAT_INSIGHT"));
        if let Ok(path) = std::env::var("CHAT_INSIGHT_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    /// Credentials with the conventional provider env vars as fallback.
    pub fn credentials(&self) -> ProviderCredentials {
        self.credentials_with(|name| std::env::var(name).ok())
    }

    /// Credentials, resolving fallbacks through `lookup`.
    pub fn credentials_with(&self, lookup: impl Fn(&str) -> Option<String>) -> ProviderCredentials {
        ProviderCredentials {
            gemini_api_key: self.gemini_api_key.clone().or_else(|| lookup("GOOGLE_AI_API_KEY")),
            gemini_model: self.gemini_model.clone(),
            openrouter_api_key: self
                .openrouter_api_key
                .clone()
                .or_else(|| lookup("OPENAI_API_KEY")),
            openrouter_model: self.openrouter_model.clone(),
            together_api_key: self
                .together_api_key
                .clone()
                .or_else(|| lookup("TOGETHER_API_KEY")),
            together_model: self.together_model.clone(),
            site_url: self.site_url.clone(),
        }
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        match self.max_tokens_per_chunk {
            Some(tokens) => ChunkPolicy::MaxTokens(tokens),
            None => ChunkPolicy::MaxMessages(self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)),
        }
    }

    pub fn max_retries_or_default(&self) -> usize {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn retry_base_delay_ms_or_default(&self) -> u64 {
        self.retry_base_delay_ms.unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS)
    }

    pub fn request_delay_ms_or_default(&self) -> u64 {
        self.request_delay_ms.unwrap_or(DEFAULT_REQUEST_DELAY_MS)
    }

    pub fn requests_per_minute_or_default(&self) -> usize {
        self.requests_per_minute.unwrap_or(DEFAULT_REQUESTS_PER_MINUTE)
    }

    pub fn request_timeout_secs_or_default(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn verify_keys_or_default(&self) -> bool {
        self.verify_keys.unwrap_or(false)
    }

    pub fn demo_fallback_or_default(&self) -> bool {
        self.demo_fallback.unwrap_or(true)
    }

    pub fn output_path_or_default(&self) -> String {
        self.output_path
            .clone()
            .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string())
    }

    /// Pipeline options assembled from the settings above.
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            chunk_policy: self.chunk_policy(),
            retry: RetryPolicy::new(
                self.max_retries_or_default(),
                Duration::from_millis(self.retry_base_delay_ms_or_default()),
            ),
            rate_limit: RateLimit {
                requests_per_minute: self.requests_per_minute_or_default(),
                min_delay: Duration::from_millis(self.request_delay_ms_or_default()),
            },
            request_timeout: Duration::from_secs(self.request_timeout_secs_or_default()),
            dispatch_mode: self.dispatch_mode.unwrap_or_default(),
            continue_on_file_error: self.continue_on_file_error.unwrap_or(false),
            combine_files: self.combine_files.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = AppConfig::default().analysis_options();
        assert_eq!(options.chunk_policy, ChunkPolicy::MaxMessages(30));
        assert_eq!(options.retry, RetryPolicy::new(3, Duration::from_millis(5000)));
        assert_eq!(options.rate_limit.requests_per_minute, 10);
        assert_eq!(options.rate_limit.min_delay, Duration::from_millis(6000));
        assert_eq!(options.request_timeout, Duration::from_secs(120));
        assert_eq!(options.dispatch_mode, DispatchMode::RoundRobin);
        assert!(!options.continue_on_file_error);
        assert!(AppConfig::default().demo_fallback_or_default());
        assert!(!AppConfig::default().verify_keys_or_default());
    }

    #[test]
    fn test_verify_keys_flag() {
        assert!(from_toml("verify_keys = true").verify_keys_or_default());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let cfg = from_toml(
            r#"
            max_tokens_per_chunk = 2000
            max_retries = 5
            dispatch_mode = "fan_out"
            combine_files = true
            output_path = "out/report.json"
            "#,
        );
        let options = cfg.analysis_options();
        assert_eq!(options.chunk_policy, ChunkPolicy::MaxTokens(2000));
        assert_eq!(options.retry.max_retries, 5);
        assert_eq!(options.dispatch_mode, DispatchMode::FanOut);
        assert!(options.combine_files);
        assert_eq!(cfg.output_path_or_default(), "out/report.json");
    }

    #[test]
    fn test_credential_fallbacks() {
        let cfg = AppConfig {
            gemini_api_key: Some("from-config".to_string()),
            ..Default::default()
        };
        let creds = cfg.credentials_with(|name| match name {
            "GOOGLE_AI_API_KEY" => Some("from-env".to_string()),
            "TOGETHER_API_KEY" => Some("tg".to_string()),
            _ => None,
        });
        assert_eq!(creds.gemini_api_key.as_deref(), Some("from-config"));
        assert_eq!(creds.together_api_key.as_deref(), Some("tg"));
        assert!(creds.openrouter_api_key.is_none());
    }
}
