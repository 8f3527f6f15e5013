//! Provider registry: validated credentials in, constructed provider list out.
//!
//! A provider whose key is missing or unusable is excluded with a warning; an empty result is
//! `DomainError::NoProviderConfigured`. `build_verified_providers` additionally asks each
//! backend to accept its key before the run starts.

use crate::adapters::ai::gemini_adapter::GeminiAdapter;
use crate::adapters::ai::openai_adapter::OpenAiAdapter;
use crate::domain::DomainError;
use crate::ports::AnalysisProvider;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Provider credentials and per-provider model overrides.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: Option<String>,
    pub together_api_key: Option<String>,
    pub together_model: Option<String>,
    /// Sent as OpenRouter attribution (`HTTP-Referer`).
    pub site_url: Option<String>,
}

/// Offline sanity check: non-empty, no whitespace.
pub fn is_usable_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(char::is_whitespace)
}

/// Build the configured providers in fixed order: gemini, openrouter, together.
pub fn build_providers(
    creds: &ProviderCredentials,
) -> Result<Vec<Arc<dyn AnalysisProvider>>, DomainError> {
    let mut providers: Vec<Arc<dyn AnalysisProvider>> = Vec::new();

    if let Some(key) = usable("gemini", creds.gemini_api_key.as_deref()) {
        let gemini = GeminiAdapter::new(key, creds.gemini_model.clone());
        info!(model = gemini.model(), "gemini configured");
        providers.push(Arc::new(gemini));
    }
    if let Some(key) = usable("openrouter", creds.openrouter_api_key.as_deref()) {
        let openrouter = OpenAiAdapter::openrouter(
            key,
            creds.openrouter_model.clone(),
            creds.site_url.clone(),
        );
        info!(model = openrouter.model(), "openrouter configured");
        providers.push(Arc::new(openrouter));
    }
    if let Some(key) = usable("together", creds.together_api_key.as_deref()) {
        let together = OpenAiAdapter::together(key, creds.together_model.clone());
        info!(model = together.model(), "together configured");
        providers.push(Arc::new(together));
    }

    if providers.is_empty() {
        return Err(DomainError::NoProviderConfigured);
    }

    let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
    info!(providers = ?names, "analysis providers configured");
    Ok(providers)
}

/// `build_providers`, then drop every provider whose key the backend rejects.
///
/// Transient failures (overload, timeouts) keep the provider: the key is not proven bad.
pub async fn build_verified_providers(
    creds: &ProviderCredentials,
) -> Result<Vec<Arc<dyn AnalysisProvider>>, DomainError> {
    verify_providers(build_providers(creds)?).await
}

/// Validate all keys concurrently and keep the providers that pass.
pub async fn verify_providers(
    providers: Vec<Arc<dyn AnalysisProvider>>,
) -> Result<Vec<Arc<dyn AnalysisProvider>>, DomainError> {
    let checks = join_all(providers.iter().map(|p| p.validate_key())).await;

    let verified: Vec<Arc<dyn AnalysisProvider>> = providers
        .into_iter()
        .zip(checks)
        .filter_map(|(provider, check)| match check {
            Ok(()) => Some(provider),
            Err(e) if e.is_transient() => {
                warn!(provider = provider.name(), error = %e, "key check inconclusive, keeping");
                Some(provider)
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "excluding provider, key rejected");
                None
            }
        })
        .collect();

    if verified.is_empty() {
        return Err(DomainError::NoProviderConfigured);
    }
    let names: Vec<&str> = verified.iter().map(|p| p.name()).collect();
    info!(providers = ?names, "provider keys verified");
    Ok(verified)
}

fn usable(provider: &str, key: Option<&str>) -> Option<String> {
    match key {
        None => None,
        Some(k) if is_usable_key(k) => Some(k.to_string()),
        Some(_) => {
            warn!(provider, "ignoring unusable API key (empty or contains whitespace)");
            None
        }
    }
}
