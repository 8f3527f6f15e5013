//! Provider gateway. Uniform dispatch to the configured analysis backends.
//!
//! Owns the round-robin cursor and the per-provider rate limiter; both are scoped to the
//! gateway instance.

use crate::domain::DomainError;
use crate::ports::AnalysisProvider;
use crate::usecases::rate_limiter::{RateLimit, RateLimiter};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ProviderGateway {
    providers: Vec<Arc<dyn AnalysisProvider>>,
    cursor: AtomicUsize,
    limiter: RateLimiter,
    timeout: Duration,
}

/// One provider's answer in a fan-out.
pub struct ProviderReply {
    pub provider: String,
    pub result: Result<String, DomainError>,
}

impl ProviderGateway {
    /// Fails fast with `NoProviderConfigured` when `providers` is empty.
    pub fn new(
        providers: Vec<Arc<dyn AnalysisProvider>>,
        limit: RateLimit,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        if providers.is_empty() {
            return Err(DomainError::NoProviderConfigured);
        }
        Ok(Self {
            providers,
            cursor: AtomicUsize::new(0),
            limiter: RateLimiter::new(limit),
            timeout,
        })
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Next provider in round-robin order.
    pub fn next_provider(&self) -> Arc<dyn AnalysisProvider> {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.providers.len();
        self.providers[idx].clone()
    }

    /// Call the named backend directly. No pacing, no timeout, errors surface unchanged.
    pub async fn analyze(&self, provider: &str, prompt: &str) -> Result<String, DomainError> {
        let backend = self
            .providers
            .iter()
            .find(|p| p.name() == provider)
            .ok_or_else(|| DomainError::provider(provider, "provider is not configured"))?;
        backend.analyze(prompt).await
    }

    /// Send `prompt` to the next round-robin provider, paced and bounded by the timeout.
    pub async fn dispatch(&self, prompt: &str) -> ProviderReply {
        let provider = self.next_provider();
        let result = self.call(provider.as_ref(), prompt).await;
        ProviderReply {
            provider: provider.name().to_string(),
            result,
        }
    }

    /// Send `prompt` to every provider concurrently. One provider's failure never blocks the rest.
    pub async fn fan_out(&self, prompt: &str) -> Vec<ProviderReply> {
        let calls = self.providers.iter().map(|provider| async move {
            let result = self.call(provider.as_ref(), prompt).await;
            if let Err(e) = &result {
                warn!(provider = provider.name(), error = %e, "provider excluded from fan-out");
            }
            ProviderReply {
                provider: provider.name().to_string(),
                result,
            }
        });
        join_all(calls).await
    }

    async fn call(
        &self,
        provider: &dyn AnalysisProvider,
        prompt: &str,
    ) -> Result<String, DomainError> {
        let name = provider.name();
        self.limiter.acquire(name).await;
        debug!(provider = name, "dispatching prompt");

        match tokio::time::timeout(self.timeout, provider.analyze(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                info!(
                    provider = name,
                    timeout_secs = self.timeout.as_secs(),
                    "provider call timed out"
                );
                Err(DomainError::overloaded(
                    name,
                    format!("no response within {}s", self.timeout.as_secs()),
                ))
            }
        }
    }
}
