//! Per-provider request pacing.
//!
//! Each provider gets a sliding 60-second window of request timestamps and a minimum spacing
//! between consecutive requests. State belongs to one limiter instance, so independent gateways
//! never share accounting.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests_per_minute: usize,
    pub min_delay: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 10,
            min_delay: Duration::from_millis(6000),
        }
    }
}

#[derive(Default)]
struct Window {
    sent: VecDeque<Instant>,
    last: Option<Instant>,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while self.sent.front().is_some_and(|t| now.duration_since(*t) >= WINDOW) {
            self.sent.pop_front();
        }
    }
}

pub struct RateLimiter {
    limit: RateLimit,
    windows: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Window>>>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    fn window(&self, provider: &str) -> Arc<tokio::sync::Mutex<Window>> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.entry(provider.to_string()).or_default().clone()
    }

    /// Wait until `provider` may be called, then record the request.
    ///
    /// Callers for the same provider are serialized; different providers never wait on each other.
    pub async fn acquire(&self, provider: &str) {
        let slot = self.window(provider);
        let mut window = slot.lock().await;
        let quota = self.limit.requests_per_minute.max(1);

        loop {
            let now = Instant::now();
            window.prune(now);
            if window.sent.len() < quota {
                break;
            }
            let Some(oldest) = window.sent.front().copied() else {
                break;
            };
            let wait = (oldest + WINDOW).saturating_duration_since(now);
            debug!(provider, wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }

        if let Some(last) = window.last {
            let ready = last + self.limit.min_delay;
            if ready > Instant::now() {
                tokio::time::sleep_until(ready).await;
            }
        }

        let now = Instant::now();
        window.sent.push_back(now);
        window.last = Some(now);
    }
}
