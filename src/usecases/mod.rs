//! Application use cases. Orchestrate domain logic via ports.

pub mod analysis_service;
pub mod gateway;
pub mod prompt;
pub mod rate_limiter;
pub mod retry;

pub use analysis_service::{AnalysisOptions, AnalysisService, DispatchMode, ProgressFn};
pub use gateway::{ProviderGateway, ProviderReply};
pub use prompt::PromptBuilder;
pub use rate_limiter::{RateLimit, RateLimiter};
pub use retry::{RetryFailure, RetryPolicy};
