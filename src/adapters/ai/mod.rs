//! AI adapter module. Implements AnalysisProvider for LLM backends.
//!
//! Provides Gemini, OpenAI-compatible and mock providers, plus the helpers every provider
//! call shares: prompt CSV rendering, reply parsing and HTTP error classification.

pub mod csv_utils;
pub mod gemini_adapter;
pub mod http_errors;
pub mod mock_adapter;
pub mod openai_adapter;
pub mod registry;
pub mod response;

pub use csv_utils::messages_to_csv;
pub use gemini_adapter::GeminiAdapter;
pub use mock_adapter::MockAdapter;
pub use openai_adapter::OpenAiAdapter;
pub use registry::{
    ProviderCredentials, build_providers, build_verified_providers, is_usable_key,
    verify_providers,
};
pub use response::{parse_analysis, strip_code_fences};
