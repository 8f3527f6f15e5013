//! Port traits. API boundaries for the hexagon.
//!
//! - Outbound: called by the application into infrastructure (LLM backends, report storage)

pub mod outbound;

pub use outbound::{AnalysisProvider, ResultStorePort};
