//! Terminal UI adapters.

pub mod progress;

pub use progress::ProgressReporter;
