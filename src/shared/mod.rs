//! Cross-cutting application settings.

pub mod config;
