//! Infrastructure adapters. Implement outbound ports.
//!
//! Chat exports, LLM backends, report storage, terminal UI. Map errors to DomainError.

pub mod ai;
pub mod export;
pub mod persistence;
pub mod ui;
