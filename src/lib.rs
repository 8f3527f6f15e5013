//! chat-insight: Chat-export ingestion and chunked multi-provider LLM relationship analysis
//! with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
