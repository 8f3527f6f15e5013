//! Persistence adapters. Implement ResultStorePort.

pub mod report_json;

pub use report_json::ReportJson;
