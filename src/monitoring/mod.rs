//! Monitoring Module
//!
//! Provides observability for the registry:
//! - Structured diagnostics buffer
//! - `tracing` subscriber setup

pub mod logging;

pub use logging::{init_tracing, DiagnosticLog, LogEntry, LogFormat, LogLevel, LoggerConfig};
