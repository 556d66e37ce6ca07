//! Structured diagnostics for the registry.
//!
//! Every diagnostic is forwarded to `tracing` and kept in a bounded buffer so
//! embedders can inspect what the registry reported.

use crate::core::{now, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level
    Error = 4,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// A structured log entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp
    pub timestamp: Timestamp,
    /// Log level
    pub level: LogLevel,
    /// Message
    pub message: String,
    /// Namespace the entry concerns, if any
    pub namespace: Option<String>,
    /// Structured fields
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: now(),
            level,
            message: message.into(),
            namespace: None,
            fields: HashMap::new(),
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Add a field.
    pub fn with_field(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.to_string(), v);
        }
        self
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as text.
    pub fn to_text(&self) -> String {
        let ns = self.namespace.as_deref().unwrap_or("-");
        let fields_str = if self.fields.is_empty() {
            String::new()
        } else {
            format!(" {:?}", self.fields)
        };

        format!(
            "{} {} [{}] {}{}",
            self.timestamp, self.level, ns, self.message, fields_str
        )
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Plain text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Subscriber configuration.
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub filter: String,
    /// Output format
    pub format: LogFormat,
    /// Include the event target
    pub with_target: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            filter: "mx_host=info".to_string(),
            format: LogFormat::Text,
            with_target: true,
        }
    }
}

/// Install a global `tracing` subscriber.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing(config: &LoggerConfig) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.filter));

    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(config.with_target)
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(config.with_target)
            .compact()
            .try_init()
            .is_ok(),
    }
}

/// `tracing` target for every diagnostic the registry reports.
pub const TARGET: &str = "mx_host::plugin::registry";

/// Bounded buffer of registry diagnostics.
pub struct DiagnosticLog {
    buffer: RwLock<VecDeque<LogEntry>>,
    max_buffer: usize,
}

impl DiagnosticLog {
    /// Create a log that keeps at most `max_buffer` entries.
    pub fn new(max_buffer: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::new()),
            max_buffer: max_buffer.max(1),
        }
    }

    /// Record an entry and emit it through `tracing`.
    pub fn log(&self, entry: LogEntry) {
        let ns = entry.namespace.as_deref().unwrap_or_default();
        let fields = &entry.fields;
        match entry.level {
            LogLevel::Trace => {
                tracing::trace!(target: TARGET, namespace = ns, fields = ?fields, "{}", entry.message)
            }
            LogLevel::Debug => {
                tracing::debug!(target: TARGET, namespace = ns, fields = ?fields, "{}", entry.message)
            }
            LogLevel::Info => {
                tracing::info!(target: TARGET, namespace = ns, fields = ?fields, "{}", entry.message)
            }
            LogLevel::Warn => {
                tracing::warn!(target: TARGET, namespace = ns, fields = ?fields, "{}", entry.message)
            }
            LogLevel::Error => {
                tracing::error!(target: TARGET, namespace = ns, fields = ?fields, "{}", entry.message)
            }
        }

        let mut buffer = self.buffer.write().unwrap_or_else(|e| e.into_inner());
        if buffer.len() >= self.max_buffer {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }

    /// Log at debug level.
    pub fn debug(&self, namespace: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Debug, message).with_namespace(namespace));
    }

    /// Log at info level.
    pub fn info(&self, namespace: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, message).with_namespace(namespace));
    }

    /// Log at warn level.
    pub fn warn(&self, namespace: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warn, message).with_namespace(namespace));
    }

    /// Log at error level.
    pub fn error(&self, namespace: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Error, message).with_namespace(namespace));
    }

    /// Get buffered entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Get entries at or above a level.
    pub fn entries_at_level(&self, min_level: LogLevel) -> Vec<LogEntry> {
        self.buffer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.level >= min_level)
            .cloned()
            .collect()
    }

    /// Clear the buffer.
    pub fn clear(&self) {
        self.buffer.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(1000)
    }
}
