//! Common types used across the host modules.

use serde::{Deserialize, Serialize};

/// Name a plugin is attached under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    /// Parse a namespace, rejecting empty or blank names.
    pub fn parse(name: &str) -> Option<Self> {
        if name.trim().is_empty() {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    /// Get the namespace as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Plugin settings: option name to value.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
