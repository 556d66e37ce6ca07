//! Registry configuration.
//!
//! Configuration-driven naming and broadcast behavior.

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Names the registry itself occupies; no plugin may be attached under them.
pub const RESERVED_NAMES: &[&str] = &[
    "plugins",
    "extend",
    "addHandlers",
    "add_handlers",
    "extFN",
    "shared",
];

/// What a broadcast does when a plugin's handler fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastPolicy {
    /// Log the failure, record it and continue with the next plugin
    #[default]
    Isolate,
    /// Abort the remaining broadcast on the first failure
    FailFast,
}

/// Registry configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Prefix used by `qualified_name`
    pub prefix: String,
    /// Extra names to reserve on top of [`RESERVED_NAMES`]
    pub reserved_names: Vec<String>,
    /// Handler failure policy for `add_handlers`
    pub broadcast_policy: BroadcastPolicy,
    /// Number of diagnostics kept in memory
    pub diagnostics_capacity: usize,
}

impl RegistryConfig {
    /// Set the qualified name prefix.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Reserve an extra name.
    pub fn with_reserved_name(mut self, name: &str) -> Self {
        self.reserved_names.push(name.to_string());
        self
    }

    /// Set the broadcast policy.
    pub fn with_broadcast_policy(mut self, policy: BroadcastPolicy) -> Self {
        self.broadcast_policy = policy;
        self
    }

    /// Set the diagnostics buffer size.
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    /// Load configuration from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the registry cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(Error::InvalidConfig("prefix must not be empty".to_string()));
        }
        if self.diagnostics_capacity == 0 {
            return Err(Error::InvalidConfig(
                "diagnostics_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `name` is taken by the registry itself.
    pub fn is_reserved(&self, name: &str) -> bool {
        RESERVED_NAMES.contains(&name) || self.reserved_names.iter().any(|n| n == name)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prefix: "MX".to_string(),
            reserved_names: Vec::new(),
            broadcast_policy: BroadcastPolicy::Isolate,
            diagnostics_capacity: 1000,
        }
    }
}
