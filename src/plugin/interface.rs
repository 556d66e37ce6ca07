//! Plugin interface definition.
//!
//! Defines the interface plugins must implement. Both lifecycle hooks are
//! optional; a plugin declares which ones it supports through [`Plugin::hooks`].

use crate::core::{Namespace, Settings};
use crate::plugin::registry::{PluginHandle, Registry};
use serde::{Deserialize, Serialize};

/// Plugin information.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Human readable name
    pub name: String,
    /// Description
    pub description: String,
}

impl PluginInfo {
    /// Create new plugin info.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }
}

/// Context passed to [`Plugin::init`].
///
/// By the time `init` runs the plugin is registered, so the registry already
/// resolves its namespace.
pub struct PluginContext<'a> {
    namespace: &'a Namespace,
    registry: &'a Registry,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(namespace: &'a Namespace, registry: &'a Registry) -> Self {
        Self { namespace, registry }
    }

    /// Namespace the plugin was attached under.
    pub fn namespace(&self) -> &Namespace {
        self.namespace
    }

    /// Read access to the registry for cross-plugin lookups.
    ///
    /// A broadcast started from here reports this plugin as failed ("busy")
    /// instead of calling back into it.
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// The handle of the plugin being initialized.
    ///
    /// Only the shared utilities (`qualified_name`, `set_config`, `settings`)
    /// are safe to call on it from inside `init`; `with_plugin` would deadlock
    /// and `try_with_plugin` returns `None`.
    pub fn handle(&self) -> Option<&PluginHandle> {
        self.registry.get(self.namespace.as_str())
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Plugin-specific error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginError {
    /// Error message
    pub message: String,
    /// Error code
    pub code: i32,
    /// Is recoverable
    pub recoverable: bool,
}

impl PluginError {
    /// Create a new error.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            code: -1,
            recoverable: true,
        }
    }

    /// Create a fatal error.
    pub fn fatal(message: &str) -> Self {
        Self {
            message: message.to_string(),
            code: -1,
            recoverable: false,
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PluginError: {}", self.message)
    }
}

impl std::error::Error for PluginError {}

/// Lifecycle hooks a plugin can opt into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginHook {
    /// Run once, right after attachment
    Init,
    /// Run on every `Registry::add_handlers` broadcast
    AddHandlers,
}

/// Plugin trait that all plugins must implement.
///
/// Every method has a default, so an empty `impl Plugin for T {}` is a valid
/// plugin with no hooks.
pub trait Plugin: Send + Sync {
    /// Get plugin info.
    fn info(&self) -> PluginInfo {
        PluginInfo::default()
    }

    /// Get supported hooks.
    fn hooks(&self) -> Vec<PluginHook> {
        Vec::new()
    }

    /// Settings the plugin starts with; `set_config` merges into these.
    fn default_settings(&self) -> Settings {
        Settings::new()
    }

    /// Initialize the plugin. Called only if `hooks()` contains [`PluginHook::Init`].
    fn init(&mut self, _ctx: &PluginContext<'_>) -> PluginResult<()> {
        Ok(())
    }

    /// Register protocol handlers. Called only if `hooks()` contains
    /// [`PluginHook::AddHandlers`].
    fn add_handlers(&mut self) -> PluginResult<()> {
        Ok(())
    }
}

/// A plugin with no hooks and no settings.
#[derive(Debug, Default)]
pub struct EmptyPlugin;

impl Plugin for EmptyPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("empty")
    }
}
