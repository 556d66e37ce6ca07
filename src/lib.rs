//! # MX Host
//!
//! Plugin registration host for the Mobilis XMPP framework:
//! - **Registry**: attaches plugins under unique namespaces
//! - **Shared utilities**: `set_config`, `qualified_name` and a private cache on every plugin
//! - **Broadcast**: `add_handlers` across every plugin that supports it
//!
//! ## Quick Start
//!
//! ```rust
//! use mx_host::{Plugin, PluginHook, PluginResult, Registry, RegistryConfig};
//!
//! struct Roster;
//!
//! impl Plugin for Roster {
//!     fn hooks(&self) -> Vec<PluginHook> {
//!         vec![PluginHook::AddHandlers]
//!     }
//!
//!     fn add_handlers(&mut self) -> PluginResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = Registry::with_global_toolkit(RegistryConfig::default());
//! registry.extend("roster", Roster);
//! assert_eq!(&*registry["roster"].qualified_name(), "MX.roster");
//!
//! let report = registry.add_handlers().unwrap();
//! assert_eq!(report.invoked, vec!["roster"]);
//! ```

pub mod config;
pub mod core;
pub mod host;
pub mod monitoring;
pub mod plugin;

pub use crate::core::error::{Error, Result};
pub use config::{BroadcastPolicy, RegistryConfig};
pub use host::Toolkit;
pub use plugin::{
    AttachStatus, AttachedPlugin, BroadcastReport, EmptyPlugin, Plugin, PluginContext, PluginError,
    PluginHandle, PluginHook, PluginResult, PluginStatus, Registry,
};
