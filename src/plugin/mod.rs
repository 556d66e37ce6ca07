//! Plugin Module
//!
//! Provides the extension mechanism of the host:
//! - Plugin interface with optional lifecycle hooks
//! - Shared utilities composed into every attached plugin
//! - Plugin registry

pub mod interface;
pub mod registry;
pub mod shared;

pub use interface::{
    EmptyPlugin, Plugin, PluginContext, PluginError, PluginHook, PluginInfo, PluginResult,
};
pub use registry::{AttachStatus, BroadcastReport, PluginHandle, Registry};
pub use shared::{AttachedPlugin, PluginCache, PluginStatus};
