//! Shared utilities every attached plugin receives.
//!
//! The registry wraps each plugin in an [`AttachedPlugin`], which carries the
//! settings map, the per-plugin cache and the qualified name. A plugin's own
//! methods stay on the inner value and are never shadowed by these.

use crate::core::{now, Namespace, Settings, Timestamp};
use crate::plugin::interface::{Plugin, PluginContext, PluginError, PluginHook, PluginResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, TryLockError};

/// Cache key used by [`AttachedPlugin::qualified_name`].
pub const QUALIFIED_NAME_KEY: &str = "_toString";

/// Plugin status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginStatus {
    /// Registered, `init` not run yet
    Loaded,
    /// Registered and initialized
    Active,
    /// `init` failed
    Error(String),
}

/// Per-plugin memoization map.
#[derive(Debug, Default)]
pub struct PluginCache {
    entries: Mutex<HashMap<String, Arc<str>>>,
}

impl PluginCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached value.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Get the value for `key`, computing it with `f` on first use.
    ///
    /// `f` runs with the cache locked and must not touch this cache.
    pub fn get_or_insert_with<F>(&self, key: &str, f: F) -> Arc<str>
    where
        F: FnOnce() -> String,
    {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::from(f()))
            .clone()
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A plugin as held by the registry.
pub struct AttachedPlugin {
    namespace: Namespace,
    prefix: String,
    hooks: Vec<PluginHook>,
    plugin: Mutex<Box<dyn Plugin>>,
    settings: RwLock<Settings>,
    cache: PluginCache,
    status: RwLock<PluginStatus>,
    attached_at: Timestamp,
}

impl AttachedPlugin {
    pub(crate) fn new(namespace: Namespace, prefix: &str, plugin: Box<dyn Plugin>) -> Self {
        let hooks = plugin.hooks();
        let settings = plugin.default_settings();
        Self {
            namespace,
            prefix: prefix.to_string(),
            hooks,
            plugin: Mutex::new(plugin),
            settings: RwLock::new(settings),
            cache: PluginCache::new(),
            status: RwLock::new(PluginStatus::Loaded),
            attached_at: now(),
        }
    }

    /// Namespace the plugin is attached under.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Shallow-merge `settings` into the plugin's settings.
    ///
    /// Keys present in `settings` are set or overwritten, all others are left
    /// alone. Returns `self` so calls can be chained.
    pub fn set_config<I, K>(&self, settings: I) -> &Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
        for (key, value) in settings {
            current.insert(key.into(), value);
        }
        self
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// A single setting.
    pub fn setting(&self, key: &str) -> Option<serde_json::Value> {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// `"<prefix>.<namespace>"`, computed once and cached.
    pub fn qualified_name(&self) -> Arc<str> {
        self.cache.get_or_insert_with(QUALIFIED_NAME_KEY, || {
            format!("{}.{}", self.prefix, self.namespace)
        })
    }

    /// The plugin's private cache.
    pub fn cache(&self) -> &PluginCache {
        &self.cache
    }

    /// Whether the plugin declared `hook`.
    pub fn has_hook(&self, hook: PluginHook) -> bool {
        self.hooks.contains(&hook)
    }

    /// Current lifecycle status.
    pub fn status(&self) -> PluginStatus {
        self.status.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// When the plugin was attached.
    pub fn attached_at(&self) -> Timestamp {
        self.attached_at
    }

    /// Run `f` against the wrapped plugin.
    ///
    /// Must not be called from the plugin's own hooks.
    pub fn with_plugin<R>(&self, f: impl FnOnce(&mut dyn Plugin) -> R) -> R {
        let mut plugin = self.plugin.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut **plugin)
    }

    pub(crate) fn set_status(&self, status: PluginStatus) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = status;
    }

    pub(crate) fn run_init(&self, ctx: &PluginContext<'_>) -> PluginResult<()> {
        self.with_plugin(|plugin| plugin.init(ctx))
    }

    /// Like [`with_plugin`](Self::with_plugin), but returns `None` instead of
    /// blocking when the plugin is already locked, e.g. while its own hook runs.
    pub fn try_with_plugin<R>(&self, f: impl FnOnce(&mut dyn Plugin) -> R) -> Option<R> {
        let mut plugin = match self.plugin.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(f(&mut **plugin))
    }

    /// A broadcast reaching a plugin whose own hook is still running (for
    /// example `init` calling `add_handlers`) fails for that plugin only.
    pub(crate) fn run_add_handlers(&self) -> PluginResult<()> {
        self.try_with_plugin(|plugin| plugin.add_handlers())
            .unwrap_or_else(|| Err(PluginError::new("plugin is busy in another hook")))
    }
}

impl std::fmt::Display for AttachedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

impl std::fmt::Debug for AttachedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedPlugin")
            .field("namespace", &self.namespace)
            .field("hooks", &self.hooks)
            .field("status", &self.status())
            .field("attached_at", &self.attached_at)
            .finish_non_exhaustive()
    }
}
