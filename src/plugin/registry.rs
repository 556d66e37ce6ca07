//! Plugin registry.
//!
//! Attaches plugins under unique namespaces, runs their `init` hook and
//! broadcasts `add_handlers` to every plugin that supports it.

use crate::config::{BroadcastPolicy, RegistryConfig};
use crate::core::{Error, Namespace, Result};
use crate::host::Toolkit;
use crate::monitoring::{DiagnosticLog, LogEntry, LogLevel};
use crate::plugin::interface::{Plugin, PluginContext, PluginError, PluginHook};
use crate::plugin::shared::{AttachedPlugin, PluginStatus};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to an attached plugin.
///
/// Every lookup of a namespace returns a clone of the same `Arc`.
pub type PluginHandle = Arc<AttachedPlugin>;

/// Outcome of [`Registry::extend`].
#[derive(Debug, Clone)]
pub enum AttachStatus {
    /// The plugin was registered
    Attached(PluginHandle),
    /// Nothing changed; the reason was logged
    Rejected(Error),
}

impl AttachStatus {
    /// Whether the plugin was registered.
    pub fn is_attached(&self) -> bool {
        matches!(self, AttachStatus::Attached(_))
    }

    /// The new handle, if attached.
    pub fn handle(&self) -> Option<&PluginHandle> {
        match self {
            AttachStatus::Attached(handle) => Some(handle),
            AttachStatus::Rejected(_) => None,
        }
    }

    /// Convert into a `Result` for callers that treat rejection as an error.
    pub fn into_result(self) -> Result<PluginHandle> {
        match self {
            AttachStatus::Attached(handle) => Ok(handle),
            AttachStatus::Rejected(err) => Err(err),
        }
    }
}

/// Summary of an `add_handlers` broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Namespaces whose `add_handlers` succeeded
    pub invoked: Vec<String>,
    /// Namespaces without the hook
    pub skipped: Vec<String>,
    /// Namespaces whose `add_handlers` failed
    pub failed: Vec<(String, PluginError)>,
}

impl BroadcastReport {
    /// Whether every invoked handler succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistryState {
    Operational,
    Degraded,
}

/// Plugin registry.
pub struct Registry {
    /// Configuration
    config: RegistryConfig,
    /// Operational or degraded
    state: RegistryState,
    /// Utility library the host was started with
    toolkit: Option<Arc<Toolkit>>,
    /// Attached plugins
    plugins: HashMap<String, PluginHandle>,
    /// Attach order, used for broadcasts
    order: Vec<String>,
    /// Reported diagnostics
    diagnostics: DiagnosticLog,
}

impl Registry {
    /// Create a new registry.
    ///
    /// `toolkit` must be the process-wide [`Toolkit::global`] instance. If it
    /// is missing or a different instance, the condition is logged and the
    /// registry is left degraded: every later `extend` is rejected and
    /// `add_handlers` returns [`Error::ConfigurationMissing`].
    pub fn new(config: RegistryConfig, toolkit: Option<Arc<Toolkit>>) -> Self {
        let diagnostics = DiagnosticLog::new(config.diagnostics_capacity);
        let state = match &toolkit {
            Some(t) if Toolkit::is_global(t) => RegistryState::Operational,
            _ => {
                diagnostics.log(LogEntry::new(LogLevel::Error, "Toolkit library missing"));
                RegistryState::Degraded
            }
        };

        Self {
            config,
            state,
            toolkit,
            plugins: HashMap::new(),
            order: Vec::new(),
            diagnostics,
        }
    }

    /// Create a registry bound to the process-wide toolkit.
    pub fn with_global_toolkit(config: RegistryConfig) -> Self {
        Self::new(config, Some(Arc::clone(Toolkit::global())))
    }

    /// Attach `plugin` under `namespace`.
    pub fn extend<P: Plugin + 'static>(&mut self, namespace: &str, plugin: P) -> AttachStatus {
        self.extend_boxed(namespace, Box::new(plugin))
    }

    /// Attach an already boxed plugin under `namespace`.
    ///
    /// Rejections never panic or propagate; they are logged and reported in
    /// the returned status. On success the plugin is registered and reachable
    /// through [`Registry::get`] before its `init` hook runs.
    pub fn extend_boxed(&mut self, namespace: &str, plugin: Box<dyn Plugin>) -> AttachStatus {
        if self.state == RegistryState::Degraded {
            self.diagnostics
                .warn(namespace, "Registry is degraded, attachment refused");
            return AttachStatus::Rejected(Error::ConfigurationMissing);
        }

        let Some(ns) = Namespace::parse(namespace) else {
            self.diagnostics
                .warn(namespace, format!("Invalid namespace {:?}", namespace));
            return AttachStatus::Rejected(Error::InvalidNamespace(namespace.to_string()));
        };

        if self.plugins.contains_key(ns.as_str()) || self.config.is_reserved(ns.as_str()) {
            self.diagnostics
                .warn(ns.as_str(), format!("The namespace {} is already used.", ns));
            return AttachStatus::Rejected(Error::NamespaceCollision(ns.to_string()));
        }

        let handle = Arc::new(AttachedPlugin::new(ns.clone(), &self.config.prefix, plugin));
        self.plugins.insert(ns.to_string(), Arc::clone(&handle));
        self.order.push(ns.to_string());
        self.diagnostics.info(ns.as_str(), "Attached plugin");

        if handle.has_hook(PluginHook::Init) {
            let ctx = PluginContext::new(handle.namespace(), self);
            match handle.run_init(&ctx) {
                Ok(()) => handle.set_status(PluginStatus::Active),
                Err(e) => {
                    self.diagnostics
                        .error(ns.as_str(), format!("init failed: {}", e.message));
                    handle.set_status(PluginStatus::Error(e.message));
                }
            }
        } else {
            handle.set_status(PluginStatus::Active);
        }

        AttachStatus::Attached(handle)
    }

    /// Invoke `add_handlers` on every plugin that declares it, in attach order.
    ///
    /// Under [`BroadcastPolicy::Isolate`] a failing plugin is logged, recorded
    /// and the broadcast continues. Under [`BroadcastPolicy::FailFast`] the
    /// first failure ends the broadcast with
    /// [`Error::HandlerBroadcastFailure`].
    pub fn add_handlers(&self) -> Result<BroadcastReport> {
        if self.state == RegistryState::Degraded {
            return Err(Error::ConfigurationMissing);
        }

        let mut report = BroadcastReport::default();
        for ns in &self.order {
            let Some(handle) = self.plugins.get(ns) else {
                continue;
            };

            if !handle.has_hook(PluginHook::AddHandlers) {
                self.diagnostics.debug(ns, "No addHandlers hook, skipped");
                report.skipped.push(ns.clone());
                continue;
            }

            match handle.run_add_handlers() {
                Ok(()) => report.invoked.push(ns.clone()),
                Err(e) => {
                    self.diagnostics.log(
                        LogEntry::new(LogLevel::Error, format!("addHandlers failed: {}", e.message))
                            .with_namespace(ns)
                            .with_field("code", e.code),
                    );
                    match self.config.broadcast_policy {
                        BroadcastPolicy::Isolate => report.failed.push((ns.clone(), e)),
                        BroadcastPolicy::FailFast => {
                            return Err(Error::HandlerBroadcastFailure {
                                namespace: ns.clone(),
                                message: e.message,
                            })
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    /// Get the plugin attached under `namespace`.
    pub fn get(&self, namespace: &str) -> Option<&PluginHandle> {
        self.plugins.get(namespace)
    }

    /// Whether `namespace` is attached.
    pub fn contains(&self, namespace: &str) -> bool {
        self.plugins.contains_key(namespace)
    }

    /// All attached plugins by namespace.
    pub fn plugins(&self) -> &HashMap<String, PluginHandle> {
        &self.plugins
    }

    /// Attached namespaces in attach order.
    pub fn namespaces(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Get plugin count.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is attached.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Whether the toolkit check passed at construction.
    pub fn is_operational(&self) -> bool {
        self.state == RegistryState::Operational
    }

    /// The toolkit handed to the registry, if any.
    pub fn toolkit(&self) -> Option<&Arc<Toolkit>> {
        self.toolkit.as_ref()
    }

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Diagnostics reported so far.
    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_global_toolkit(RegistryConfig::default())
    }
}

impl std::ops::Index<&str> for Registry {
    type Output = PluginHandle;

    /// Panics if `namespace` is not attached; use [`Registry::get`] otherwise.
    fn index(&self, namespace: &str) -> &Self::Output {
        match self.plugins.get(namespace) {
            Some(handle) => handle,
            None => panic!("no plugin attached under namespace {:?}", namespace),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("state", &self.state)
            .field("namespaces", &self.order)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::interface::{EmptyPlugin, PluginInfo, PluginResult};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Counts hook invocations through shared counters.
    #[derive(Default, Clone)]
    struct Counting {
        name: &'static str,
        hooks: Vec<PluginHook>,
        init_calls: Arc<AtomicUsize>,
        handler_calls: Arc<AtomicUsize>,
        fail_handlers: bool,
    }

    impl Counting {
        fn new(name: &'static str, hooks: Vec<PluginHook>) -> Self {
            Self {
                name,
                hooks,
                ..Default::default()
            }
        }

        fn failing(mut self) -> Self {
            self.fail_handlers = true;
            self
        }
    }

    impl Plugin for Counting {
        fn info(&self) -> PluginInfo {
            PluginInfo::new(self.name)
        }

        fn hooks(&self) -> Vec<PluginHook> {
            self.hooks.clone()
        }

        fn init(&mut self, _ctx: &PluginContext<'_>) -> PluginResult<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn add_handlers(&mut self) -> PluginResult<()> {
            self.handler_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_handlers {
                return Err(PluginError::new("handler registration failed").with_code(7));
            }
            Ok(())
        }
    }

    /// Records what it can see of the registry while `init` runs.
    #[derive(Default)]
    struct SelfAware {
        seen: Arc<Mutex<Option<(bool, String)>>>,
    }

    impl Plugin for SelfAware {
        fn hooks(&self) -> Vec<PluginHook> {
            vec![PluginHook::Init]
        }

        fn init(&mut self, ctx: &PluginContext<'_>) -> PluginResult<()> {
            let registered = ctx.registry().contains(ctx.namespace().as_str());
            let name = ctx
                .handle()
                .map(|h| h.qualified_name().to_string())
                .unwrap_or_default();
            *self.seen.lock().unwrap() = Some((registered, name));
            Ok(())
        }
    }

    /// Broadcasts from its own `init`, then records the report it got back.
    #[derive(Default)]
    struct Broadcaster {
        report: Arc<Mutex<Option<Result<BroadcastReport>>>>,
        handler_calls: Arc<AtomicUsize>,
    }

    impl Plugin for Broadcaster {
        fn hooks(&self) -> Vec<PluginHook> {
            vec![PluginHook::Init, PluginHook::AddHandlers]
        }

        fn init(&mut self, ctx: &PluginContext<'_>) -> PluginResult<()> {
            *self.report.lock().unwrap() = Some(ctx.registry().add_handlers());
            Ok(())
        }

        fn add_handlers(&mut self) -> PluginResult<()> {
            self.handler_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingInit;

    impl Plugin for FailingInit {
        fn hooks(&self) -> Vec<PluginHook> {
            vec![PluginHook::Init]
        }

        fn init(&mut self, _ctx: &PluginContext<'_>) -> PluginResult<()> {
            Err(PluginError::fatal("no connection"))
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = Registry::default();
        assert!(registry.is_operational());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_extend_empty_plugin() {
        let mut registry = Registry::default();
        let status = registry.extend("echo", EmptyPlugin);

        assert!(status.is_attached());
        let echo = &registry["echo"];
        assert_eq!(&*echo.qualified_name(), "MX.echo");
        assert!(echo.settings().is_empty());
        assert_eq!(echo.status(), PluginStatus::Active);
        echo.set_config([("resource", json!("web"))]);
        assert_eq!(registry["echo"].setting("resource"), Some(json!("web")));
    }

    #[test]
    fn test_alias_identity() {
        let mut registry = Registry::default();
        let a = registry.extend("a", EmptyPlugin).into_result().unwrap();
        let b = registry.extend("b", EmptyPlugin).into_result().unwrap();

        assert!(Arc::ptr_eq(&registry["a"], &a));
        assert!(Arc::ptr_eq(&registry["b"], &b));
        assert!(Arc::ptr_eq(registry.get("a").unwrap(), &registry.plugins()["a"]));
        assert!(!Arc::ptr_eq(&a, &b));

        let mut keys: Vec<&String> = registry.plugins().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_namespace_rejected() {
        let mut registry = Registry::default();
        let first = Counting::new("first", vec![PluginHook::Init]);
        let init_calls = Arc::clone(&first.init_calls);
        let original = registry.extend("x", first).into_result().unwrap();

        let second = Counting::new("foo", vec![PluginHook::Init]);
        let second_inits = Arc::clone(&second.init_calls);
        let status = registry.extend("x", second);

        assert!(matches!(
            status,
            AttachStatus::Rejected(Error::NamespaceCollision(ref ns)) if ns == "x"
        ));
        assert!(Arc::ptr_eq(&registry["x"], &original));
        assert_eq!(registry["x"].with_plugin(|p| p.info().name), "first");
        assert_eq!(init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_inits.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);

        let warnings = registry.diagnostics().entries_at_level(LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "The namespace x is already used.");
    }

    #[test]
    fn test_reserved_names_rejected() {
        let config = RegistryConfig::default().with_reserved_name("core");
        let mut registry = Registry::with_global_toolkit(config);

        for name in ["plugins", "extend", "addHandlers", "extFN", "core"] {
            let status = registry.extend(name, EmptyPlugin);
            assert!(!status.is_attached(), "{} should be reserved", name);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_blank_namespace_rejected() {
        let mut registry = Registry::default();
        let status = registry.extend("  ", EmptyPlugin);
        assert!(matches!(status, AttachStatus::Rejected(Error::InvalidNamespace(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_init_runs_once_after_registration() {
        let mut registry = Registry::default();
        let plugin = SelfAware::default();
        let seen = Arc::clone(&plugin.seen);

        registry.extend("roster", plugin);

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, Some((true, "MX.roster".to_string())));
    }

    #[test]
    fn test_broadcast_from_init_does_not_block() {
        let mut registry = Registry::default();
        let earlier = Counting::new("earlier", vec![PluginHook::AddHandlers]);
        let earlier_calls = Arc::clone(&earlier.handler_calls);
        registry.extend("earlier", earlier);

        let plugin = Broadcaster::default();
        let report = Arc::clone(&plugin.report);
        let own_calls = Arc::clone(&plugin.handler_calls);

        let status = registry.extend("core", plugin);
        assert!(status.is_attached());
        assert_eq!(registry["core"].status(), PluginStatus::Active);

        let report = report.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(report.invoked, vec!["earlier"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "core");
        assert_eq!(earlier_calls.load(Ordering::SeqCst), 1);
        assert_eq!(own_calls.load(Ordering::SeqCst), 0);

        let report = registry.add_handlers().unwrap();
        assert_eq!(report.invoked, vec!["earlier", "core"]);
        assert_eq!(own_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "no plugin attached under namespace")]
    fn test_index_unknown_namespace_panics() {
        let mut registry = Registry::default();
        registry.extend("echo", EmptyPlugin);
        let _ = &registry["missing"];
    }

    #[test]
    fn test_init_not_called_without_hook() {
        let mut registry = Registry::default();
        let plugin = Counting::new("plain", vec![]);
        let init_calls = Arc::clone(&plugin.init_calls);

        registry.extend("plain", plugin);
        assert_eq!(init_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry["plain"].status(), PluginStatus::Active);
    }

    #[test]
    fn test_init_failure_keeps_registration() {
        let mut registry = Registry::default();
        let status = registry.extend("broken", FailingInit);

        assert!(status.is_attached());
        assert_eq!(
            registry["broken"].status(),
            PluginStatus::Error("no connection".to_string())
        );
    }

    #[test]
    fn test_qualified_name_uses_prefix() {
        let mut registry = Registry::with_global_toolkit(RegistryConfig::default().with_prefix("XMPP"));
        registry.extend("muc", EmptyPlugin);
        assert_eq!(&*registry["muc"].qualified_name(), "XMPP.muc");
    }

    #[test]
    fn test_add_handlers_only_on_capable_plugins() {
        let mut registry = Registry::default();
        let a = Counting::new("a", vec![PluginHook::AddHandlers]);
        let b = Counting::new("b", vec![]);
        let c = Counting::new("c", vec![PluginHook::Init, PluginHook::AddHandlers]);
        let counters = [
            Arc::clone(&a.handler_calls),
            Arc::clone(&b.handler_calls),
            Arc::clone(&c.handler_calls),
        ];

        registry.extend("a", a);
        registry.extend("b", b);
        registry.extend("c", c);

        let report = registry.add_handlers().unwrap();
        assert_eq!(report.invoked, vec!["a", "c"]);
        assert_eq!(report.skipped, vec!["b"]);
        assert!(report.is_clean());
        assert_eq!(counters[0].load(Ordering::SeqCst), 1);
        assert_eq!(counters[1].load(Ordering::SeqCst), 0);
        assert_eq!(counters[2].load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_add_handlers_isolates_failures() {
        let mut registry = Registry::default();
        let bad = Counting::new("bad", vec![PluginHook::AddHandlers]).failing();
        let good = Counting::new("good", vec![PluginHook::AddHandlers]);
        let good_calls = Arc::clone(&good.handler_calls);

        registry.extend("bad", bad);
        registry.extend("good", good);

        let report = registry.add_handlers().unwrap();
        assert_eq!(report.invoked, vec!["good"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert_eq!(report.failed[0].1.code, 7);
        assert_eq!(good_calls.load(Ordering::SeqCst), 1);

        let errors = registry.diagnostics().entries_at_level(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].namespace.as_deref(), Some("bad"));
    }

    #[test]
    fn test_add_handlers_fail_fast() {
        let config = RegistryConfig::default().with_broadcast_policy(BroadcastPolicy::FailFast);
        let mut registry = Registry::with_global_toolkit(config);
        let bad = Counting::new("bad", vec![PluginHook::AddHandlers]).failing();
        let after = Counting::new("after", vec![PluginHook::AddHandlers]);
        let after_calls = Arc::clone(&after.handler_calls);

        registry.extend("bad", bad);
        registry.extend("after", after);

        let result = registry.add_handlers();
        assert_eq!(
            result,
            Err(Error::HandlerBroadcastFailure {
                namespace: "bad".to_string(),
                message: "handler registration failed".to_string(),
            })
        );
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_add_handlers_repeatable() {
        let mut registry = Registry::default();
        let a = Counting::new("a", vec![PluginHook::AddHandlers]);
        let calls = Arc::clone(&a.handler_calls);
        registry.extend("a", a);

        registry.add_handlers().unwrap();
        registry.add_handlers().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_namespaces_in_attach_order() {
        let mut registry = Registry::default();
        for ns in ["zeta", "alpha", "mid"] {
            registry.extend(ns, EmptyPlugin);
        }
        assert_eq!(registry.namespaces(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_degraded_without_toolkit() {
        let mut registry = Registry::new(RegistryConfig::default(), None);
        assert!(!registry.is_operational());
        assert_eq!(
            registry.diagnostics().entries_at_level(LogLevel::Error)[0].message,
            "Toolkit library missing"
        );

        let status = registry.extend("echo", EmptyPlugin);
        assert!(matches!(status, AttachStatus::Rejected(Error::ConfigurationMissing)));
        assert!(registry.get("echo").is_none());
        assert_eq!(registry.add_handlers(), Err(Error::ConfigurationMissing));
    }

    #[test]
    fn test_degraded_with_foreign_toolkit() {
        let foreign = Arc::new(Toolkit::new("mx-toolkit", "0.0.0"));
        let registry = Registry::new(RegistryConfig::default(), Some(foreign));
        assert!(!registry.is_operational());
        assert!(registry.toolkit().is_some());
    }
}
