//! Process-wide host state.
//!
//! The registry depends on exactly one external collaborator, the utility
//! [`Toolkit`], and must be handed the same instance this module hands out.
//! [`init_global`] is the explicit start-up entry point for embedders that
//! want a single registry per process.

use crate::config::RegistryConfig;
use crate::plugin::Registry;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock, RwLock};

static TOOLKIT: OnceLock<Arc<Toolkit>> = OnceLock::new();
static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

/// Handle to the DOM/utility library plugins build on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolkit {
    /// Library name
    pub name: String,
    /// Library version
    pub version: String,
}

impl Toolkit {
    /// Create a toolkit handle. Only [`Toolkit::global`] passes the registry check.
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    /// The process-wide toolkit instance.
    pub fn global() -> &'static Arc<Toolkit> {
        TOOLKIT.get_or_init(|| Arc::new(Toolkit::new("mx-toolkit", env!("CARGO_PKG_VERSION"))))
    }

    /// Whether `toolkit` is the process-wide instance (identity, not equality).
    pub fn is_global(toolkit: &Arc<Toolkit>) -> bool {
        Arc::ptr_eq(toolkit, Self::global())
    }
}

/// Create the process-wide registry, or return it if it already exists.
///
/// The first call's configuration wins; later calls ignore `config`.
pub fn init_global(config: RegistryConfig) -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| {
        tracing::debug!(prefix = %config.prefix, "Creating process registry");
        RwLock::new(Registry::with_global_toolkit(config))
    })
}

/// The process-wide registry, if [`init_global`] has run.
pub fn global() -> Option<&'static RwLock<Registry>> {
    REGISTRY.get()
}
