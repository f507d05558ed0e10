//! Extension loading
//!
//! An extension is resolved by an [`ExtensionLoader`] and exposes a single
//! `register` entry point, through which it binds triggers and step types on
//! the running engine.

use crate::core::error::{Error, Result};
use crate::core::step::StepKindRef;
use crate::core::trigger::Trigger;
use crate::execution::engine::Engine;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A loadable unit of triggers and step types
pub trait Extension: Send + Sync {
    fn register(&self, host: &mut ExtensionHost<'_>) -> Result<()>;
}

/// What an extension is allowed to touch while registering
pub struct ExtensionHost<'a> {
    engine: &'a mut Engine,
}

impl<'a> ExtensionHost<'a> {
    pub(crate) fn new(engine: &'a mut Engine) -> Self {
        Self { engine }
    }

    /// Bind an observer under a unique sign
    pub fn register_trigger(&mut self, sign: &str, trigger: Arc<dyn Trigger>) -> Result<()> {
        self.engine.triggers.register(sign, trigger)
    }

    /// Add or replace a step type
    pub fn register_step_type(&mut self, name: &str, kind: StepKindRef, contributes: &[&str]) -> Result<()> {
        self.engine.register_step_type(name, kind, contributes)
    }

    /// Push a variable that stays visible for the rest of the run
    pub fn push_variable(&mut self, name: &str, value: serde_json::Value) {
        self.engine.variables.push(name, value);
    }
}

/// Resolves an extension reference (as written in a workflow) to a unit
pub trait ExtensionLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Extension>>;
}

type Factory = Arc<dyn Fn() -> Result<Arc<dyn Extension>> + Send + Sync>;

/// In-process loader: extensions are compiled in and looked up by the file
/// stem of the requested path, so `plugins/audit.py` and `audit` both
/// resolve to `audit`.
#[derive(Clone, Default)]
pub struct ExtensionCatalog {
    factories: BTreeMap<String, Factory>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the extensions shipped with repoutils
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::plugins::register_builtins(&mut catalog);
        catalog
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Extension>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Extension>> + Send + Sync + 'static,
    {
        self.insert(name, factory);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl ExtensionLoader for ExtensionCatalog {
    fn load(&self, path: &Path) -> Result<Arc<dyn Extension>> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::plugin(format!("Invalid extension path '{}'.", path.display())))?;

        let factory = self.factories.get(stem).ok_or_else(|| {
            Error::plugin(format!(
                "Extension '{}' is not available. Known extensions: {}.",
                path.display(),
                self.names().join(", ")
            ))
        })?;
        factory()
    }
}

impl fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionCatalog")
            .field("extensions", &self.names())
            .finish()
    }
}
