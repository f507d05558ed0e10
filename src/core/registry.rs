//! Ordered step-type registry
//!
//! Types are looked up by name when a step declares `type`, and inferred from
//! the document keys otherwise. Inference picks the first registered type
//! whose contribution keys are all present, so registration order matters.

use crate::core::step::StepKindRef;
use crate::core::tree::ConfigTree;
use std::fmt;

struct Registration {
    name: String,
    kind: StepKindRef,
    contributes: Vec<String>,
}

/// Step types in registration order
#[derive(Default)]
pub struct StepRegistry {
    entries: Vec<Registration>,
}

impl StepRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in step types
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::execution::steps::register_builtins(&mut registry);
        registry
    }

    /// Register `kind` under `name`. Re-registering replaces the previous
    /// handler in place and returns it so the caller can warn about it.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        kind: StepKindRef,
        contributes: &[&str],
    ) -> Option<StepKindRef> {
        let name = name.into();
        let contributes: Vec<String> = contributes.iter().map(|key| key.to_string()).collect();

        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.name == name) {
            entry.contributes = contributes;
            return Some(std::mem::replace(&mut entry.kind, kind));
        }

        self.entries.push(Registration {
            name,
            kind,
            contributes,
        });
        None
    }

    /// Look a type up by its name
    pub fn get(&self, name: &str) -> Option<StepKindRef> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.kind.clone())
    }

    /// First type, in registration order, whose contribution keys are all
    /// present (and non-null) in `doc`
    pub fn infer(&self, doc: &ConfigTree) -> Option<(&str, StepKindRef)> {
        self.entries
            .iter()
            .find(|entry| {
                !entry.contributes.is_empty()
                    && entry.contributes.iter().all(|key| doc.has_value(key))
            })
            .map(|entry| (entry.name.as_str(), entry.kind.clone()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn contributes(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.contributes.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("types", &self.names())
            .finish()
    }
}
