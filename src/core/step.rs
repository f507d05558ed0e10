//! Step domain model
//!
//! A step is built in two phases: a [`StepKind`] parses the step document into
//! an [`Action`], then the engine executes the action exactly once.

use crate::core::error::Result;
use crate::core::tree::ConfigTree;
use crate::core::variable::Lookup;
use crate::execution::Engine;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A registered step variant
pub trait StepKind: Send + Sync {
    /// Read the variant payload from the step document
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>>;
}

/// The effect of a parsed step
#[async_trait]
pub trait Action: fmt::Debug + Send + Sync {
    async fn execute(&self, step: &StepMeta, engine: &mut Engine) -> Result<()>;
}

/// Identity of a step inside its workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMeta {
    /// Unique within the parent workflow
    pub id: String,

    pub name: String,

    pub desc: String,

    /// Registered type name the step resolved to
    pub kind: String,

    pub workflow_id: String,

    /// `<workflow-id>.<step-id>`, the prefix of every variable the step pushes
    pub global_id: String,
}

impl StepMeta {
    pub fn new(id: String, name: String, desc: String, kind: String, workflow_id: &str) -> Self {
        let global_id = format!("{}.{}", workflow_id, id);
        Self {
            id,
            name,
            desc,
            kind,
            workflow_id: workflow_id.to_string(),
            global_id,
        }
    }

    /// Fully qualified name of an output field of this step
    pub fn var(&self, field: &str) -> String {
        format!("{}.{}", self.global_id, field)
    }

    /// Name if set, id otherwise
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A built step, linked to its successor
#[derive(Debug)]
pub struct Step {
    pub meta: StepMeta,
    action: Box<dyn Action>,
    next: Option<Box<Step>>,
}

impl Step {
    pub fn new(meta: StepMeta, action: Box<dyn Action>) -> Self {
        Self {
            meta,
            action,
            next: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn kind(&self) -> &str {
        &self.meta.kind
    }

    pub fn action(&self) -> &dyn Action {
        self.action.as_ref()
    }

    pub fn next(&self) -> Option<&Step> {
        self.next.as_deref()
    }

    /// Slot for the successor; only the engine links steps
    pub(crate) fn next_slot(&mut self) -> &mut Option<Box<Step>> {
        &mut self.next
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.meta.display_name())
    }
}

/// Shared handle to a step kind, as stored in the registry
pub type StepKindRef = Arc<dyn StepKind>;
