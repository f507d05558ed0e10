//! Workflow domain model
//!
//! A workflow keeps its raw document until it is run. The engine builds the
//! step chain one step at a time (parse, execute, link) and attaches the head
//! once every step has run.

use crate::core::config::load_document;
use crate::core::error::{Error, Result};
use crate::core::step::Step;
use crate::core::tree::{ConfigTree, Shape};
use crate::core::variable::Lookup;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Name given to workflows synthesized from a bare list of steps
pub const INLINE_WORKFLOW_NAME: &str = "inline-workflow";

/// A linear chain of steps read from a document
pub struct Workflow {
    pub id: String,

    /// Display name; optional in the document
    pub name: Option<String>,

    raw: ConfigTree,

    first_step: Option<Box<Step>>,

    built: bool,
}

impl Workflow {
    /// Wrap a workflow document. Only `id` and `name` are read here; the
    /// steps stay raw until the workflow is run.
    pub fn from_tree(raw: ConfigTree, vars: &dyn Lookup) -> Result<Self> {
        let id = raw.get_str_or("id", &Uuid::new_v4().to_string(), vars)?;
        let name = raw
            .get_opt("name", Shape::String, vars)?
            .and_then(|name| name.as_str().map(str::to_string));

        Ok(Self {
            id,
            name,
            raw,
            first_step: None,
            built: false,
        })
    }

    /// Load a workflow document from a `.json`/`.json5`/`.yaml`/`.yml` file
    pub fn from_file<P: AsRef<Path>>(path: P, vars: &dyn Lookup) -> Result<Self> {
        Self::from_tree(load_document(path)?, vars)
    }

    /// Synthesize an auto-named, auto-id'd workflow around `steps`
    pub fn inline(steps: Vec<Value>) -> Self {
        let mut raw = ConfigTree::new();
        raw.set("name", INLINE_WORKFLOW_NAME);
        raw.set("steps", steps);

        Self {
            id: Uuid::new_v4().to_string(),
            name: Some(INLINE_WORKFLOW_NAME.to_string()),
            raw,
            first_step: None,
            built: false,
        }
    }

    /// The raw document
    pub fn raw(&self) -> &ConfigTree {
        &self.raw
    }

    /// Step documents in declaration order. `steps` must be a list of mappings.
    pub fn step_documents(&self, vars: &dyn Lookup) -> Result<Vec<ConfigTree>> {
        let steps = self.raw.get_list("steps", vars)?;
        steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                ConfigTree::from_value(step, &format!("Step #{} of workflow '{}'", index + 1, self))
            })
            .collect()
    }

    /// True once the step chain has been built
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// A workflow runs at most once
    pub(crate) fn ensure_unbuilt(&self) -> Result<()> {
        if self.built {
            return Err(Error::config(format!(
                "Workflow '{}' has already been run.",
                self
            )));
        }
        Ok(())
    }

    pub fn first_step(&self) -> Option<&Step> {
        self.first_step.as_deref()
    }

    /// Walk the built chain
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        std::iter::successors(self.first_step(), |step| step.next())
    }

    pub(crate) fn attach(&mut self, head: Option<Box<Step>>) -> Result<()> {
        self.ensure_unbuilt()?;
        self.first_step = head;
        self.built = true;
        Ok(())
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.id),
        }
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("built", &self.is_built())
            .finish()
    }
}
