//! Plugin trigger bus
//!
//! Observers implement [`Trigger`] and register under a unique sign. The
//! engine dispatches every lifecycle point to all observers in registration
//! order. Methods an observer does not override fall back to a no-op that
//! only logs the miss; errors returned by an override propagate unchanged.

use crate::core::error::{Error, Result};
use crate::core::step::Step;
use crate::core::workflow::Workflow;
use crate::execution::process::ProcessSpec;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

fn unhandled(name: &str) -> Result<()> {
    debug!("Not implemented trigger '{}' called.", name);
    Ok(())
}

/// Lifecycle observer. Every method is optional.
pub trait Trigger: Send + Sync {
    /// Before a workflow starts building its step chain
    fn pre_run_workflow(&self, _workflow: &Workflow) -> Result<()> {
        unhandled("pre_run_workflow")
    }

    /// After every step of a workflow has run
    fn post_run_workflow(&self, _workflow: &Workflow) -> Result<()> {
        unhandled("post_run_workflow")
    }

    /// After a step is parsed, before its effect
    fn pre_run_workflow_step(&self, _step: &Step) -> Result<()> {
        unhandled("pre_run_workflow_step")
    }

    fn post_run_workflow_step(&self, _step: &Step) -> Result<()> {
        unhandled("post_run_workflow_step")
    }

    fn on_mkdir(&self, _path: &Path) -> Result<()> {
        unhandled("on_mkdir")
    }

    fn on_move_file(&self, _src: &Path, _dst: &Path) -> Result<()> {
        unhandled("on_move_file")
    }

    fn on_copy(&self, _src: &Path, _dst: &Path) -> Result<()> {
        unhandled("on_copy")
    }

    fn on_remove(&self, _path: &Path) -> Result<()> {
        unhandled("on_remove")
    }

    fn on_output(&self, _msg: &str) -> Result<()> {
        unhandled("on_output")
    }

    fn on_warning(&self, _message: &str) -> Result<()> {
        unhandled("on_warning")
    }

    fn pre_exec_process(&self, _process: &ProcessSpec) -> Result<()> {
        unhandled("pre_exec_process")
    }

    /// `raise_exc` tells whether a non-zero `retcode` fails the step
    fn post_exec_process(&self, _process: &ProcessSpec, _retcode: i32, _raise_exc: bool) -> Result<()> {
        unhandled("post_exec_process")
    }
}

/// Registry of observers keyed by sign, in registration order
#[derive(Default)]
pub struct TriggerBus {
    observers: Vec<(String, Arc<dyn Trigger>)>,
}

impl TriggerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an observer to `sign`. Signs must be unique.
    pub fn register(&mut self, sign: impl Into<String>, observer: Arc<dyn Trigger>) -> Result<()> {
        let sign = sign.into();
        if self.observers.iter().any(|(existing, _)| *existing == sign) {
            return Err(Error::config(format!(
                "Trigger sign '{sign}' is already registered."
            )));
        }
        debug!("Bound trigger '{}'", sign);
        self.observers.push((sign, observer));
        Ok(())
    }

    /// Registered signs, in dispatch order
    pub fn signs(&self) -> Vec<&str> {
        self.observers.iter().map(|(sign, _)| sign.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Call `trigger` on every observer; the first handler error stops dispatch
    pub fn dispatch<F>(&self, trigger: &str, mut call: F) -> Result<()>
    where
        F: FnMut(&dyn Trigger) -> Result<()>,
    {
        debug!(
            "Dispatching trigger '{}' to {:?}",
            trigger,
            self.signs()
        );
        for (_, observer) in &self.observers {
            call(observer.as_ref())?;
        }
        Ok(())
    }
}

impl fmt::Debug for TriggerBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerBus")
            .field("signs", &self.signs())
            .finish()
    }
}
