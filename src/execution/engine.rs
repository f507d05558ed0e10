//! Workflow engine - builds and runs step chains

use crate::core::error::{Error, Result};
use crate::core::registry::StepRegistry;
use crate::core::step::{Step, StepKindRef, StepMeta};
use crate::core::tree::ConfigTree;
use crate::core::trigger::TriggerBus;
use crate::core::variable::{make_pretty, VariableStack};
use crate::core::workflow::Workflow;
use crate::execution::extension::{ExtensionCatalog, ExtensionHost, ExtensionLoader};
use crate::execution::process::{Captured, ProcessRunner, ProcessSpec, StderrMode};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engine limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound for any spawned process, in seconds
    pub process_timeout_secs: u64,

    /// Maximum nesting of sub-workflows
    pub max_depth: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            process_timeout_secs: 3600,
            max_depth: 64,
        }
    }
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.process_timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Result of a run that went through the fail-soft boundary
#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed(Error),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            RunOutcome::Completed => None,
            RunOutcome::Failed(error) => Some(error),
        }
    }

    /// Turn a captured failure back into an error
    pub fn into_result(self) -> Result<()> {
        match self {
            RunOutcome::Completed => Ok(()),
            RunOutcome::Failed(error) => Err(error),
        }
    }
}

/// A step as resolved by [`Engine::plan`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Owns the variable stack, the trigger bus and the step registry, and runs
/// workflows against them one step at a time.
pub struct Engine {
    pub variables: VariableStack,
    pub triggers: TriggerBus,
    pub registry: StepRegistry,
    loader: Arc<dyn ExtensionLoader>,
    runner: ProcessRunner,
    settings: EngineSettings,
    depth: usize,
}

impl Engine {
    /// Engine with built-in variables, step types and extensions
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            variables: VariableStack::with_builtins(),
            triggers: TriggerBus::new(),
            registry: StepRegistry::with_builtins(),
            loader: Arc::new(ExtensionCatalog::with_builtins()),
            runner: ProcessRunner::new(settings.process_timeout_secs),
            settings,
            depth: 0,
        }
    }

    /// Replace the extension loader
    pub fn with_loader(mut self, loader: Arc<dyn ExtensionLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run `workflow` through the fail-fast/fail-soft boundary. Fail-fast
    /// returns the first failure as an error; fail-soft raises a warning and
    /// hands the failure back as data.
    pub async fn execute(&mut self, workflow: &mut Workflow, fail_fast: bool) -> Result<RunOutcome> {
        if self.depth >= self.settings.max_depth {
            let error = Error::config(format!(
                "Workflow '{}' exceeds the maximum nesting depth of {}.",
                workflow, self.settings.max_depth
            ));
            return self.settle(error, fail_fast, &workflow.to_string());
        }

        self.depth += 1;
        let result = self.build(workflow).await;
        self.depth -= 1;

        match result {
            Ok(()) => Ok(RunOutcome::Completed),
            Err(error) => self.settle(error, fail_fast, &workflow.to_string()),
        }
    }

    /// Load a workflow document and run it. Loading happens inside the
    /// boundary, so a broken file is captured like any step failure.
    pub async fn run_workflow_file(&mut self, path: &Path, fail_fast: bool) -> Result<RunOutcome> {
        info!("Running workflow file '{}'", path.display());
        match Workflow::from_file(path, &self.variables) {
            Ok(mut workflow) => self.execute(&mut workflow, fail_fast).await,
            Err(error) => self.settle(error, fail_fast, &path.display().to_string()),
        }
    }

    /// Run a full workflow document held in memory
    pub async fn run_workflow_tree(&mut self, tree: ConfigTree, fail_fast: bool) -> Result<RunOutcome> {
        match Workflow::from_tree(tree, &self.variables) {
            Ok(mut workflow) => self.execute(&mut workflow, fail_fast).await,
            Err(error) => self.settle(error, fail_fast, "<document>"),
        }
    }

    /// Wrap bare step documents in a synthetic workflow and run it
    pub async fn run_inline_workflow(&mut self, steps: Vec<Value>, fail_fast: bool) -> Result<RunOutcome> {
        let mut workflow = Workflow::inline(steps);
        self.execute(&mut workflow, fail_fast).await
    }

    fn settle(&self, error: Error, fail_fast: bool, what: &str) -> Result<RunOutcome> {
        if fail_fast {
            return Err(error);
        }
        self.warn(&format!("Workflow '{}' failed: {}", what, error))?;
        Ok(RunOutcome::Failed(error))
    }

    async fn build(&mut self, workflow: &mut Workflow) -> Result<()> {
        workflow.ensure_unbuilt()?;
        let documents = workflow.step_documents(&self.variables)?;
        let ids = self.assign_ids(workflow, &documents)?;

        info!("Starting workflow '{}' ({})", workflow, workflow.id);
        self.triggers
            .dispatch("pre_run_workflow", |t| t.pre_run_workflow(workflow))?;

        let mut head: Option<Box<Step>> = None;
        let mut tail = &mut head;
        for (doc, id) in documents.iter().zip(ids) {
            let step = self.run_step(workflow, doc, id).await?;
            tail = tail.insert(Box::new(step)).next_slot();
        }

        workflow.attach(head)?;
        self.triggers
            .dispatch("post_run_workflow", |t| t.post_run_workflow(workflow))?;
        info!("Workflow '{}' completed", workflow);
        Ok(())
    }

    /// Declared or generated ids, rejecting duplicates before any step runs
    fn assign_ids(&self, workflow: &Workflow, documents: &[ConfigTree]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        documents
            .iter()
            .map(|doc| {
                let id = doc.get_str_or("id", &Uuid::new_v4().to_string(), &self.variables)?;
                if !seen.insert(id.clone()) {
                    return Err(Error::config(format!(
                        "Step id '{}' is duplicated in workflow '{}'.",
                        id, workflow
                    )));
                }
                Ok(id)
            })
            .collect()
    }

    fn resolve(&self, workflow: &Workflow, doc: &ConfigTree, id: &str, name: &str) -> Result<(String, StepKindRef)> {
        let declared = doc.get_str_or("type", "", &self.variables)?;
        if !declared.is_empty() {
            let kind = self.registry.get(&declared).ok_or_else(|| {
                Error::config_with_hint(
                    format!(
                        "Unknown step type '{}' of step '{}' in workflow '{}'.",
                        declared,
                        make_pretty(name, id),
                        workflow
                    ),
                    format!("Known step types: {}.", self.registry.names().join(", ")),
                )
            })?;
            return Ok((declared, kind));
        }

        self.registry
            .infer(doc)
            .map(|(kind_name, kind)| (kind_name.to_string(), kind))
            .ok_or_else(|| {
                Error::config(format!(
                    "The type of step '{}' ({}) in workflow '{}' ({}) is not provided and could not be inferred.",
                    make_pretty(name, "<Unnamed>"),
                    id,
                    workflow,
                    workflow.id
                ))
            })
    }

    async fn run_step(&mut self, workflow: &Workflow, doc: &ConfigTree, id: String) -> Result<Step> {
        let name = doc.get_str_or("name", "", &self.variables)?;
        let desc = doc.get_str_or("desc", "", &self.variables)?;
        let (kind_name, kind) = self.resolve(workflow, doc, &id, &name)?;

        let action = kind.parse(doc, &self.variables)?;
        let step = Step::new(StepMeta::new(id, name, desc, kind_name, &workflow.id), action);

        debug!("Step '{}' resolved to type '{}'", step, step.kind());
        self.triggers
            .dispatch("pre_run_workflow_step", |t| t.pre_run_workflow_step(&step))?;

        step.action().execute(&step.meta, self).await?;

        self.triggers
            .dispatch("post_run_workflow_step", |t| t.post_run_workflow_step(&step))?;
        Ok(step)
    }

    /// Resolve every step of `workflow` without running anything
    pub fn plan(&self, workflow: &Workflow) -> Result<Vec<PlannedStep>> {
        let documents = workflow.step_documents(&self.variables)?;
        let ids = self.assign_ids(workflow, &documents)?;

        documents
            .iter()
            .zip(ids)
            .map(|(doc, id)| {
                let name = doc.get_str_or("name", "", &self.variables)?;
                let (kind, step_kind) = self.resolve(workflow, doc, &id, &name)?;
                step_kind.parse(doc, &self.variables)?;
                Ok(PlannedStep { id, name, kind })
            })
            .collect()
    }

    /// Add a step type, or replace one with a warning
    pub fn register_step_type(&mut self, name: &str, kind: StepKindRef, contributes: &[&str]) -> Result<()> {
        if self.registry.register(name, kind, contributes).is_some() {
            self.warn(&format!(
                "Step type '{}' registered multiple times. It's unsafe.",
                name
            ))?;
        }
        info!("Step type '{}' registered with contributes {:?}", name, contributes);
        Ok(())
    }

    /// Resolve an extension through the loader and let it register itself
    pub fn load_extension(&mut self, path: &Path) -> Result<()> {
        let extension = self.loader.load(path)?;
        extension.register(&mut ExtensionHost::new(self))?;
        info!("Extension '{}' loaded", path.display());
        Ok(())
    }

    /// Log a warning and raise `on_warning`
    pub fn warn(&self, message: &str) -> Result<()> {
        warn!("{}", message);
        self.triggers
            .dispatch("on_warning", |t| t.on_warning(message))
    }

    /// Run a process with inherited stdio. A non-zero exit fails unless
    /// `fail_on_error` is false; an opted-out timeout or spawn failure
    /// reports `-1`.
    pub async fn run_process(&mut self, spec: &ProcessSpec, fail_on_error: bool) -> Result<i32> {
        self.triggers
            .dispatch("pre_exec_process", |t| t.pre_exec_process(spec))?;

        let retcode = match self.runner.run(spec).await {
            Ok(code) => code,
            Err(error @ (Error::Timeout { .. } | Error::Spawn { .. })) if !fail_on_error => {
                warn!("{}", error);
                -1
            }
            Err(error) => return Err(error),
        };

        self.finish_process(spec, retcode, fail_on_error)?;
        Ok(retcode)
    }

    /// Run a process capturing its output, with the same failure policy as
    /// [`Engine::run_process`]
    pub async fn capture_process(
        &mut self,
        spec: &ProcessSpec,
        capture_stdout: bool,
        stderr: StderrMode,
        fail_on_error: bool,
    ) -> Result<Captured> {
        self.triggers
            .dispatch("pre_exec_process", |t| t.pre_exec_process(spec))?;

        let captured = match self.runner.capture(spec, capture_stdout, stderr).await {
            Ok(captured) => captured,
            Err(error @ (Error::Timeout { .. } | Error::Spawn { .. })) if !fail_on_error => {
                warn!("{}", error);
                Captured {
                    stdout: None,
                    stderr: None,
                    retcode: -1,
                }
            }
            Err(error) => return Err(error),
        };

        self.finish_process(spec, captured.retcode, fail_on_error)?;
        Ok(captured)
    }

    fn finish_process(&self, spec: &ProcessSpec, retcode: i32, fail_on_error: bool) -> Result<()> {
        self.triggers.dispatch("post_exec_process", |t| {
            t.post_exec_process(spec, retcode, fail_on_error)
        })?;

        if fail_on_error && retcode != 0 {
            return Err(Error::Process {
                command: spec.to_string(),
                code: retcode,
            });
        }
        Ok(())
    }
}

impl AsMut<VariableStack> for Engine {
    fn as_mut(&mut self) -> &mut VariableStack {
        &mut self.variables
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("triggers", &self.triggers)
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("depth", &self.depth)
            .finish()
    }
}
