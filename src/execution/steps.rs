//! Built-in step types

use crate::core::error::{Error, Result};
use crate::core::registry::StepRegistry;
use crate::core::step::{Action, StepKind, StepMeta};
use crate::core::tree::{ConfigTree, Shape};
use crate::core::variable::{render, Lookup};
use crate::execution::engine::Engine;
use crate::execution::fsops::{copy_recursive, move_path, paths_of, remove_path, CopyOptions};
use crate::execution::process::{ProcessSpec, StderrMode};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const TEXT_OR_LIST: Shape = Shape::OneOf(&[Shape::String, Shape::List]);
const BOOL_OR_TEXT: Shape = Shape::OneOf(&[Shape::Bool, Shape::String]);
const LIST_OR_NULL: Shape = Shape::OneOf(&[Shape::List, Shape::Null]);

/// Register the built-in types in inference order
pub fn register_builtins(registry: &mut StepRegistry) {
    registry.register("shell", Arc::new(ShellKind), &["run"]);
    registry.register("mkdir", Arc::new(MkdirKind), &["mkdir"]);
    registry.register("popen", Arc::new(PopenKind), &["popen"]);
    registry.register("output", Arc::new(OutputKind), &["output"]);
    registry.register("move", Arc::new(MoveKind), &["move", "to"]);
    registry.register("copy", Arc::new(CopyKind), &["copy", "to"]);
    registry.register("remove", Arc::new(RemoveKind), &["remove"]);
    registry.register("extension", Arc::new(ExtensionKind), &["extension"]);
    registry.register("workflow", Arc::new(WorkflowKind), &["workflow"]);
}

/// `run`: spawn a shell command
pub struct ShellKind;

#[derive(Debug)]
struct Shell {
    command: String,
    cwd: PathBuf,
    fail_on_error: bool,
}

impl StepKind for ShellKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        Ok(Box::new(Shell {
            command: doc.get_str("run", vars)?,
            cwd: PathBuf::from(doc.get_str_or("cwd", "", vars)?),
            fail_on_error: doc.get_bool_or("fail-on-error", true, vars)?,
        }))
    }
}

#[async_trait]
impl Action for Shell {
    async fn execute(&self, step: &StepMeta, engine: &mut Engine) -> Result<()> {
        let spec = ProcessSpec::shell(&self.command).with_cwd(&self.cwd);
        let retcode = engine.run_process(&spec, self.fail_on_error).await?;
        engine.variables.push(step.var("retcode"), retcode);
        Ok(())
    }
}

/// `mkdir`: create a directory and its parents
pub struct MkdirKind;

#[derive(Debug)]
struct Mkdir {
    path: PathBuf,
}

impl StepKind for MkdirKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        Ok(Box::new(Mkdir {
            path: PathBuf::from(doc.get_str("mkdir", vars)?),
        }))
    }
}

#[async_trait]
impl Action for Mkdir {
    async fn execute(&self, _step: &StepMeta, engine: &mut Engine) -> Result<()> {
        engine
            .triggers
            .dispatch("on_mkdir", |t| t.on_mkdir(&self.path))?;
        std::fs::create_dir_all(&self.path).map_err(|e| Error::fs(&self.path, "create directory", e))
    }
}

/// `popen`: run a command and capture its output
pub struct PopenKind;

#[derive(Debug)]
struct Popen {
    command: String,
    cwd: PathBuf,
    fail_on_error: bool,
    stdout: bool,
    stderr: StderrMode,
}

impl StepKind for PopenKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        let stderr = match doc.typed_get("stderr", Some(Value::Bool(true)), BOOL_OR_TEXT, vars)? {
            Value::Bool(true) => StderrMode::Separate,
            Value::Bool(false) => StderrMode::Discard,
            _ => StderrMode::Merge,
        };

        Ok(Box::new(Popen {
            command: doc.get_str("popen", vars)?,
            cwd: PathBuf::from(doc.get_str_or("cwd", "", vars)?),
            fail_on_error: doc.get_bool_or("fail-on-error", true, vars)?,
            stdout: doc.get_bool_or("stdout", true, vars)?,
            stderr,
        }))
    }
}

#[async_trait]
impl Action for Popen {
    async fn execute(&self, step: &StepMeta, engine: &mut Engine) -> Result<()> {
        let spec = ProcessSpec::shell(&self.command).with_cwd(&self.cwd);
        let captured = engine
            .capture_process(&spec, self.stdout, self.stderr, self.fail_on_error)
            .await?;

        engine
            .variables
            .push(step.var("stdout"), captured.stdout.map_or(Value::Null, Value::from));
        engine
            .variables
            .push(step.var("stderr"), captured.stderr.map_or(Value::Null, Value::from));
        engine.variables.push(step.var("retcode"), captured.retcode);
        Ok(())
    }
}

/// `output`: emit a message through the trigger bus
pub struct OutputKind;

#[derive(Debug)]
struct Output {
    message: String,
}

impl StepKind for OutputKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        Ok(Box::new(Output {
            message: render(&doc.get("output", vars)?),
        }))
    }
}

#[async_trait]
impl Action for Output {
    async fn execute(&self, _step: &StepMeta, engine: &mut Engine) -> Result<()> {
        engine
            .triggers
            .dispatch("on_output", |t| t.on_output(&self.message))
    }
}

/// `move` + `to`: rename a path
pub struct MoveKind;

#[derive(Debug)]
struct MovePath {
    src: PathBuf,
    dst: PathBuf,
}

impl StepKind for MoveKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        Ok(Box::new(MovePath {
            src: PathBuf::from(doc.get_str("move", vars)?),
            dst: PathBuf::from(doc.get_str("to", vars)?),
        }))
    }
}

#[async_trait]
impl Action for MovePath {
    async fn execute(&self, _step: &StepMeta, engine: &mut Engine) -> Result<()> {
        engine
            .triggers
            .dispatch("on_move_file", |t| t.on_move_file(&self.src, &self.dst))?;
        move_path(&self.src, &self.dst)
    }
}

/// `copy` + `to`: recursive copy
pub struct CopyKind;

#[derive(Debug)]
struct CopyTree {
    src: PathBuf,
    dst: PathBuf,
    options: CopyOptions,
}

impl StepKind for CopyKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        let excludes = match doc.typed_get("excludes", Some(Value::Null), LIST_OR_NULL, vars)? {
            Value::Array(items) => items.iter().map(render).collect(),
            _ => Vec::new(),
        };

        Ok(Box::new(CopyTree {
            src: PathBuf::from(doc.get_str("copy", vars)?),
            dst: PathBuf::from(doc.get_str("to", vars)?),
            options: CopyOptions {
                strict: doc.get_bool_or("strict", true, vars)?,
                keep_symlinks: doc.get_bool_or("keep-symlinks", false, vars)?,
                excludes,
            },
        }))
    }
}

#[async_trait]
impl Action for CopyTree {
    async fn execute(&self, _step: &StepMeta, engine: &mut Engine) -> Result<()> {
        engine
            .triggers
            .dispatch("on_copy", |t| t.on_copy(&self.src, &self.dst))?;
        if !copy_recursive(&self.src, &self.dst, &self.options)? {
            engine.warn(&format!(
                "Copy source '{}' does not exist, skipped.",
                self.src.display()
            ))?;
        }
        Ok(())
    }
}

/// `remove`: delete one path or a list of paths
pub struct RemoveKind;

#[derive(Debug)]
struct Remove {
    paths: Vec<PathBuf>,
    strict: bool,
}

impl StepKind for RemoveKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        let paths = match doc.typed_get("remove", None, TEXT_OR_LIST, vars)? {
            Value::Array(items) => paths_of(&items),
            single => paths_of(&[single]),
        };

        Ok(Box::new(Remove {
            paths,
            strict: doc.get_bool_or("strict", true, vars)?,
        }))
    }
}

#[async_trait]
impl Action for Remove {
    async fn execute(&self, _step: &StepMeta, engine: &mut Engine) -> Result<()> {
        for path in &self.paths {
            engine.triggers.dispatch("on_remove", |t| t.on_remove(path))?;
            if !remove_path(path, self.strict)? {
                debug!("Nothing removed at '{}'", path.display());
            }
        }
        Ok(())
    }
}

/// `extension`: load a plugin and let it register
pub struct ExtensionKind;

#[derive(Debug)]
struct LoadExtension {
    path: PathBuf,
    strict: bool,
}

impl StepKind for ExtensionKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        Ok(Box::new(LoadExtension {
            path: PathBuf::from(doc.get_str("extension", vars)?),
            strict: doc.get_bool_or("strict", true, vars)?,
        }))
    }
}

#[async_trait]
impl Action for LoadExtension {
    async fn execute(&self, _step: &StepMeta, engine: &mut Engine) -> Result<()> {
        match engine.load_extension(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if !self.strict => engine.warn(&format!(
                "Failed to load extension '{}': {}",
                self.path.display(),
                error
            )),
            Err(error) => Err(error),
        }
    }
}

/// `workflow`: run another workflow file
pub struct WorkflowKind;

#[derive(Debug)]
struct SubWorkflow {
    path: PathBuf,
    fail_fast: bool,
}

impl StepKind for WorkflowKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        Ok(Box::new(SubWorkflow {
            path: PathBuf::from(doc.get_str("workflow", vars)?),
            fail_fast: doc.get_bool_or("fail-fast", true, vars)?,
        }))
    }
}

#[async_trait]
impl Action for SubWorkflow {
    async fn execute(&self, step: &StepMeta, engine: &mut Engine) -> Result<()> {
        info!("Entering sub-workflow '{}'", self.path.display());
        let outcome = engine.run_workflow_file(&self.path, self.fail_fast).await?;

        let error = outcome
            .error()
            .map_or(Value::Null, |error| Value::from(error.to_string()));
        engine.variables.push(step.var("success"), outcome.is_success());
        engine.variables.push(step.var("error"), error);
        Ok(())
    }
}
