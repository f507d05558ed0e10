//! Audit trail: every trigger appended to a file as one JSON line

use crate::core::error::{Error, Result};
use crate::core::step::Step;
use crate::core::trigger::Trigger;
use crate::core::workflow::Workflow;
use crate::execution::extension::{Extension, ExtensionHost};
use crate::execution::process::ProcessSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Sign the audit trail registers under
pub const AUDIT_SIGN: &str = "audit";

/// Where the `audit` extension writes when loaded from a workflow
pub const DEFAULT_AUDIT_FILE: &str = "repoutils-audit.jsonl";

#[derive(Serialize)]
struct AuditRecord<'a> {
    timestamp: DateTime<Utc>,
    trigger: &'a str,
    #[serde(flatten)]
    detail: Value,
}

/// Trigger observer appending to a JSON lines file
pub struct AuditTrail {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl AuditTrail {
    /// Open `path` for appending, creating it when needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::fs(&path, "open", e))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&self, trigger: &str, detail: Value) -> Result<()> {
        let record = AuditRecord {
            timestamp: Utc::now(),
            trigger,
            detail,
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| Error::plugin(format!("Failed to encode audit record: {e}")))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::plugin("Audit writer lock poisoned"))?;
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::fs(&self.path, "write", e))
    }
}

fn path_value(path: &Path) -> Value {
    Value::from(path.display().to_string())
}

impl Trigger for AuditTrail {
    fn pre_run_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.record(
            "pre_run_workflow",
            json!({"workflow": workflow.id, "name": workflow.name}),
        )
    }

    fn post_run_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.record(
            "post_run_workflow",
            json!({"workflow": workflow.id, "steps": workflow.steps().count()}),
        )
    }

    fn pre_run_workflow_step(&self, step: &Step) -> Result<()> {
        self.record(
            "pre_run_workflow_step",
            json!({"step": step.meta.global_id, "type": step.kind()}),
        )
    }

    fn post_run_workflow_step(&self, step: &Step) -> Result<()> {
        self.record("post_run_workflow_step", json!({"step": step.meta.global_id}))
    }

    fn on_mkdir(&self, path: &Path) -> Result<()> {
        self.record("on_mkdir", json!({"path": path_value(path)}))
    }

    fn on_move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.record("on_move_file", json!({"src": path_value(src), "dst": path_value(dst)}))
    }

    fn on_copy(&self, src: &Path, dst: &Path) -> Result<()> {
        self.record("on_copy", json!({"src": path_value(src), "dst": path_value(dst)}))
    }

    fn on_remove(&self, path: &Path) -> Result<()> {
        self.record("on_remove", json!({"path": path_value(path)}))
    }

    fn on_output(&self, msg: &str) -> Result<()> {
        self.record("on_output", json!({"message": msg}))
    }

    fn on_warning(&self, message: &str) -> Result<()> {
        self.record("on_warning", json!({"message": message}))
    }

    fn pre_exec_process(&self, process: &ProcessSpec) -> Result<()> {
        self.record("pre_exec_process", json!({"command": process.to_string()}))
    }

    fn post_exec_process(&self, process: &ProcessSpec, retcode: i32, raise_exc: bool) -> Result<()> {
        self.record(
            "post_exec_process",
            json!({"command": process.to_string(), "retcode": retcode, "raise": raise_exc}),
        )
    }
}

/// Extension wrapper so workflows can enable the trail with `extension: audit`
pub struct AuditExtension {
    path: PathBuf,
}

impl AuditExtension {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Extension for AuditExtension {
    fn register(&self, host: &mut ExtensionHost<'_>) -> Result<()> {
        host.register_trigger(AUDIT_SIGN, Arc::new(AuditTrail::open(&self.path)?))
    }
}
