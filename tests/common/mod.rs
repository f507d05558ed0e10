//! Shared helpers for the integration scenarios

use repoutils::core::step::Step;
use repoutils::execution::ProcessSpec;
use repoutils::{ConfigTree, Engine, EngineSettings, Result, Trigger, Workflow};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Records every trigger it receives as a short `name:detail` line
#[derive(Default)]
pub struct RecordingTrigger {
    events: Mutex<Vec<String>>,
}

impl RecordingTrigger {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Events whose name starts with `prefix`
    pub fn events_of(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.starts_with(prefix))
            .collect()
    }

    fn push(&self, event: String) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Trigger for RecordingTrigger {
    fn pre_run_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.push(format!("pre_wf:{}", workflow))
    }

    fn post_run_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.push(format!("post_wf:{}", workflow))
    }

    fn pre_run_workflow_step(&self, step: &Step) -> Result<()> {
        self.push(format!("pre_step:{}", step.id()))
    }

    fn post_run_workflow_step(&self, step: &Step) -> Result<()> {
        self.push(format!("post_step:{}", step.id()))
    }

    fn on_mkdir(&self, path: &Path) -> Result<()> {
        self.push(format!("mkdir:{}", file_name(path)))
    }

    fn on_move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.push(format!("move:{}->{}", file_name(src), file_name(dst)))
    }

    fn on_copy(&self, src: &Path, dst: &Path) -> Result<()> {
        self.push(format!("copy:{}->{}", file_name(src), file_name(dst)))
    }

    fn on_remove(&self, path: &Path) -> Result<()> {
        self.push(format!("remove:{}", file_name(path)))
    }

    fn on_output(&self, msg: &str) -> Result<()> {
        self.push(format!("output:{}", msg))
    }

    fn on_warning(&self, message: &str) -> Result<()> {
        self.push(format!("warning:{}", message))
    }

    fn pre_exec_process(&self, process: &ProcessSpec) -> Result<()> {
        self.push(format!("exec:{}", process))
    }

    fn post_exec_process(&self, _process: &ProcessSpec, retcode: i32, raise_exc: bool) -> Result<()> {
        self.push(format!("exited:{}:{}", retcode, raise_exc))
    }
}

/// Engine with a recorder attached under the sign `recorder`
pub fn recorded_engine() -> (Engine, Arc<RecordingTrigger>) {
    recorded_engine_with(EngineSettings::new().with_timeout(30))
}

pub fn recorded_engine_with(settings: EngineSettings) -> (Engine, Arc<RecordingTrigger>) {
    let recorder = Arc::new(RecordingTrigger::default());
    let mut engine = Engine::new(settings);
    engine
        .triggers
        .register("recorder", recorder.clone())
        .unwrap();
    (engine, recorder)
}

/// Write a workflow document next to the other test files
pub fn write_document(dir: &Path, file: &str, text: &str) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, text).unwrap();
    path
}

/// Build a workflow from a JSON value
pub fn workflow(engine: &Engine, doc: Value) -> Workflow {
    Workflow::from_tree(ConfigTree::try_from(doc).unwrap(), &engine.variables).unwrap()
}

/// Expose a temp directory to workflows as `${{ root }}`
pub fn push_root(engine: &mut Engine, dir: &Path) {
    engine
        .variables
        .push("root", dir.display().to_string());
}
