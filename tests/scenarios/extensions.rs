//! Extensions registering step types and triggers at runtime

use crate::common::*;
use async_trait::async_trait;
use repoutils::core::step::{Action, StepMeta};
use repoutils::core::variable::Lookup;
use repoutils::plugins::AuditExtension;
use repoutils::{
    ConfigTree, Engine, Extension, ExtensionCatalog, ExtensionHost, Result, StepKind, Trigger,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// `shout`: emits its text in upper case
struct ShoutKind;

#[derive(Debug)]
struct Shout {
    text: String,
}

impl StepKind for ShoutKind {
    fn parse(&self, doc: &ConfigTree, vars: &dyn Lookup) -> Result<Box<dyn Action>> {
        Ok(Box::new(Shout {
            text: doc.get_str("shout", vars)?,
        }))
    }
}

#[async_trait]
impl Action for Shout {
    async fn execute(&self, step: &StepMeta, engine: &mut Engine) -> Result<()> {
        let loud = self.text.to_uppercase();
        engine.variables.push(step.var("text"), loud.as_str());
        engine.triggers.dispatch("on_output", |t| t.on_output(&loud))
    }
}

#[derive(Default)]
struct Counter {
    outputs: Mutex<usize>,
}

impl Trigger for Counter {
    fn on_output(&self, _msg: &str) -> Result<()> {
        *self.outputs.lock().unwrap() += 1;
        Ok(())
    }
}

struct ShoutExtension {
    counter: Arc<Counter>,
}

impl Extension for ShoutExtension {
    fn register(&self, host: &mut ExtensionHost<'_>) -> Result<()> {
        host.register_step_type("shout", Arc::new(ShoutKind), &["shout"])?;
        host.register_trigger("counter", self.counter.clone())?;
        host.push_variable("shout.loaded", Value::Bool(true));
        Ok(())
    }
}

fn engine_with_shout() -> (Engine, Arc<RecordingTrigger>, Arc<Counter>) {
    let counter = Arc::new(Counter::default());
    let registered = counter.clone();
    let catalog = ExtensionCatalog::with_builtins().with("shout", move || {
        Ok(Arc::new(ShoutExtension {
            counter: registered.clone(),
        }) as Arc<dyn Extension>)
    });

    let (engine, recorder) = recorded_engine();
    (engine.with_loader(Arc::new(catalog)), recorder, counter)
}

#[tokio::test]
async fn test_extension_step_type_usable_by_later_steps() {
    let (mut engine, recorder, counter) = engine_with_shout();
    let mut wf = workflow(
        &engine,
        json!({"id": "wf", "steps": [
            {"id": "load", "extension": "plugins/shout.py"},
            {"id": "loud", "shout": "hello"},
            {"id": "echo", "output": "${{ wf.loud.text }}"},
        ]}),
    );

    engine.execute(&mut wf, true).await.unwrap();

    assert_eq!(
        recorder.events_of("output:"),
        vec!["output:HELLO", "output:HELLO"]
    );
    assert_eq!(*counter.outputs.lock().unwrap(), 2);
    assert_eq!(engine.variables.peek("shout.loaded").unwrap(), true);
    assert_eq!(wf.steps().nth(1).unwrap().kind(), "shout");
}

#[tokio::test]
async fn test_triggers_dispatch_in_registration_order() {
    let (mut engine, recorder, _) = engine_with_shout();
    let mut wf = workflow(
        &engine,
        json!({"steps": [{"extension": "shout"}]}),
    );
    engine.execute(&mut wf, true).await.unwrap();

    assert_eq!(engine.triggers.signs(), vec!["recorder", "counter"]);
    assert!(!recorder.events().is_empty());
}

#[tokio::test]
async fn test_unknown_extension_strict_and_lenient() {
    let (mut engine, recorder, _) = engine_with_shout();

    let mut lenient = workflow(
        &engine,
        json!({"steps": [{"extension": "nothing-here", "strict": false}]}),
    );
    engine.execute(&mut lenient, true).await.unwrap();
    let warnings = recorder.events_of("warning:");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("nothing-here"));

    let mut strict = workflow(&engine, json!({"steps": [{"extension": "nothing-here"}]}));
    let err = engine.execute(&mut strict, true).await.unwrap_err();
    assert!(err.to_string().contains("nothing-here"));
}

#[tokio::test]
async fn test_loading_twice_rejects_duplicate_sign() {
    let (mut engine, _, _) = engine_with_shout();
    let mut wf = workflow(
        &engine,
        json!({"steps": [{"extension": "shout"}, {"extension": "shout"}]}),
    );

    let err = engine.execute(&mut wf, true).await.unwrap_err();
    assert!(err.to_string().contains("counter"));
}

#[tokio::test]
async fn test_audit_extension_records_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("trail.jsonl");
    let factory_path = audit_path.clone();
    let catalog = ExtensionCatalog::new().with("audit", move || {
        Ok(Arc::new(AuditExtension::new(factory_path.clone())) as Arc<dyn Extension>)
    });

    let (engine, _) = recorded_engine();
    let mut engine = engine.with_loader(Arc::new(catalog));
    let mut wf = workflow(
        &engine,
        json!({"name": "audited", "steps": [
            {"extension": "audit"},
            {"id": "say", "output": "recorded"},
        ]}),
    );
    engine.execute(&mut wf, true).await.unwrap();

    let records: Vec<Value> = std::fs::read_to_string(&audit_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let triggers: Vec<&str> = records
        .iter()
        .map(|record| record["trigger"].as_str().unwrap())
        .collect();

    // registered while the first step ran, so its own post-step is the first record
    assert_eq!(
        triggers,
        vec![
            "post_run_workflow_step",
            "pre_run_workflow_step",
            "on_output",
            "post_run_workflow_step",
            "post_run_workflow",
        ]
    );
    assert!(records.iter().all(|record| record["timestamp"].is_string()));
}
