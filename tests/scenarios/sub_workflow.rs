//! Nested workflows and their reported outcome

use crate::common::*;
use repoutils::EngineSettings;
use serde_json::json;

#[tokio::test]
async fn test_child_runs_inside_parent_step() {
    let dir = tempfile::tempdir().unwrap();
    write_document(
        dir.path(),
        "child.yaml",
        "name: child\nsteps:\n  - id: inner\n    output: from child\n",
    );

    let (mut engine, recorder) = recorded_engine();
    push_root(&mut engine, dir.path());
    let mut wf = workflow(
        &engine,
        json!({"id": "parent", "name": "parent", "steps": [
            {"id": "sub", "workflow": "${{ root }}/child.yaml"},
            {"id": "done", "output": "ok=${{ parent.sub.success }}"},
        ]}),
    );

    engine.execute(&mut wf, true).await.unwrap();
    assert_eq!(
        recorder.events(),
        vec![
            "pre_wf:parent",
            "pre_step:sub",
            "pre_wf:child",
            "pre_step:inner",
            "output:from child",
            "post_step:inner",
            "post_wf:child",
            "post_step:sub",
            "pre_step:done",
            "output:ok=true",
            "post_step:done",
            "post_wf:parent",
        ]
    );
    assert!(engine.variables.peek("parent.sub.error").unwrap().is_null());
}

#[tokio::test]
async fn test_soft_child_failure_is_captured() {
    let dir = tempfile::tempdir().unwrap();
    write_document(
        dir.path(),
        "broken.json",
        r#"{"name": "broken", "steps": [{"id": "x", "type": "nope"}]}"#,
    );

    let (mut engine, recorder) = recorded_engine();
    push_root(&mut engine, dir.path());
    let mut wf = workflow(
        &engine,
        json!({"id": "parent", "steps": [
            {"id": "sub", "workflow": "${{ root }}/broken.json", "fail-fast": false},
            {"id": "after", "output": "continued"},
        ]}),
    );

    let outcome = engine.execute(&mut wf, true).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(engine.variables.peek("parent.sub.success").unwrap(), false);
    let error = engine.variables.peek("parent.sub.error").unwrap();
    assert!(error.as_str().unwrap().contains("Unknown step type 'nope'"));
    assert_eq!(recorder.events_of("output:"), vec!["output:continued"]);
    assert_eq!(recorder.events_of("warning:").len(), 1);
}

#[tokio::test]
async fn test_missing_child_file_is_captured_when_soft() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _) = recorded_engine();
    push_root(&mut engine, dir.path());

    let mut wf = workflow(
        &engine,
        json!({"id": "p", "steps": [
            {"id": "sub", "workflow": "${{ root }}/missing.yaml", "fail-fast": false},
        ]}),
    );
    engine.execute(&mut wf, true).await.unwrap();
    assert_eq!(engine.variables.peek("p.sub.success").unwrap(), false);

    let mut strict = workflow(
        &engine,
        json!({"steps": [{"workflow": "${{ root }}/missing.yaml"}]}),
    );
    assert!(engine.execute(&mut strict, true).await.is_err());
}

#[tokio::test]
async fn test_self_reference_hits_depth_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_document(
        dir.path(),
        "loop.yaml",
        "steps:\n  - workflow: \"${{ self }}\"\n",
    );

    let (mut engine, recorder) = recorded_engine_with(EngineSettings::new().with_max_depth(3));
    engine.variables.push("self", path.display().to_string());

    let err = engine.run_workflow_file(&path, true).await.unwrap_err();
    assert!(err.to_string().contains("maximum nesting depth of 3"));
    assert_eq!(recorder.events_of("pre_wf:").len(), 3);
    assert!(recorder.events_of("post_wf:").is_empty());
}
