//! Fail-fast and fail-soft behaviour around failing steps

use crate::common::*;
use repoutils::{EngineSettings, Error, ErrorKind, RunOutcome};
use serde_json::json;

#[cfg(unix)]
#[tokio::test]
async fn test_tolerated_exit_code_is_published() {
    let (mut engine, recorder) = recorded_engine();
    let mut wf = workflow(
        &engine,
        json!({
            "id": "wf",
            "steps": [
                {"id": "bad", "run": "exit 1", "fail-on-error": false},
                {"id": "after", "output": "code ${{ wf.bad.retcode }}"},
            ]
        }),
    );

    let outcome = engine.execute(&mut wf, true).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(recorder.events_of("exited:"), vec!["exited:1:false"]);
    assert_eq!(recorder.events_of("output:"), vec!["output:code 1"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_command_stops_the_workflow() {
    let (mut engine, recorder) = recorded_engine();
    let mut wf = workflow(
        &engine,
        json!({"steps": [
            {"id": "bad", "run": "exit 3"},
            {"id": "never", "output": "unreachable"},
        ]}),
    );

    let err = engine.execute(&mut wf, true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalEffect);
    assert!(matches!(err, Error::Process { code: 3, .. }));
    assert!(err.to_string().contains("exited with code 3"));
    assert!(recorder.events_of("output:").is_empty());
    assert!(recorder.events_of("post_wf:").is_empty());
    assert!(!wf.is_built());
}

#[tokio::test]
async fn test_fail_soft_turns_error_into_warning() {
    let (mut engine, recorder) = recorded_engine();
    let mut wf = workflow(
        &engine,
        json!({"name": "soft", "steps": [{"id": "x", "type": "missing-type"}]}),
    );

    let outcome = engine.execute(&mut wf, false).await.unwrap();
    match &outcome {
        RunOutcome::Failed(error) => assert!(error.to_string().contains("missing-type")),
        RunOutcome::Completed => panic!("workflow should have failed"),
    }

    let warnings = recorder.events_of("warning:");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("warning:Workflow 'soft' failed:"));
    assert!(outcome.into_result().is_err());
}

#[tokio::test]
async fn test_unreadable_file_is_captured_when_soft() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, recorder) = recorded_engine();

    let missing = dir.path().join("absent.yaml");
    let outcome = engine.run_workflow_file(&missing, false).await.unwrap();
    assert!(!outcome.is_success());
    assert_eq!(recorder.events_of("warning:").len(), 1);

    let err = engine.run_workflow_file(&missing, true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalEffect);
}

#[tokio::test]
async fn test_unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_document(dir.path(), "flow.toml", "steps = []");
    let (mut engine, _) = recorded_engine();

    let err = engine.run_workflow_file(&path, true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.hint().unwrap().contains(".yaml"));
}

#[tokio::test]
async fn test_missing_copy_source_is_a_warning_when_not_strict() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, recorder) = recorded_engine();
    push_root(&mut engine, dir.path());

    let mut wf = workflow(
        &engine,
        json!({"steps": [
            {"copy": "${{ root }}/nothing", "to": "${{ root }}/dst", "strict": false},
        ]}),
    );
    engine.execute(&mut wf, true).await.unwrap();

    let warnings = recorder.events_of("warning:");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("does not exist"));
    assert!(!dir.path().join("dst").exists());

    let mut strict = workflow(
        &engine,
        json!({"steps": [{"copy": "${{ root }}/nothing", "to": "${{ root }}/dst"}]}),
    );
    assert!(engine.execute(&mut strict, true).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_is_tolerated_with_fail_on_error_off() {
    let (mut engine, recorder) = recorded_engine_with(EngineSettings::new().with_timeout(1));
    let mut wf = workflow(
        &engine,
        json!({"id": "wf", "steps": [
            {"id": "slow", "run": "sleep 5", "fail-on-error": false},
        ]}),
    );

    engine.execute(&mut wf, true).await.unwrap();
    assert_eq!(engine.variables.peek("wf.slow.retcode").unwrap(), -1);
    assert_eq!(recorder.events_of("exited:"), vec!["exited:-1:false"]);

    let mut strict = workflow(
        &engine,
        json!({"steps": [{"run": "sleep 5"}]}),
    );
    let err = engine.execute(&mut strict, true).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { secs: 1, .. }));
    assert!(err.hint().is_some());
}
