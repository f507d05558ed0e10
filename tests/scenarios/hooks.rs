//! Project configuration loading and hook execution

use crate::common::*;
use repoutils::{Error, ErrorKind, ProjectConfig};
use serde_json::json;
use std::path::Path;

fn write_project(dir: &Path, config: serde_json::Value) {
    write_document(dir, "repoutils.json", &config.to_string());
}

#[tokio::test]
async fn test_hook_runs_inline_then_external_then_command() {
    let dir = tempfile::tempdir().unwrap();
    write_document(
        dir.path(),
        "release.yaml",
        "name: release\nsteps:\n  - output: external ${{ channel }}\n",
    );
    write_project(
        dir.path(),
        json!({
            "name": "demo",
            "version": "1.2",
            "hooks": {
                "publish": {
                    "vars": {"channel": "beta"},
                    "workflow": [{"output": "inline ${{ channel }}"}],
                    "run": "${{ root }}/release.yaml",
                    "exec": "exit 0",
                }
            }
        }),
    );

    let (mut engine, recorder) = recorded_engine();
    push_root(&mut engine, dir.path());
    let project = ProjectConfig::load(dir.path(), &engine.variables).unwrap();
    assert_eq!(project.version.to_string(), "1.2.0");

    project.run_hook("publish", &mut engine).await.unwrap();

    let relevant: Vec<String> = recorder
        .events()
        .into_iter()
        .filter(|event| event.starts_with("output:") || event.starts_with("exec:"))
        .collect();
    assert_eq!(
        relevant,
        vec!["output:inline beta", "output:external beta", "exec:exit 0"]
    );
    assert!(!engine.variables.contains("channel"));
}

#[tokio::test]
async fn test_hook_vars_popped_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        json!({
            "name": "demo",
            "version": "0.1.0",
            "hooks": {
                "broken": {
                    "vars": {"mode": "inner"},
                    "workflow": [{"id": "bad", "type": "unknown-kind"}]
                }
            }
        }),
    );

    let (mut engine, _) = recorded_engine();
    engine.variables.push("mode", "outer");
    let project = ProjectConfig::load(dir.path(), &engine.variables).unwrap();

    let err = project.run_hook("broken", &mut engine).await.unwrap_err();
    assert!(err.to_string().contains("unknown-kind"));
    assert_eq!(engine.variables.peek("mode").unwrap(), "outer");
    assert_eq!(engine.variables.depth("mode"), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_hook_vars_popped_after_failing_command() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        json!({
            "name": "demo",
            "version": "0.1.0",
            "hooks": {"check": {"vars": {"x": "1"}, "exec": "echo ${{ x }}; exit 4"}}
        }),
    );

    let (mut engine, recorder) = recorded_engine();
    let project = ProjectConfig::load(dir.path(), &engine.variables).unwrap();

    let err = project.run_hook("check", &mut engine).await.unwrap_err();
    assert!(matches!(err, Error::Process { code: 4, .. }));
    assert_eq!(recorder.events_of("exec:"), vec!["exec:echo 1; exit 4"]);
    assert_eq!(recorder.events_of("exited:"), vec!["exited:4:true"]);
    assert!(!engine.variables.contains("x"));
}

#[tokio::test]
async fn test_unknown_hook_lists_available_ones() {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        json!({
            "name": "demo",
            "version": "0.1.0",
            "hooks": {"build": {"exec": "true"}, "test": {"exec": "true"}}
        }),
    );

    let (mut engine, recorder) = recorded_engine();
    let project = ProjectConfig::load(dir.path(), &engine.variables).unwrap();

    let err = project.run_hook("deploy", &mut engine).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    let hint = err.hint().unwrap();
    assert!(hint.contains("build") && hint.contains("test"));
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_included_hooks_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("extra")).unwrap();
    write_document(
        &dir.path().join("extra"),
        "repoutils.json",
        // JSON5: comments and trailing commas are accepted
        "{ // shared hooks\n  hooks: { lint: { workflow: [{ output: 'linted' }] }, },\n}",
    );
    write_project(
        dir.path(),
        json!({
            "name": "demo",
            "version": "2.0.0",
            "includes": ["extra"],
            "hooks": {"build": {"workflow": [{"output": "built"}]}}
        }),
    );

    let (mut engine, recorder) = recorded_engine();
    let project = ProjectConfig::load(dir.path(), &engine.variables).unwrap();
    assert_eq!(project.loaded_files.len(), 2);

    let mut names = project.hook_names();
    names.sort_unstable();
    assert_eq!(names, vec!["build", "lint"]);

    project.run_hook("lint", &mut engine).await.unwrap();
    assert_eq!(recorder.events_of("output:"), vec!["output:linted"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_hook_exec_list_runs_without_shell() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("touched");
    write_project(
        dir.path(),
        json!({
            "name": "demo",
            "version": "0.1.0",
            "hooks": {"touch": {"exec": ["touch", "${{ marker }}"]}}
        }),
    );

    let (mut engine, recorder) = recorded_engine();
    engine.variables.push("marker", marker.display().to_string());
    let project = ProjectConfig::load(dir.path(), &engine.variables).unwrap();

    project.run_hook("touch", &mut engine).await.unwrap();
    assert!(marker.exists());
    assert_eq!(recorder.events_of("exited:"), vec!["exited:0:true"]);
}
