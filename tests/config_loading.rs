// tests/config_loading.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use fleetrun::config::{load_and_validate, load_workflow};
use fleetrun::errors::FleetrunError;
use fleetrun::workflow::{ParameterKind, validate_workflow};
use serde_json::json;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn demo_config_loads() -> TestResult {
    let cfg = load_and_validate(demo("Fleetrun.toml"))?;

    let limits = cfg.pool_limits();
    assert_eq!(limits.max_size, 4);
    assert_eq!(limits.preallocated_size, 1);
    assert_eq!(limits.max_queue_size, 100);

    let spec = cfg.interpreter_spec();
    assert_eq!(spec.program, "sh");
    assert_eq!(spec.working_dir, Some(PathBuf::from("demos")));
    assert_eq!(spec.env.get("DEPLOY_ENV").map(String::as_str), Some("staging"));
    assert_eq!(cfg.framer().sentinel(), "__FLEETRUN_DONE__");
    Ok(())
}

#[test]
fn demo_toml_workflow_loads_and_validates() -> TestResult {
    let wf = load_workflow(demo("deploy.toml"))?;
    validate_workflow(&wf)?;

    assert_eq!(wf.name, "deploy-web");
    assert_eq!(wf.steps.len(), 3);

    let rollout = &wf.steps[1];
    assert!(rollout.abort_on_error);
    assert!(rollout.script.targets_servers);
    assert_eq!(rollout.script.target_parameter.as_deref(), Some("Host"));
    assert_eq!(rollout.script.parameters.len(), 2);
    assert_eq!(rollout.script.parameters[1].kind, ParameterKind::Integer);
    assert_eq!(rollout.script.parameters[1].default, Some(json!(2)));
    assert_eq!(rollout.parameters[1].target.as_deref(), Some("web3.example.com"));
    assert_eq!(rollout.targets.len(), 4);
    assert!(!rollout.targets[3].enabled);
    assert_eq!(rollout.targets[2].display_name(), "web3 (canary)");
    Ok(())
}

#[test]
fn demo_json_workflow_loads_and_validates() -> TestResult {
    let wf = load_workflow(demo("deploy.json"))?;
    validate_workflow(&wf)?;

    assert_eq!(wf.name, "restart-workers");
    assert_eq!(wf.steps[0].targets.len(), 2);
    assert_eq!(wf.steps[0].parameters[0].value, json!("current"));
    Ok(())
}

#[test]
fn unknown_workflow_extension_is_rejected() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("workflow.yaml");
    fs::write(&path, "name: nope")?;

    match load_workflow(&path) {
        Err(FleetrunError::ConfigError(msg)) => assert!(msg.contains(".toml or .json")),
        other => return Err(format!("expected config error, got {other:?}").into()),
    }
    Ok(())
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("Fleetrun.toml");
    fs::write(&path, "[pool\nmax_size = 3")?;

    assert!(matches!(load_and_validate(&path), Err(FleetrunError::TomlError(_))));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let result = load_and_validate("/definitely/not/here/Fleetrun.toml");
    assert!(matches!(result, Err(FleetrunError::IoError(_))));
}

#[test]
fn max_sessions_override_replaces_pool_size() -> TestResult {
    let cfg = load_and_validate(demo("Fleetrun.toml"))?.with_max_sessions(7);
    assert_eq!(cfg.pool_limits().max_size, 7);
    Ok(())
}
