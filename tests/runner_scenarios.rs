// tests/runner_scenarios.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use fleetrun::engine::Runner;
use fleetrun::outcome::LOCAL_TARGET;
use fleetrun::pool::PoolLimits;
use fleetrun::types::ExecutionStatus;
use fleetrun::workflow::{BoundParameter, ParameterKind};
use fleetrun_test_utils::builders::{StepBuilder, WorkflowBuilder};
use fleetrun_test_utils::fake_session::FakeScripts;
use fleetrun_test_utils::{init_tracing, with_timeout};
use serde_json::json;
use tokio::sync::watch;

type TestResult = Result<(), Box<dyn Error>>;

fn runner(scripts: &FakeScripts, max_size: usize, max_queue_size: usize) -> Runner<fleetrun_test_utils::fake_session::FakeSession> {
    let pool = scripts.pool(PoolLimits {
        max_size,
        preallocated_size: 0,
        max_queue_size,
    });
    Runner::new(Arc::new(pool))
}

#[tokio::test]
async fn local_script_success_produces_one_local_target() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new().with_success("./check.sh", vec![json!({"ok": true})]);
    let wf = WorkflowBuilder::new("health")
        .step(StepBuilder::local("check", "./check.sh").build())
        .build();

    let log = with_timeout(runner(&scripts, 2, 10).execute(&wf)).await?;

    assert_eq!(log.status, ExecutionStatus::Success);
    assert!(log.exec_error.is_none());
    assert!(log.ended_at.is_some());
    assert_eq!(log.execution_steps.len(), 1);

    let step = &log.execution_steps[0];
    assert_eq!(step.status, ExecutionStatus::Success);
    assert_eq!(step.targets.len(), 1);

    let target = &step.targets[0];
    assert_eq!(target.fqdn, LOCAL_TARGET);
    assert_eq!(target.status, ExecutionStatus::Success);
    assert!(target.errors.is_empty());
    assert_eq!(target.results, vec![json!({"ok": true})]);
    assert!(target.started_at.is_some() && target.ended_at.is_some());
    Ok(())
}

#[tokio::test]
async fn failing_script_marks_target_and_step_faulty() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new().with_failure("./break.sh", "disk full");
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::local("break", "./break.sh").build())
        .build();

    let runner = runner(&scripts, 1, 0);
    let log = with_timeout(runner.execute(&wf)).await?;

    assert_eq!(log.status, ExecutionStatus::Faulty);
    let step = &log.execution_steps[0];
    assert_eq!(step.status, ExecutionStatus::Faulty);
    assert!(step.exec_error.is_none());

    let target = &step.targets[0];
    assert_eq!(target.status, ExecutionStatus::Faulty);
    assert_eq!(target.errors.len(), 1);
    assert!(target.errors[0].message.contains("disk full"));
    assert_eq!(target.errors[0].error_key.as_deref(), Some("script_failed"));
    assert_eq!(target.errors[0].stack_trace, vec!["disk full"]);

    // The session went back to the pool despite the failure.
    let stats = runner.pool().stats();
    assert_eq!(stats.locked, 0);
    assert_eq!(stats.available, 1);
    Ok(())
}

#[tokio::test]
async fn abort_on_error_aborts_later_steps() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new().with_failure("./one.sh", "nope");
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::local("one", "./one.sh").abort_on_error(true).build())
        .step(StepBuilder::local("two", "./two.sh").build())
        .step(StepBuilder::local("three", "./three.sh").build())
        .build();

    let log = with_timeout(runner(&scripts, 1, 0).execute(&wf)).await?;

    assert_eq!(log.status, ExecutionStatus::Aborted);
    assert_eq!(log.execution_steps.len(), 3);
    assert_eq!(log.execution_steps[0].status, ExecutionStatus::Faulty);
    for step in &log.execution_steps[1..] {
        assert_eq!(step.status, ExecutionStatus::Aborted);
        assert!(step.targets.is_empty());
    }
    assert_eq!(scripts.commands(), vec!["./one.sh"]);
    Ok(())
}

#[tokio::test]
async fn failure_without_abort_on_error_keeps_going() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new().with_failure("./one.sh", "nope");
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::local("one", "./one.sh").build())
        .step(StepBuilder::local("two", "./two.sh").build())
        .build();

    let log = with_timeout(runner(&scripts, 1, 0).execute(&wf)).await?;

    assert_eq!(log.status, ExecutionStatus::Faulty);
    assert_eq!(log.execution_steps[1].status, ExecutionStatus::Success);
    assert_eq!(scripts.commands(), vec!["./one.sh", "./two.sh"]);
    Ok(())
}

#[tokio::test]
async fn disabled_only_target_skips_the_step() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::local("one", "./one.sh").build())
        .step(
            StepBuilder::remote("two", "./two.sh")
                .disabled_target("db1.example.com")
                .build(),
        )
        .build();

    let log = with_timeout(runner(&scripts, 2, 0).execute(&wf)).await?;

    assert_eq!(log.status, ExecutionStatus::Success);
    let step = &log.execution_steps[1];
    assert_eq!(step.status, ExecutionStatus::Skipped);
    assert_eq!(step.targets.len(), 1);
    assert_eq!(step.targets[0].status, ExecutionStatus::Skipped);
    assert_eq!(step.targets[0].fqdn, "db1.example.com");
    assert_eq!(scripts.commands(), vec!["./one.sh"]);
    Ok(())
}

#[tokio::test]
async fn disabled_step_is_skipped_without_targets() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::local("off", "./off.sh").disabled().build())
        .build();

    let log = with_timeout(runner(&scripts, 1, 0).execute(&wf)).await?;

    assert_eq!(log.execution_steps[0].status, ExecutionStatus::Skipped);
    assert!(log.execution_steps[0].targets.is_empty());
    assert_eq!(log.status, ExecutionStatus::Success);
    assert!(scripts.invocations().is_empty());
    Ok(())
}

#[tokio::test]
async fn remote_step_without_targets_is_skipped() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::remote("nobody", "./nobody.sh").abort_on_error(true).build())
        .step(StepBuilder::local("after", "./after.sh").build())
        .build();

    let runner = runner(&scripts, 1, 0);
    let log = with_timeout(runner.execute(&wf)).await?;

    let step = &log.execution_steps[0];
    assert_eq!(step.status, ExecutionStatus::Skipped);
    assert!(step.targets.is_empty());
    assert!(step.exec_error.is_none());
    assert_eq!(log.execution_steps[1].status, ExecutionStatus::Success);
    assert_eq!(log.status, ExecutionStatus::Success);
    assert_eq!(scripts.commands(), vec!["./after.sh"]);
    assert_eq!(runner.pool().stats().created, 1);
    Ok(())
}

#[tokio::test]
async fn empty_workflow_succeeds() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("empty").build();

    let log = runner(&scripts, 1, 0).execute(&wf).await?;
    assert_eq!(log.status, ExecutionStatus::Success);
    assert!(log.execution_steps.is_empty());
    Ok(())
}

#[tokio::test]
async fn targets_within_a_step_run_concurrently() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new().with_delay(Duration::from_millis(50));
    let wf = WorkflowBuilder::new("wf")
        .step(
            StepBuilder::remote("fanout", "./fan.sh")
                .target("a.example.com")
                .target("b.example.com")
                .target("c.example.com")
                .build(),
        )
        .build();

    let log = with_timeout(runner(&scripts, 3, 0).execute(&wf)).await?;

    assert_eq!(log.status, ExecutionStatus::Success);
    assert_eq!(scripts.max_in_flight(), 3);
    let fqdns: Vec<_> = log.execution_steps[0].targets.iter().map(|t| t.fqdn.as_str()).collect();
    assert_eq!(fqdns, vec!["a.example.com", "b.example.com", "c.example.com"]);
    Ok(())
}

#[tokio::test]
async fn targets_beyond_pool_size_wait_in_the_queue() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new().with_delay(Duration::from_millis(10));
    let wf = WorkflowBuilder::new("wf")
        .step(
            StepBuilder::remote("fanout", "./fan.sh")
                .target("a.example.com")
                .target("b.example.com")
                .target("c.example.com")
                .target("d.example.com")
                .build(),
        )
        .build();

    let runner = runner(&scripts, 1, 10);
    let log = with_timeout(runner.execute(&wf)).await?;

    assert_eq!(log.status, ExecutionStatus::Success);
    assert_eq!(scripts.max_in_flight(), 1);
    assert_eq!(scripts.created(), 1);
    assert_eq!(scripts.resets(), 4);
    assert_eq!(runner.pool().stats().available, 1);
    Ok(())
}

#[tokio::test]
async fn pool_exhaustion_is_recorded_on_the_step() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new().with_delay(Duration::from_millis(20));
    let wf = WorkflowBuilder::new("wf")
        .step(
            StepBuilder::remote("fanout", "./fan.sh")
                .target("a.example.com")
                .target("b.example.com")
                .build(),
        )
        .build();

    let log = with_timeout(runner(&scripts, 1, 0).execute(&wf)).await?;

    let step = &log.execution_steps[0];
    assert_eq!(step.status, ExecutionStatus::Faulty);
    assert_eq!(step.targets[0].status, ExecutionStatus::Success);
    assert_eq!(step.targets[1].status, ExecutionStatus::Faulty);

    let exec_error = step.exec_error.as_ref().ok_or("step-level error expected")?;
    assert_eq!(exec_error.error_key.as_deref(), Some("queue_overflow"));
    assert!(exec_error.message.contains("queue overflow"));
    Ok(())
}

#[tokio::test]
async fn parameters_are_bound_per_target() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("wf")
        .step(
            StepBuilder::remote("deploy", "./deploy.sh")
                .declare("Version", ParameterKind::String, true)
                .declare_with_default("Retries", ParameterKind::Integer, json!(2))
                .target_parameter("Server")
                .target("a.example.com")
                .target("b.example.com")
                .param("Version", "1.0")
                .param_for("Version", "1.1-canary", "b.example.com")
                .build(),
        )
        .build();

    let log = with_timeout(runner(&scripts, 2, 0).execute(&wf)).await?;
    assert_eq!(log.status, ExecutionStatus::Success);

    let mut calls = scripts.invocations();
    calls.sort_by_key(|c| c.parameters.last().map(|p| p.value.to_string()));
    assert_eq!(
        calls[0].parameters,
        vec![
            BoundParameter::new("Version", "1.0"),
            BoundParameter::new("Retries", 2),
            BoundParameter::new("Server", "a.example.com"),
        ]
    );
    assert_eq!(calls[1].parameters[0], BoundParameter::new("Version", "1.1-canary"));
    Ok(())
}

#[tokio::test]
async fn missing_mandatory_parameter_fails_only_that_target() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("wf")
        .step(
            StepBuilder::remote("deploy", "./deploy.sh")
                .declare("Version", ParameterKind::String, true)
                .target("a.example.com")
                .target("b.example.com")
                .param_for("Version", "2.0", "a.example.com")
                .build(),
        )
        .build();

    let log = with_timeout(runner(&scripts, 2, 0).execute(&wf)).await?;

    let step = &log.execution_steps[0];
    assert_eq!(step.targets[0].status, ExecutionStatus::Success);
    assert_eq!(step.targets[1].status, ExecutionStatus::Faulty);
    assert_eq!(
        step.targets[1].errors[0].error_key.as_deref(),
        Some("parameter_data_mismatch")
    );
    assert_eq!(scripts.invocations().len(), 1);
    Ok(())
}

#[tokio::test]
async fn script_enabled_flag_is_snapshotted() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::local("one", "./one.sh").script_disabled().build())
        .build();

    let log = with_timeout(runner(&scripts, 1, 0).execute(&wf)).await?;
    assert!(!log.execution_steps[0].script_enabled);
    assert_eq!(log.execution_steps[0].status, ExecutionStatus::Success);
    Ok(())
}

#[tokio::test]
async fn malformed_workflow_is_returned_as_error() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("wf")
        .step(
            StepBuilder::remote("dup", "./dup.sh")
                .target("a.example.com")
                .target("a.example.com")
                .build(),
        )
        .build();

    let err = runner(&scripts, 1, 0)
        .execute(&wf)
        .await
        .expect_err("duplicate targets are a contract violation");
    assert!(err.to_string().contains("invalid workflow"));
    assert!(scripts.invocations().is_empty());
    Ok(())
}

#[tokio::test]
async fn cancelled_before_start_marks_every_step() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new();
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::local("one", "./one.sh").build())
        .step(StepBuilder::local("two", "./two.sh").build())
        .build();

    let (tx, rx) = watch::channel(true);
    let log = runner(&scripts, 1, 0).with_cancel(rx).execute(&wf).await?;
    drop(tx);

    assert_eq!(log.status, ExecutionStatus::CancelledByUser);
    assert!(log
        .execution_steps
        .iter()
        .all(|s| s.status == ExecutionStatus::CancelledByUser));
    assert!(scripts.invocations().is_empty());
    Ok(())
}

#[tokio::test]
async fn cancel_during_a_step_lets_it_settle() -> TestResult {
    init_tracing();
    let scripts = FakeScripts::new().with_delay(Duration::from_millis(100));
    let wf = WorkflowBuilder::new("wf")
        .step(StepBuilder::local("one", "./one.sh").build())
        .step(StepBuilder::local("two", "./two.sh").build())
        .build();

    let (tx, rx) = watch::channel(false);
    let runner = runner(&scripts, 1, 0).with_cancel(rx);
    let (log, _) = with_timeout(async {
        tokio::join!(runner.execute(&wf), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        })
    })
    .await;
    let log = log?;

    assert_eq!(log.execution_steps[0].status, ExecutionStatus::Success);
    assert_eq!(log.execution_steps[1].status, ExecutionStatus::CancelledByUser);
    assert_eq!(log.status, ExecutionStatus::CancelledByUser);
    Ok(())
}
