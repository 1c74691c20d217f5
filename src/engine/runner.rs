// src/engine/runner.rs

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::errors::RunnerError;
use crate::exec::ScriptHost;
use crate::outcome::{ExecutionError, ExecutionLog, ExecutionStep, ExecutionTarget};
use crate::pool::{Poolable, ResourcePool};
use crate::types::ExecutionStatus;
use crate::workflow::{Target, Workflow, WorkflowStep, bind_parameters, validate_workflow};

use super::rollup::{step_status, workflow_status};

/// Runs workflows against sessions borrowed from a pool.
///
/// Steps run strictly one after another. Targets within a step run
/// concurrently; the only limit is the pool itself.
pub struct Runner<S: ScriptHost + Poolable> {
    pool: Arc<ResourcePool<S>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<S: ScriptHost + Poolable> fmt::Debug for Runner<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("pool", &self.pool.stats())
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl<S: ScriptHost + Poolable> Runner<S> {
    pub fn new(pool: Arc<ResourcePool<S>>) -> Self {
        Self { pool, cancel: None }
    }

    /// Stop starting new steps once `cancel` turns `true`.
    ///
    /// The step in flight settles normally; every later step is recorded as
    /// CancelledByUser.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn pool(&self) -> &Arc<ResourcePool<S>> {
        &self.pool
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run `workflow` and return its execution log.
    ///
    /// Only a malformed workflow is returned as an error; everything that
    /// goes wrong while running is recorded in the log.
    pub async fn execute(&self, workflow: &Workflow) -> Result<ExecutionLog, RunnerError> {
        validate_workflow(workflow)?;

        let mut log = ExecutionLog::begin(workflow);
        info!(workflow = %workflow.name, steps = workflow.steps.len(), "workflow started");

        let mut halted = false;
        for step in &workflow.steps {
            let record = if self.is_cancelled() {
                info!(step = %step.name, "run cancelled; not starting step");
                ExecutionStep::without_targets(step, ExecutionStatus::CancelledByUser)
            } else if halted {
                info!(step = %step.name, "earlier step failed with abort_on_error; step aborted");
                ExecutionStep::without_targets(step, ExecutionStatus::Aborted)
            } else if !step.enabled {
                info!(step = %step.name, "step disabled; skipping");
                ExecutionStep::without_targets(step, ExecutionStatus::Skipped)
            } else {
                self.run_step(step).await
            };

            if record.status == ExecutionStatus::Faulty && step.abort_on_error {
                warn!(step = %step.name, "step failed; aborting remaining steps");
                halted = true;
            }
            log.execution_steps.push(record);
        }

        log.status.advance(workflow_status(&log.execution_steps));
        log.ended_at = Some(Utc::now());
        info!(workflow = %workflow.name, status = %log.status, "workflow finished");
        Ok(log)
    }

    async fn run_step(&self, step: &WorkflowStep) -> ExecutionStep {
        let mut record = ExecutionStep::pending(step);
        record.status.advance(ExecutionStatus::Running);

        let targets: Vec<Option<&Target>> = if step.script.targets_servers {
            step.targets.iter().map(Some).collect()
        } else {
            vec![None]
        };
        info!(step = %step.name, script = %step.script.name, targets = targets.len(), "step started");

        let settled = join_all(targets.into_iter().map(|t| self.run_target(step, t))).await;
        for (target, exec_error) in settled {
            if record.exec_error.is_none() {
                record.exec_error = exec_error;
            }
            record.targets.push(target);
        }

        record.status.advance(step_status(&record.targets));
        info!(step = %step.name, status = %record.status, "step finished");
        record
    }

    /// Run the step's script for one target.
    ///
    /// Returns the target record plus a step-level error when the failure was
    /// not the script's fault (no session could be obtained).
    async fn run_target(
        &self,
        step: &WorkflowStep,
        target: Option<&Target>,
    ) -> (ExecutionTarget, Option<ExecutionError>) {
        let mut record = match target {
            Some(t) => ExecutionTarget::new(t.display_name(), t.fqdn.clone()),
            None => ExecutionTarget::local(),
        };

        if target.is_some_and(|t| !t.enabled) {
            debug!(step = %step.name, target = %record.fqdn, "target disabled; skipping");
            record.status.advance(ExecutionStatus::Skipped);
            return (record, None);
        }

        record.start();

        let parameters = match bind_parameters(&step.script, &step.parameters, target) {
            Ok(p) => p,
            Err(e) => {
                warn!(step = %step.name, target = %record.fqdn, error = %e, "parameter binding failed");
                record.fail(ExecutionError::capture(&e));
                return (record, None);
            }
        };

        let mut session = match self.pool.acquire().await {
            Ok(lease) => lease,
            Err(e) => {
                warn!(step = %step.name, target = %record.fqdn, error = %e, "no session available");
                let err = ExecutionError::capture(&e);
                record.fail(err.clone());
                return (record, Some(err));
            }
        };

        debug!(step = %step.name, target = %record.fqdn, slot = session.slot(), "invoking script");
        let outcome = ScriptHost::invoke(&mut *session, &step.script.path, &parameters).await;

        if let Err(e) = self.pool.release(session) {
            error!(step = %step.name, target = %record.fqdn, error = %e, "failed to release session");
        }

        match outcome {
            Ok(results) => record.succeed(results),
            Err(e) => record.fail(ExecutionError::capture(&e)),
        }
        debug!(step = %step.name, target = %record.fqdn, status = %record.status, "target settled");
        (record, None)
    }
}
