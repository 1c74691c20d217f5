// src/outcome.rs

//! Execution log produced by a workflow run.
//!
//! The log mirrors the workflow shape: one [`ExecutionStep`] per workflow
//! step, in order, whatever happened to it. Serialized field names are
//! camelCase so the JSON can be consumed as-is by other tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Diagnostic;
use crate::types::ExecutionStatus;
use crate::workflow::{Workflow, WorkflowStep};

/// Synthetic identity used when a script does not target servers.
pub const LOCAL_TARGET: &str = "local";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub stack_trace: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_key: Option<String>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            stack_trace: Vec::new(),
            error_key: None,
        }
    }

    /// Record a diagnostic error with its code and trace lines.
    pub fn capture<E: Diagnostic>(err: &E) -> Self {
        Self {
            timestamp: Utc::now(),
            message: err.to_string(),
            stack_trace: err.trace_lines(),
            error_key: Some(err.code().key.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTarget {
    pub name: String,
    pub fqdn: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub errors: Vec<ExecutionError>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExecutionTarget {
    pub fn new(name: impl Into<String>, fqdn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fqdn: fqdn.into(),
            status: ExecutionStatus::Pending,
            results: Vec::new(),
            errors: Vec::new(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn local() -> Self {
        Self::new(LOCAL_TARGET, LOCAL_TARGET)
    }

    pub fn skipped(name: impl Into<String>, fqdn: impl Into<String>) -> Self {
        let mut t = Self::new(name, fqdn);
        t.status.advance(ExecutionStatus::Skipped);
        t
    }

    pub(crate) fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status.advance(ExecutionStatus::Running);
    }

    pub(crate) fn succeed(&mut self, results: Vec<Value>) {
        self.results = results;
        self.ended_at = Some(Utc::now());
        self.status.advance(ExecutionStatus::Success);
    }

    pub(crate) fn fail(&mut self, error: ExecutionError) {
        self.errors.push(error);
        self.ended_at = Some(Utc::now());
        self.status.advance(ExecutionStatus::Faulty);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub step_name: String,
    pub script_name: String,
    pub script_enabled: bool,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub targets: Vec<ExecutionTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_error: Option<ExecutionError>,
}

impl ExecutionStep {
    /// A step that never ran, recorded with a terminal `status`.
    pub fn without_targets(step: &WorkflowStep, status: ExecutionStatus) -> Self {
        let mut s = Self::pending(step);
        s.status.advance(status);
        s
    }

    pub fn pending(step: &WorkflowStep) -> Self {
        Self {
            step_name: step.name.clone(),
            script_name: step.script.name.clone(),
            script_enabled: step.script.enabled,
            status: ExecutionStatus::Pending,
            targets: Vec::new(),
            exec_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_error: Option<ExecutionError>,
    #[serde(default)]
    pub execution_steps: Vec<ExecutionStep>,
}

impl ExecutionLog {
    pub fn begin(workflow: &Workflow) -> Self {
        Self {
            workflow_name: workflow.name.clone(),
            started_at: Utc::now(),
            ended_at: None,
            status: ExecutionStatus::Running,
            exec_error: None,
            execution_steps: Vec::with_capacity(workflow.steps.len()),
        }
    }

    /// Log for a run that could not begin at all.
    ///
    /// Every step is recorded as Aborted so the log still has one entry per
    /// workflow step.
    pub fn failed_to_start(workflow: &Workflow, error: ExecutionError) -> Self {
        let mut log = Self::begin(workflow);
        log.execution_steps = workflow
            .steps
            .iter()
            .map(|s| ExecutionStep::without_targets(s, ExecutionStatus::Aborted))
            .collect();
        log.exec_error = Some(error);
        log.status.advance(ExecutionStatus::Aborted);
        log.ended_at = Some(Utc::now());
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PoolError;
    use crate::workflow::Script;

    fn wf_step(name: &str) -> WorkflowStep {
        WorkflowStep {
            name: name.into(),
            enabled: true,
            abort_on_error: false,
            script: Script {
                name: format!("{name}-script"),
                path: "./x.sh".into(),
                enabled: false,
                targets_servers: false,
                target_parameter: None,
                parameters: vec![],
            },
            parameters: vec![],
            targets: vec![],
        }
    }

    #[test]
    fn failed_to_start_keeps_one_step_per_workflow_step() {
        let wf = Workflow {
            name: "wf".into(),
            description: String::new(),
            steps: vec![wf_step("a"), wf_step("b")],
        };
        let log = ExecutionLog::failed_to_start(&wf, ExecutionError::new("no interpreter"));

        assert_eq!(log.status, ExecutionStatus::Aborted);
        assert_eq!(log.execution_steps.len(), 2);
        assert!(log.execution_steps.iter().all(|s| s.status == ExecutionStatus::Aborted));
        assert!(!log.execution_steps[0].script_enabled);
        assert!(log.ended_at.is_some());
    }

    #[test]
    fn captured_error_carries_key() {
        let err = ExecutionError::capture(&PoolError::Closed);
        assert_eq!(err.error_key.as_deref(), Some("pool_closed"));
        assert_eq!(err.message, "resource pool is closed");
    }

    #[test]
    fn log_serializes_camel_case() {
        let wf = Workflow {
            name: "wf".into(),
            description: String::new(),
            steps: vec![wf_step("a")],
        };
        let log = ExecutionLog::failed_to_start(&wf, ExecutionError::new("x"));
        let json = serde_json::to_value(&log).expect("serialize");
        assert!(json.get("executionSteps").is_some());
        assert_eq!(json["executionSteps"][0]["stepName"], "a");
        assert_eq!(json["status"], "Aborted");
    }
}
