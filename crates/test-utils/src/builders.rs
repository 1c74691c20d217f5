#![allow(dead_code)]

use fleetrun::workflow::{
    ParameterKind, ParameterValue, Script, ScriptParameter, Target, Workflow, WorkflowStep,
};
use serde_json::Value;

/// Builder for `Workflow` to simplify test setup.
pub struct WorkflowBuilder {
    workflow: Workflow,
}

impl WorkflowBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            workflow: Workflow {
                name: name.to_string(),
                description: String::new(),
                steps: Vec::new(),
            },
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.workflow.description = text.to_string();
        self
    }

    pub fn step(mut self, step: WorkflowStep) -> Self {
        self.workflow.steps.push(step);
        self
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }
}

/// Builder for `WorkflowStep` and its script.
pub struct StepBuilder {
    step: WorkflowStep,
}

impl StepBuilder {
    /// Step whose script runs once against the synthetic local target.
    pub fn local(name: &str, script_path: &str) -> Self {
        Self {
            step: WorkflowStep {
                name: name.to_string(),
                enabled: true,
                abort_on_error: false,
                script: Script {
                    name: script_path.to_string(),
                    path: script_path.to_string(),
                    enabled: true,
                    targets_servers: false,
                    target_parameter: None,
                    parameters: vec![],
                },
                parameters: vec![],
                targets: vec![],
            },
        }
    }

    /// Step whose script runs once per listed target.
    pub fn remote(name: &str, script_path: &str) -> Self {
        let mut builder = Self::local(name, script_path);
        builder.step.script.targets_servers = true;
        builder
    }

    pub fn abort_on_error(mut self, val: bool) -> Self {
        self.step.abort_on_error = val;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.step.enabled = false;
        self
    }

    pub fn script_disabled(mut self) -> Self {
        self.step.script.enabled = false;
        self
    }

    pub fn target(mut self, fqdn: &str) -> Self {
        self.step.targets.push(Target::new(fqdn));
        self
    }

    pub fn disabled_target(mut self, fqdn: &str) -> Self {
        let mut t = Target::new(fqdn);
        t.enabled = false;
        self.step.targets.push(t);
        self
    }

    pub fn declare(mut self, name: &str, kind: ParameterKind, mandatory: bool) -> Self {
        self.step.script.parameters.push(ScriptParameter {
            name: name.to_string(),
            kind,
            mandatory,
            default: None,
        });
        self
    }

    pub fn declare_with_default(mut self, name: &str, kind: ParameterKind, default: Value) -> Self {
        self.step.script.parameters.push(ScriptParameter {
            name: name.to_string(),
            kind,
            mandatory: false,
            default: Some(default),
        });
        self
    }

    pub fn target_parameter(mut self, name: &str) -> Self {
        self.step.script.target_parameter = Some(name.to_string());
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.step.parameters.push(ParameterValue::global(name, value));
        self
    }

    pub fn param_for(mut self, name: &str, value: impl Into<Value>, fqdn: &str) -> Self {
        self.step
            .parameters
            .push(ParameterValue::for_target(name, value, fqdn));
        self
    }

    pub fn build(self) -> WorkflowStep {
        self.step
    }
}
