// src/workflow/validate.rs

use std::collections::HashSet;

use regex::Regex;

use crate::errors::RunnerError;
use crate::workflow::model::{Workflow, WorkflowStep};

const PARAMETER_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_-]*$";

/// Check the structural contract the runner relies on.
///
/// Everything rejected here is a defect in the workflow definition itself,
/// not something that can go wrong while running it.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), RunnerError> {
    let name_re = Regex::new(PARAMETER_NAME_PATTERN)
        .map_err(|e| RunnerError::InvalidWorkflow(format!("parameter name pattern: {e}")))?;

    if workflow.name.trim().is_empty() {
        return Err(invalid("workflow name must not be empty".to_string()));
    }

    for (idx, step) in workflow.steps.iter().enumerate() {
        validate_step(idx, step, &name_re)?;
    }
    Ok(())
}

fn invalid(msg: String) -> RunnerError {
    RunnerError::InvalidWorkflow(msg)
}

fn validate_step(idx: usize, step: &WorkflowStep, name_re: &Regex) -> Result<(), RunnerError> {
    if step.name.trim().is_empty() {
        return Err(invalid(format!("step #{} has an empty name", idx + 1)));
    }
    let script = &step.script;
    if script.name.trim().is_empty() {
        return Err(invalid(format!("step '{}' references a script with an empty name", step.name)));
    }
    if script.path.trim().is_empty() {
        return Err(invalid(format!("script '{}' in step '{}' has an empty path", script.name, step.name)));
    }

    let mut declared = HashSet::new();
    for p in &script.parameters {
        if !name_re.is_match(&p.name) {
            return Err(invalid(format!(
                "script '{}' declares invalid parameter name '{}'",
                script.name, p.name
            )));
        }
        if !declared.insert(p.name.as_str()) {
            return Err(invalid(format!(
                "script '{}' declares parameter '{}' more than once",
                script.name, p.name
            )));
        }
    }
    if let Some(tp) = script.target_parameter.as_deref() {
        if !name_re.is_match(tp) {
            return Err(invalid(format!(
                "script '{}' has invalid target parameter name '{}'",
                script.name, tp
            )));
        }
    }
    for v in &step.parameters {
        if !name_re.is_match(&v.name) {
            return Err(invalid(format!(
                "step '{}' supplies invalid parameter name '{}'",
                step.name, v.name
            )));
        }
    }

    if !script.targets_servers {
        return Ok(());
    }

    let mut fqdns = HashSet::new();
    for t in &step.targets {
        if t.fqdn.trim().is_empty() {
            return Err(invalid(format!("step '{}' has a target with an empty fqdn", step.name)));
        }
        if !fqdns.insert(t.fqdn.as_str()) {
            return Err(invalid(format!("step '{}' lists target '{}' more than once", step.name, t.fqdn)));
        }
    }
    for v in &step.parameters {
        if let Some(fqdn) = v.target.as_deref() {
            if !fqdns.contains(fqdn) {
                return Err(invalid(format!(
                    "step '{}' binds parameter '{}' to unknown target '{}'",
                    step.name, v.name, fqdn
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::{ParameterValue, Script, Target};

    fn step(name: &str, targets: Vec<Target>) -> WorkflowStep {
        WorkflowStep {
            name: name.into(),
            enabled: true,
            abort_on_error: false,
            script: Script {
                name: "s".into(),
                path: "./s.sh".into(),
                enabled: true,
                targets_servers: true,
                target_parameter: None,
                parameters: vec![],
            },
            parameters: vec![],
            targets,
        }
    }

    fn workflow(steps: Vec<WorkflowStep>) -> Workflow {
        Workflow {
            name: "wf".into(),
            description: String::new(),
            steps,
        }
    }

    #[test]
    fn accepts_empty_step_list() {
        assert!(validate_workflow(&workflow(vec![])).is_ok());
    }

    #[test]
    fn rejects_duplicate_targets() {
        let wf = workflow(vec![step("a", vec![Target::new("h1"), Target::new("h1")])]);
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn rejects_value_for_unknown_target() {
        let mut s = step("a", vec![Target::new("h1")]);
        s.parameters.push(ParameterValue::for_target("X", 1, "h2"));
        let err = validate_workflow(&workflow(vec![s])).unwrap_err();
        assert!(err.to_string().contains("unknown target 'h2'"));
    }

    #[test]
    fn rejects_bad_parameter_names() {
        let mut s = step("a", vec![]);
        s.parameters.push(ParameterValue::global("1bad name", 1));
        assert!(validate_workflow(&workflow(vec![s])).is_err());
    }

    #[test]
    fn rejects_empty_script_path() {
        let mut s = step("a", vec![]);
        s.script.path = "  ".into();
        assert!(validate_workflow(&workflow(vec![s])).is_err());
    }
}
