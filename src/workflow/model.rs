// src/workflow/model.rs

//! Workflow object graph consumed by the runner.
//!
//! These types are plain data. They deserialize from workflow files (see
//! [`crate::config::load_workflow`]) but the runner never mutates them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_true() -> bool {
    true
}

/// Ordered list of steps run one after the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, rename = "step")]
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// When this step ends Faulty, every later step is recorded as Aborted.
    #[serde(default)]
    pub abort_on_error: bool,

    pub script: Script,

    #[serde(default, rename = "parameter")]
    pub parameters: Vec<ParameterValue>,

    /// Ignored unless `script.targets_servers` is set.
    #[serde(default, rename = "target")]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,

    /// Command handed to the interpreter.
    pub path: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `false` means the script runs once against the synthetic local target.
    #[serde(default)]
    pub targets_servers: bool,

    /// Parameter that receives the FQDN of the target being processed.
    #[serde(default)]
    pub target_parameter: Option<String>,

    #[serde(default, rename = "parameter")]
    pub parameters: Vec<ScriptParameter>,
}

/// Declared input of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptParameter {
    pub name: String,

    #[serde(default)]
    pub kind: ParameterKind,

    #[serde(default)]
    pub mandatory: bool,

    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Json,
}

/// A value supplied by the workflow for one script parameter.
///
/// With `target` set, the value only applies to the target with that FQDN
/// and overrides any global value of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: Value,

    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub fqdn: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Target {
    pub fn new(fqdn: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            name: String::new(),
            enabled: true,
        }
    }

    /// Friendly name, falling back to the FQDN.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.fqdn } else { &self.name }
    }
}

impl ParameterValue {
    pub fn global(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            target: None,
        }
    }

    pub fn for_target(name: impl Into<String>, value: impl Into<Value>, fqdn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            target: Some(fqdn.into()),
        }
    }
}
