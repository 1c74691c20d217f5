// src/workflow/mod.rs

//! Workflow input graph, parameter binding and contract validation.

pub mod binding;
pub mod model;
pub mod validate;

pub use binding::{BoundParameter, bind_parameters};
pub use model::{ParameterKind, ParameterValue, Script, ScriptParameter, Target, Workflow, WorkflowStep};
pub use validate::validate_workflow;
