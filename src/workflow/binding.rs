// src/workflow/binding.rs

//! Resolve the parameter list handed to one script invocation.
//!
//! Precedence for each declared parameter:
//! 1. a value bound to the current target's FQDN,
//! 2. a global value,
//! 3. the declared default.
//!
//! The script's `target_parameter` always receives the target FQDN.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::errors::ValidationError;
use crate::workflow::model::{ParameterKind, ParameterValue, Script, Target};

/// One name/value pair ready for the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundParameter {
    pub name: String,
    pub value: Value,
}

impl BoundParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Bind `values` against `script`'s declarations for `target`.
///
/// `target` is `None` for the synthetic local target; target-specific values
/// are ignored in that case.
pub fn bind_parameters(
    script: &Script,
    values: &[ParameterValue],
    target: Option<&Target>,
) -> Result<Vec<BoundParameter>, ValidationError> {
    let target_param = script.target_parameter.as_deref();

    for v in values {
        let declared = script.parameters.iter().any(|p| p.name == v.name);
        if !declared && Some(v.name.as_str()) != target_param {
            return Err(ValidationError::ParameterDataMismatch {
                parameter: v.name.clone(),
                reason: format!("not declared by script '{}'", script.name),
            });
        }
    }

    let fqdn = target.map(|t| t.fqdn.as_str());
    let mut bound = Vec::with_capacity(script.parameters.len() + 1);

    for decl in &script.parameters {
        if Some(decl.name.as_str()) == target_param && fqdn.is_some() {
            continue;
        }

        let target_specific = fqdn.and_then(|fqdn| {
            values
                .iter()
                .find(|v| v.name == decl.name && v.target.as_deref() == Some(fqdn))
        });
        let global = || values.iter().find(|v| v.name == decl.name && v.target.is_none());

        let raw = target_specific
            .or_else(global)
            .map(|v| &v.value)
            .filter(|v| !v.is_null())
            .or(decl.default.as_ref());

        match raw {
            Some(value) => {
                let value = coerce(decl.kind, value).map_err(|reason| {
                    ValidationError::ParameterDataMismatch {
                        parameter: decl.name.clone(),
                        reason,
                    }
                })?;
                bound.push(BoundParameter::new(decl.name.clone(), value));
            }
            None if decl.mandatory => {
                return Err(ValidationError::MissingParameter {
                    parameter: decl.name.clone(),
                });
            }
            None => {}
        }
    }

    if let (Some(name), Some(fqdn)) = (target_param, fqdn) {
        bound.push(BoundParameter::new(name, fqdn));
    }

    Ok(bound)
}

/// Check `value` against `kind`, converting textual numbers and booleans.
fn coerce(kind: ParameterKind, value: &Value) -> Result<Value, String> {
    match (kind, value) {
        (ParameterKind::Json, v) => Ok(v.clone()),
        (ParameterKind::String, Value::String(_)) => Ok(value.clone()),
        (ParameterKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        (ParameterKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("expected an integer, got '{s}'")),
        (ParameterKind::Number, Value::Number(_)) => Ok(value.clone()),
        (ParameterKind::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("expected a number, got '{s}'")),
        (ParameterKind::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (ParameterKind::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("expected a boolean, got '{s}'")),
        },
        (kind, other) => Err(format!("expected {kind:?}, got {other}").to_lowercase()),
    }
}
