// src/exec/framer.rs

//! Framing of invocations written to a long-lived interpreter.
//!
//! An interpreter session never exits between invocations, so the end of
//! one invocation has to be marked in-band. An [`OutputFramer`] decides:
//! - what text to write to the interpreter's stdin for one call,
//! - which stdout line marks completion (and carries the exit code),
//! - which stderr line marks the end of that call's error output.
//!
//! [`ShellFramer`] implements this for POSIX shells.

use serde_json::Value;

use crate::workflow::BoundParameter;

pub const DEFAULT_SENTINEL: &str = "__FLEETRUN_DONE__";

pub trait OutputFramer: Send + Sync {
    /// Text to write to the interpreter's stdin for one invocation.
    fn frame(&self, command: &str, parameters: &[BoundParameter]) -> String;

    /// Exit code carried by `line` if it is the completion marker.
    fn completion(&self, line: &str) -> Option<i32>;

    /// True when `line` ends the invocation's stderr output.
    fn is_error_terminator(&self, line: &str) -> bool;
}

/// Framer for `sh`-compatible interpreters.
///
/// The command runs with stdin detached from the interpreter's own stdin
/// so that scripts cannot consume the next invocation.
#[derive(Debug, Clone)]
pub struct ShellFramer {
    sentinel: String,
    completion_prefix: String,
}

impl ShellFramer {
    pub fn new(sentinel: impl Into<String>) -> Self {
        let sentinel = sentinel.into();
        let completion_prefix = format!("{sentinel}:");
        Self {
            sentinel,
            completion_prefix,
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }
}

impl Default for ShellFramer {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL)
    }
}

impl OutputFramer for ShellFramer {
    fn frame(&self, command: &str, parameters: &[BoundParameter]) -> String {
        let mut line = shell_quote(command);
        for p in parameters {
            line.push_str(" --");
            line.push_str(&p.name);
            line.push(' ');
            line.push_str(&shell_quote(&render_value(&p.value)));
        }

        let sentinel = shell_quote(&self.sentinel);
        format!(
            "{line} </dev/null\n\
             __fr_status=$?\n\
             printf '\\n%s:%s\\n' {sentinel} \"$__fr_status\"\n\
             printf '\\n%s\\n' {sentinel} >&2\n"
        )
    }

    fn completion(&self, line: &str) -> Option<i32> {
        let code = line.trim_end().strip_prefix(&self.completion_prefix)?;
        Some(code.trim().parse().unwrap_or(-1))
    }

    fn is_error_terminator(&self, line: &str) -> bool {
        line.trim_end() == self.sentinel
    }
}

/// Quote `s` as a single shell word.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Text form of a parameter value: strings verbatim, everything else as JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
