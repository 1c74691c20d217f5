// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::{DEFAULT_SENTINEL, InterpreterSpec, ShellFramer};
use crate::pool::{PoolLimits, PoolOptions};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [pool]
/// max_size = 4
/// preallocated_size = 1
/// max_queue_size = 100
///
/// [interpreter]
/// program = "bash"
/// args = ["--noprofile", "--norc"]
/// working_dir = "scripts"
/// sentinel = "__FLEETRUN_DONE__"
///
/// [interpreter.env]
/// DEPLOY_ENV = "staging"
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub pool: PoolOptions,

    #[serde(default)]
    pub interpreter: InterpreterSection,
}

/// `[interpreter]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterpreterSection {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Marker printed after each invocation; must not occur in script output.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

fn default_program() -> String {
    "sh".to_string()
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

impl Default for InterpreterSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            sentinel: default_sentinel(),
        }
    }
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub pool: PoolOptions,
    pub interpreter: InterpreterSection,
}

impl ConfigFile {
    /// Construct without validation; only used after `TryFrom` checks.
    pub(crate) fn new_unchecked(pool: PoolOptions, interpreter: InterpreterSection) -> Self {
        Self { pool, interpreter }
    }

    /// Override `pool.max_size`, e.g. from `--max-sessions`.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.pool.max_size = Some(i64::try_from(max_sessions).unwrap_or(i64::MAX));
        self
    }

    pub fn pool_limits(&self) -> PoolLimits {
        self.pool.resolve()
    }

    pub fn interpreter_spec(&self) -> InterpreterSpec {
        InterpreterSpec {
            program: self.interpreter.program.clone(),
            args: self.interpreter.args.clone(),
            working_dir: self.interpreter.working_dir.clone(),
            env: self.interpreter.env.clone(),
        }
    }

    pub fn framer(&self) -> ShellFramer {
        ShellFramer::new(self.interpreter.sentinel.clone())
    }
}
