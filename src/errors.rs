// src/errors.rs

//! Crate-wide error types.
//!
//! Each concern has its own `thiserror` enum; all of them implement
//! [`Diagnostic`] so upstream layers can branch on a stable
//! [`ErrorCode::key`] instead of matching on messages.

use serde::Serialize;
use thiserror::Error;

/// Machine-readable error identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCode {
    pub key: &'static str,
    pub description: &'static str,
}

impl ErrorCode {
    pub const QUEUE_OVERFLOW: ErrorCode = ErrorCode {
        key: "queue_overflow",
        description: "the pool and its wait queue are both at capacity",
    };
    pub const RESOURCE_NOT_LOCKED: ErrorCode = ErrorCode {
        key: "resource_not_locked",
        description: "the released resource is not currently locked by this pool",
    };
    pub const MISSING_FACTORY: ErrorCode = ErrorCode {
        key: "missing_factory",
        description: "a resource pool cannot be built without a factory",
    };
    pub const RESOURCE_CREATION_FAILED: ErrorCode = ErrorCode {
        key: "resource_creation_failed",
        description: "the pool factory failed to create a resource",
    };
    pub const POOL_CLOSED: ErrorCode = ErrorCode {
        key: "pool_closed",
        description: "the pool was shut down before the request could be served",
    };
    pub const SESSION_SPAWN_FAILED: ErrorCode = ErrorCode {
        key: "session_spawn_failed",
        description: "the script interpreter process could not be started",
    };
    pub const SESSION_IO: ErrorCode = ErrorCode {
        key: "session_io",
        description: "communication with the script interpreter failed",
    };
    pub const SESSION_TERMINATED: ErrorCode = ErrorCode {
        key: "session_terminated",
        description: "the script interpreter exited before the invocation completed",
    };
    pub const SCRIPT_FAILED: ErrorCode = ErrorCode {
        key: "script_failed",
        description: "the script reported a failure",
    };
    pub const PARAMETER_DATA_MISMATCH: ErrorCode = ErrorCode {
        key: "parameter_data_mismatch",
        description: "parameter values do not match the script's declared parameters",
    };
    pub const INVALID_WORKFLOW: ErrorCode = ErrorCode {
        key: "invalid_workflow",
        description: "the workflow definition violates the execution contract",
    };
    pub const CONFIG_INVALID: ErrorCode = ErrorCode {
        key: "config_invalid",
        description: "the configuration file is invalid",
    };
}

/// Implemented by every error the core can surface.
pub trait Diagnostic: std::error::Error {
    fn code(&self) -> ErrorCode;

    /// Extra lines to attach as a stack trace when the error is recorded in
    /// an execution log. Defaults to the `source()` chain.
    fn trace_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            lines.push(err.to_string());
            source = err.source();
        }
        lines
    }
}

/// Errors raised by [`crate::pool::ResourcePool`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("resource pool requires a factory")]
    MissingFactory,

    #[error(
        "queue overflow: pool exhausted (locked={locked}, available={available}, queued={queued}, max_queue_size={max_queue_size})"
    )]
    QueueOverflow {
        locked: usize,
        available: usize,
        queued: usize,
        max_queue_size: usize,
    },

    #[error("resource (slot {slot}) is not locked by pool {pool}")]
    NotLocked { pool: u64, slot: u64 },

    #[error("failed to create pooled resource: {0}")]
    Creation(String),

    #[error("resource pool is closed")]
    Closed,
}

impl Diagnostic for PoolError {
    fn code(&self) -> ErrorCode {
        match self {
            PoolError::MissingFactory => ErrorCode::MISSING_FACTORY,
            PoolError::QueueOverflow { .. } => ErrorCode::QUEUE_OVERFLOW,
            PoolError::NotLocked { .. } => ErrorCode::RESOURCE_NOT_LOCKED,
            PoolError::Creation(_) => ErrorCode::RESOURCE_CREATION_FAILED,
            PoolError::Closed => ErrorCode::POOL_CLOSED,
        }
    }
}

/// Errors raised while talking to a script interpreter.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to start interpreter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interpreter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interpreter exited before the invocation completed")]
    Terminated { stderr: Vec<String> },

    #[error("{message} (exit code {exit_code})")]
    ScriptFailed {
        exit_code: i32,
        message: String,
        stderr: Vec<String>,
    },
}

impl Diagnostic for SessionError {
    fn code(&self) -> ErrorCode {
        match self {
            SessionError::Spawn { .. } => ErrorCode::SESSION_SPAWN_FAILED,
            SessionError::Io(_) => ErrorCode::SESSION_IO,
            SessionError::Terminated { .. } => ErrorCode::SESSION_TERMINATED,
            SessionError::ScriptFailed { .. } => ErrorCode::SCRIPT_FAILED,
        }
    }

    fn trace_lines(&self) -> Vec<String> {
        match self {
            SessionError::Terminated { stderr } | SessionError::ScriptFailed { stderr, .. } => {
                stderr.clone()
            }
            SessionError::Spawn { source, .. } => vec![source.to_string()],
            SessionError::Io(_) => Vec::new(),
        }
    }
}

/// Errors raised while binding parameter values for one target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("parameter data mismatch for '{parameter}': {reason}")]
    ParameterDataMismatch { parameter: String, reason: String },

    #[error("parameter data mismatch: mandatory parameter '{parameter}' has no value")]
    MissingParameter { parameter: String },
}

impl Diagnostic for ValidationError {
    fn code(&self) -> ErrorCode {
        ErrorCode::PARAMETER_DATA_MISMATCH
    }
}

/// Contract violations returned from [`crate::engine::Runner::execute`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),
}

impl Diagnostic for RunnerError {
    fn code(&self) -> ErrorCode {
        ErrorCode::INVALID_WORKFLOW
    }
}

/// Top-level error used by configuration loading and the CLI wiring.
#[derive(Error, Debug)]
pub enum FleetrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Diagnostic for FleetrunError {
    fn code(&self) -> ErrorCode {
        match self {
            FleetrunError::Pool(e) => e.code(),
            FleetrunError::Runner(e) => e.code(),
            _ => ErrorCode::CONFIG_INVALID,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FleetrunError>;
