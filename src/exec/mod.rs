// src/exec/mod.rs

//! Script execution.
//!
//! - [`backend`] defines the [`ScriptHost`] seam the runner depends on.
//! - [`framer`] marks invocation boundaries on a long-lived interpreter.
//! - [`session`] wraps one interpreter process; it is the pooled resource.

pub mod backend;
pub mod framer;
pub mod session;

pub use backend::{InvokeFuture, ScriptHost};
pub use framer::{DEFAULT_SENTINEL, OutputFramer, ShellFramer};
pub use session::{ExecutionSession, InterpreterSpec, SessionEvent};
