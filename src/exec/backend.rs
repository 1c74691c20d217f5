// src/exec/backend.rs

//! Script host abstraction.
//!
//! The runner talks to a `ScriptHost` instead of a concrete interpreter
//! session. Production uses [`crate::exec::ExecutionSession`]; tests provide
//! hosts that record calls and return canned results without spawning
//! processes.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::errors::SessionError;
use crate::workflow::BoundParameter;

pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Value>, SessionError>> + Send + 'a>>;

/// Something that can run one script invocation at a time.
pub trait ScriptHost: Send {
    /// Run `command` with `parameters` and return its result payloads.
    ///
    /// A failing script is reported as an error, but the host stays usable
    /// for the next invocation.
    fn invoke<'a>(&'a mut self, command: &'a str, parameters: &'a [BoundParameter]) -> InvokeFuture<'a>;
}
