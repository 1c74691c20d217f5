// src/exec/session.rs

//! One persistent script interpreter process.
//!
//! Behaviour:
//! - The interpreter is spawned once and kept warm across invocations; each
//!   invocation is written to its stdin by the session's [`OutputFramer`].
//! - Every non-empty stdout line is kept as an output chunk and re-emitted
//!   to listeners as a `Running` event. The framer's completion line becomes
//!   a `Stopping` event and is never forwarded.
//! - A non-zero exit code fails the call with the invocation's stderr, but
//!   the interpreter stays up.
//! - Output that is not valid UTF-8 is decoded lossily. A read error drops
//!   the interpreter, since the rest of that call's output may still be in
//!   the pipes.
//! - `reset` clears output and listeners without killing the process. If
//!   the interpreter has exited or was dropped it is respawned.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::SessionError;
use crate::exec::backend::{InvokeFuture, ScriptHost};
use crate::exec::framer::{OutputFramer, ShellFramer};
use crate::pool::Poolable;
use crate::types::SessionState;
use crate::workflow::BoundParameter;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// How to start the interpreter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl Default for InterpreterSpec {
    fn default() -> Self {
        Self {
            program: "sh".to_string(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// State change published to session listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    pub session_id: u64,
    pub state: SessionState,
    pub chunk: Option<String>,
    pub at: DateTime<Utc>,
}

struct InterpreterProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
}

impl InterpreterProcess {
    fn spawn(spec: &InterpreterSpec) -> Result<Self, SessionError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| SessionError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr: BufReader::new(stderr),
        })
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

fn missing_pipe(name: &str) -> SessionError {
    SessionError::Io(std::io::Error::other(format!("interpreter {name} was not captured")))
}

pub struct ExecutionSession {
    id: u64,
    spec: Arc<InterpreterSpec>,
    framer: Arc<dyn OutputFramer>,
    process: Option<InterpreterProcess>,
    state: SessionState,
    output: Vec<String>,
    listeners: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl ExecutionSession {
    /// Create a session without starting the interpreter.
    pub fn new(spec: Arc<InterpreterSpec>, framer: Arc<dyn OutputFramer>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            spec,
            framer,
            process: None,
            state: SessionState::NotStarted,
            output: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Create a session and start its interpreter right away.
    pub fn spawn(spec: Arc<InterpreterSpec>, framer: Arc<dyn OutputFramer>) -> Result<Self, SessionError> {
        let mut session = Self::new(spec, framer);
        session.start()?;
        Ok(session)
    }

    /// Session with the default `sh` interpreter and [`ShellFramer`].
    pub fn shell() -> Result<Self, SessionError> {
        Self::spawn(Arc::new(InterpreterSpec::default()), Arc::new(ShellFramer::default()))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Output chunks collected since the last reset.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn is_running(&mut self) -> bool {
        self.process.as_mut().is_some_and(InterpreterProcess::is_alive)
    }

    /// OS process id of the interpreter, if it is running.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.child.id())
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            return Ok(());
        }
        let process = InterpreterProcess::spawn(&self.spec)?;
        info!(
            session = self.id,
            program = %self.spec.program,
            pid = process.child.id(),
            "interpreter started"
        );
        self.process = Some(process);
        Ok(())
    }

    /// Register a listener for state changes and output chunks.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, state: SessionState, chunk: Option<String>) {
        self.state = state;
        let event = SessionEvent {
            session_id: self.id,
            state,
            chunk,
            at: Utc::now(),
        };
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Run one invocation and return its parsed result.
    pub async fn invoke(
        &mut self,
        command: &str,
        parameters: &[BoundParameter],
    ) -> Result<Vec<Value>, SessionError> {
        if self.process.is_none() {
            self.start()?;
        }
        let Some(mut process) = self.process.take() else {
            return Err(SessionError::Terminated { stderr: Vec::new() });
        };

        let outcome = self.run_invocation(&mut process, command, parameters).await;
        match &outcome {
            Err(SessionError::Terminated { .. }) => {
                info!(session = self.id, "interpreter exited during invocation");
            }
            // Unread output may still sit in the pipes; the process cannot
            // be trusted to frame the next call.
            Err(SessionError::Io(e)) => {
                warn!(session = self.id, error = %e, "interpreter I/O failed; discarding process");
            }
            _ => self.process = Some(process),
        }

        match &outcome {
            Ok(results) => {
                debug!(session = self.id, command, results = results.len(), "invocation finished");
            }
            Err(e) => {
                self.emit(SessionState::Failed, None);
                warn!(session = self.id, command, error = %e, "invocation failed");
            }
        }
        outcome
    }

    async fn run_invocation(
        &mut self,
        process: &mut InterpreterProcess,
        command: &str,
        parameters: &[BoundParameter],
    ) -> Result<Vec<Value>, SessionError> {
        let first_chunk = self.output.len();
        self.emit(SessionState::Preparing, None);

        let framed = self.framer.frame(command, parameters);
        process.stdin.write_all(framed.as_bytes()).await?;
        process.stdin.flush().await?;
        self.emit(SessionState::Running, None);

        let framer = Arc::clone(&self.framer);
        let session = self.id;
        let InterpreterProcess { stdout, stderr, .. } = process;
        let (exit, stderr_lines) = tokio::join!(
            self.read_until_completion(stdout),
            drain_stderr(stderr, framer.as_ref(), session),
        );
        let exit = exit?;
        let stderr_lines = stderr_lines?;

        let Some(exit_code) = exit else {
            return Err(SessionError::Terminated { stderr: stderr_lines });
        };

        if exit_code != 0 {
            let message = stderr_lines
                .last()
                .cloned()
                .unwrap_or_else(|| format!("script '{command}' failed"));
            return Err(SessionError::ScriptFailed {
                exit_code,
                message,
                stderr: stderr_lines,
            });
        }

        self.emit(SessionState::Stopped, None);
        Ok(parse_result(self.output[first_chunk..].last().map(String::as_str)))
    }

    /// Forward stdout chunks until the completion line; `None` on EOF.
    async fn read_until_completion(
        &mut self,
        stdout: &mut BufReader<ChildStdout>,
    ) -> std::io::Result<Option<i32>> {
        while let Some(line) = next_line_lossy(stdout).await? {
            if let Some(code) = self.framer.completion(&line) {
                self.emit(SessionState::Stopping, None);
                return Ok(Some(code));
            }
            if line.trim().is_empty() {
                continue;
            }
            debug!(session = self.id, "stdout: {}", line);
            self.output.push(line.clone());
            self.emit(SessionState::Running, Some(line));
        }
        Ok(None)
    }

    /// Clear per-invocation state, keeping the interpreter warm.
    pub fn reset(&mut self) {
        self.output.clear();
        self.listeners.clear();
        self.state = SessionState::NotStarted;

        if !self.is_running() {
            self.process = None;
            match self.start() {
                Ok(()) => info!(session = self.id, "interpreter respawned on reset"),
                Err(e) => warn!(session = self.id, error = %e, "failed to respawn interpreter"),
            }
        }
    }

    /// Kill the interpreter without waiting. Never fails.
    pub fn dispose_sync(&mut self) {
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.child.start_kill() {
                warn!(session = self.id, error = %e, "failed to kill interpreter");
            } else {
                debug!(session = self.id, "interpreter killed");
            }
        }
    }

    /// Kill the interpreter and wait for it to exit.
    pub async fn dispose(&mut self) -> Result<(), SessionError> {
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.child.start_kill() {
                warn!(session = self.id, error = %e, "failed to kill interpreter");
            }
            let status = process.child.wait().await?;
            debug!(session = self.id, ?status, "interpreter exited");
        }
        Ok(())
    }
}

/// Read one line, replacing invalid UTF-8 instead of failing. `None` on EOF.
async fn next_line_lossy<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Collect stderr lines up to the framer's terminator or EOF.
async fn drain_stderr(
    stderr: &mut BufReader<ChildStderr>,
    framer: &dyn OutputFramer,
    session: u64,
) -> std::io::Result<Vec<String>> {
    let mut lines = Vec::new();
    while let Some(line) = next_line_lossy(stderr).await? {
        if framer.is_error_terminator(&line) {
            break;
        }
        if !line.trim().is_empty() {
            debug!(session, "stderr: {}", line);
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Last chunk as JSON when it parses (arrays are flattened), raw text
/// otherwise.
pub fn parse_result(last_chunk: Option<&str>) -> Vec<Value> {
    let Some(text) = last_chunk else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        Ok(value) => vec![value],
        Err(_) => vec![Value::String(text.to_string())],
    }
}

impl Poolable for ExecutionSession {
    fn reset(&mut self) {
        ExecutionSession::reset(self);
    }

    fn dispose(&mut self) {
        self.dispose_sync();
    }
}

impl ScriptHost for ExecutionSession {
    fn invoke<'a>(&'a mut self, command: &'a str, parameters: &'a [BoundParameter]) -> InvokeFuture<'a> {
        Box::pin(ExecutionSession::invoke(self, command, parameters))
    }
}

impl std::fmt::Debug for ExecutionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSession")
            .field("id", &self.id)
            .field("program", &self.spec.program)
            .field("state", &self.state)
            .field("pid", &self.pid())
            .finish()
    }
}
