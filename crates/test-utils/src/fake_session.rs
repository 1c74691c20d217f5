use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleetrun::errors::SessionError;
use fleetrun::exec::{InvokeFuture, ScriptHost};
use fleetrun::pool::{PoolLimits, Poolable, ResourcePool};
use fleetrun::workflow::BoundParameter;
use serde_json::Value;

/// What a fake script does when invoked.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    Success(Vec<Value>),
    Failure(String),
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub session: usize,
    pub command: String,
    pub parameters: Vec<BoundParameter>,
}

#[derive(Debug, Default)]
struct FakeState {
    outcomes: HashMap<String, FakeOutcome>,
    delay: Option<Duration>,
    invocations: Vec<Invocation>,
    resets: usize,
    created: usize,
    in_flight: usize,
    max_in_flight: usize,
}

/// Shared script table and call log for a family of [`FakeSession`]s.
///
/// Commands without a configured outcome succeed with no results.
#[derive(Debug, Clone, Default)]
pub struct FakeScripts {
    state: Arc<Mutex<FakeState>>,
}

impl FakeScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_success(self, command: &str, results: Vec<Value>) -> Self {
        self.state
            .lock()
            .unwrap()
            .outcomes
            .insert(command.to_string(), FakeOutcome::Success(results));
        self
    }

    pub fn with_failure(self, command: &str, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .outcomes
            .insert(command.to_string(), FakeOutcome::Failure(message.to_string()));
        self
    }

    /// Make every invocation take `delay` before completing.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    /// Create a new session sharing this script table.
    pub fn session(&self) -> FakeSession {
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        FakeSession {
            id: state.created,
            scripts: self.clone(),
        }
    }

    /// Pool whose factory hands out sessions from this table.
    pub fn pool(&self, limits: PoolLimits) -> ResourcePool<FakeSession> {
        let scripts = self.clone();
        ResourcePool::builder()
            .limits(limits)
            .factory(move || Ok(scripts.session()))
            .build()
            .expect("fake pool builds")
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().unwrap().invocations.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.command).collect()
    }

    pub fn resets(&self) -> usize {
        self.state.lock().unwrap().resets
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    /// Highest number of invocations that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }
}

/// A `ScriptHost` that never spawns a process.
#[derive(Debug)]
pub struct FakeSession {
    id: usize,
    scripts: FakeScripts,
}

impl FakeSession {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl ScriptHost for FakeSession {
    fn invoke<'a>(&'a mut self, command: &'a str, parameters: &'a [BoundParameter]) -> InvokeFuture<'a> {
        let state = Arc::clone(&self.scripts.state);
        let session = self.id;

        Box::pin(async move {
            let (outcome, delay) = {
                let mut guard = state.lock().unwrap();
                guard.invocations.push(Invocation {
                    session,
                    command: command.to_string(),
                    parameters: parameters.to_vec(),
                });
                guard.in_flight += 1;
                guard.max_in_flight = guard.max_in_flight.max(guard.in_flight);
                let outcome = guard
                    .outcomes
                    .get(command)
                    .cloned()
                    .unwrap_or(FakeOutcome::Success(Vec::new()));
                (outcome, guard.delay)
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            state.lock().unwrap().in_flight -= 1;

            match outcome {
                FakeOutcome::Success(results) => Ok(results),
                FakeOutcome::Failure(message) => Err(SessionError::ScriptFailed {
                    exit_code: 1,
                    message: message.clone(),
                    stderr: vec![message],
                }),
            }
        })
    }
}

impl Poolable for FakeSession {
    fn reset(&mut self) {
        self.scripts.state.lock().unwrap().resets += 1;
    }
}
