// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod outcome;
pub mod pool;
pub mod types;
pub mod workflow;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default, load_workflow};
use crate::engine::Runner;
use crate::errors::PoolError;
use crate::exec::{ExecutionSession, OutputFramer};
use crate::outcome::{ExecutionError, ExecutionLog};
use crate::pool::ResourcePool;
use crate::types::ExecutionStatus;
use crate::workflow::{Workflow, validate_workflow};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config and workflow loading
/// - the session pool
/// - the runner, with Ctrl-C mapped to user cancellation
/// - writing the execution log
pub async fn run(args: CliArgs) -> Result<ExecutionStatus> {
    let mut cfg = load_or_default(args.config.as_deref())?;
    if let Some(n) = args.max_sessions {
        cfg = cfg.with_max_sessions(n);
    }

    let workflow = load_workflow(&args.workflow)
        .with_context(|| format!("loading workflow {}", args.workflow.display()))?;
    validate_workflow(&workflow)?;

    if args.dry_run {
        print_dry_run(&cfg, &workflow);
        return Ok(ExecutionStatus::Success);
    }

    let log = match build_pool(&cfg) {
        Ok(pool) => {
            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                info!("Ctrl+C received; remaining steps will be cancelled");
                let _ = cancel_tx.send(true);
            });

            let runner = Runner::new(Arc::new(pool)).with_cancel(cancel_rx);
            let log = runner.execute(&workflow).await?;
            debug!(stats = ?runner.pool().stats(), "pool state after run");
            runner.pool().shutdown();
            log
        }
        Err(e) => {
            error!(error = %e, "session pool could not be created");
            ExecutionLog::failed_to_start(&workflow, ExecutionError::capture(&e))
        }
    };

    write_log(&log, args.output.as_deref())?;
    Ok(log.status)
}

/// Build the session pool described by `cfg`.
///
/// Preallocated interpreters are spawned here, so a missing interpreter is
/// reported before any step runs.
pub fn build_pool(cfg: &ConfigFile) -> std::result::Result<ResourcePool<ExecutionSession>, PoolError> {
    let spec = Arc::new(cfg.interpreter_spec());
    let framer: Arc<dyn OutputFramer> = Arc::new(cfg.framer());

    ResourcePool::builder()
        .limits(cfg.pool_limits())
        .factory(move || Ok(ExecutionSession::spawn(Arc::clone(&spec), Arc::clone(&framer))?))
        .build()
}

/// Process exit code for a finished run: 0 on Success, 2 otherwise.
pub fn exit_code(status: ExecutionStatus) -> i32 {
    if status == ExecutionStatus::Success { 0 } else { 2 }
}

fn write_log(log: &ExecutionLog, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(log)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "execution log written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Print the resolved settings and the step/target plan.
fn print_dry_run(cfg: &ConfigFile, workflow: &Workflow) {
    let limits = cfg.pool_limits();
    println!("fleetrun dry-run");
    println!(
        "  pool: max_size = {}, preallocated_size = {}, max_queue_size = {}",
        limits.max_size, limits.preallocated_size, limits.max_queue_size
    );
    println!(
        "  interpreter: {} {}",
        cfg.interpreter.program,
        cfg.interpreter.args.join(" ")
    );
    println!();

    println!("workflow '{}' ({} steps):", workflow.name, workflow.steps.len());
    for step in &workflow.steps {
        let mut flags = Vec::new();
        if !step.enabled {
            flags.push("disabled");
        }
        if step.abort_on_error {
            flags.push("abort_on_error");
        }
        if flags.is_empty() {
            println!("  - {}", step.name);
        } else {
            println!("  - {} [{}]", step.name, flags.join(", "));
        }
        println!("      script: {} ({})", step.script.name, step.script.path);

        if step.script.targets_servers {
            for t in &step.targets {
                let state = if t.enabled { "" } else { " (disabled)" };
                println!("      target: {}{}", t.fqdn, state);
            }
        } else {
            println!("      target: {}", outcome::LOCAL_TARGET);
        }
    }

    debug!("dry-run complete (no execution)");
}
