// src/engine/rollup.rs

//! Pure status folding for steps and whole runs.

use crate::outcome::{ExecutionStep, ExecutionTarget};
use crate::types::ExecutionStatus;

/// Status of a step that ran, from its target results.
///
/// - any target Faulty: Faulty
/// - every target Skipped (or no targets at all): Skipped
/// - otherwise: Success
pub fn step_status(targets: &[ExecutionTarget]) -> ExecutionStatus {
    if targets.iter().any(|t| t.status == ExecutionStatus::Faulty) {
        ExecutionStatus::Faulty
    } else if targets.iter().all(|t| t.status == ExecutionStatus::Skipped) {
        ExecutionStatus::Skipped
    } else {
        ExecutionStatus::Success
    }
}

/// Status of a whole run, by precedence
/// CancelledByUser > Aborted > Faulty > Success.
///
/// A run whose steps were all Skipped counts as Success.
pub fn workflow_status(steps: &[ExecutionStep]) -> ExecutionStatus {
    let any = |status: ExecutionStatus| steps.iter().any(|s| s.status == status);

    if any(ExecutionStatus::CancelledByUser) {
        ExecutionStatus::CancelledByUser
    } else if any(ExecutionStatus::Aborted) {
        ExecutionStatus::Aborted
    } else if any(ExecutionStatus::Faulty) {
        ExecutionStatus::Faulty
    } else {
        ExecutionStatus::Success
    }
}
