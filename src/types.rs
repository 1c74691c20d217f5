// src/types.rs

//! Shared status types for sessions, targets, steps and whole runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of one unit of work (target, step, or whole workflow run).
///
/// A unit starts `Pending`, may move to `Running`, and ends in exactly one of
/// the terminal variants. Once terminal it never changes again; see
/// [`ExecutionStatus::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Success,
    Faulty,
    Aborted,
    Skipped,
    CancelledByUser,
}

impl ExecutionStatus {
    /// True for every status a unit can end in.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }

    fn rank(self) -> u8 {
        match self {
            ExecutionStatus::Pending => 0,
            ExecutionStatus::Running => 1,
            _ => 2,
        }
    }

    /// Move to `next` if that keeps the status monotonic.
    ///
    /// Returns `false` (and leaves `self` untouched) when the current status
    /// is already terminal or `next` would move backwards.
    pub fn advance(&mut self, next: ExecutionStatus) -> bool {
        if self.is_terminal() || next.rank() <= self.rank() {
            return false;
        }
        *self = next;
        true
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "Pending",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Success => "Success",
            ExecutionStatus::Faulty => "Faulty",
            ExecutionStatus::Aborted => "Aborted",
            ExecutionStatus::Skipped => "Skipped",
            ExecutionStatus::CancelledByUser => "CancelledByUser",
        };
        f.write_str(s)
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "faulty" => Ok(ExecutionStatus::Faulty),
            "aborted" => Ok(ExecutionStatus::Aborted),
            "skipped" => Ok(ExecutionStatus::Skipped),
            "cancelledbyuser" | "cancelled" => Ok(ExecutionStatus::CancelledByUser),
            other => Err(format!("invalid execution status: {other}")),
        }
    }
}

/// Lifecycle of a single invocation inside an execution session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No invocation has happened since the session was created or reset.
    #[default]
    NotStarted,
    /// The invocation is being framed and written to the interpreter.
    Preparing,
    /// The interpreter is executing; output chunks are streaming.
    Running,
    /// The end-of-invocation marker has been seen.
    Stopping,
    Stopped,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_initial_states() {
        assert_eq!(ExecutionStatus::default(), ExecutionStatus::Pending);
        assert_eq!(SessionState::default(), SessionState::NotStarted);
    }

    #[test]
    fn pending_advances_to_running_then_terminal() {
        let mut status = ExecutionStatus::Pending;
        assert!(status.advance(ExecutionStatus::Running));
        assert!(status.advance(ExecutionStatus::Success));
        assert_eq!(status, ExecutionStatus::Success);
    }

    #[test]
    fn terminal_status_never_reverts() {
        let mut status = ExecutionStatus::Faulty;
        assert!(!status.advance(ExecutionStatus::Running));
        assert!(!status.advance(ExecutionStatus::Success));
        assert_eq!(status, ExecutionStatus::Faulty);
    }

    #[test]
    fn running_cannot_go_back_to_pending() {
        let mut status = ExecutionStatus::Running;
        assert!(!status.advance(ExecutionStatus::Pending));
        assert_eq!(status, ExecutionStatus::Running);
    }

    #[test]
    fn pending_can_jump_straight_to_skipped() {
        let mut status = ExecutionStatus::Pending;
        assert!(status.advance(ExecutionStatus::Skipped));
        assert!(status.is_terminal());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "cancelledByUser".parse::<ExecutionStatus>(),
            Ok(ExecutionStatus::CancelledByUser)
        );
        assert_eq!("FAULTY".parse::<ExecutionStatus>(), Ok(ExecutionStatus::Faulty));
        assert!("nope".parse::<ExecutionStatus>().is_err());
    }
}
