// ABOUTME: Execution failures surfaced by the session executor.
// ABOUTME: Each failure names the step and session and carries the full report.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::report::ExecutionReport;

/// Why a step failed on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitInfo {
    /// The remote operation finished with a non-zero exit code.
    Status { code: u32, stderr: String },
    /// The operation never produced an exit status.
    Transport { message: String },
    /// The health check saw no readiness within its window.
    TimedOut { port: u16, waited_secs: u64 },
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitInfo::Status { code, stderr } if stderr.trim().is_empty() => {
                write!(f, "exited with code {code}")
            }
            ExitInfo::Status { code, stderr } => {
                write!(f, "exited with code {code}: {}", stderr.trim())
            }
            ExitInfo::Transport { message } => write!(f, "{message}"),
            ExitInfo::TimedOut { port, waited_secs } => write!(
                f,
                "no response on port {port} within {waited_secs} seconds"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("step '{step}' failed on {session}: {exit}")]
    StepFailed {
        step: String,
        session: String,
        exit: ExitInfo,
        report: Box<ExecutionReport>,
    },

    #[error("step '{step}' on {session} timed out after {}s waiting for port {port}", .waited.as_secs())]
    VerificationTimedOut {
        step: String,
        session: String,
        port: u16,
        waited: Duration,
        report: Box<ExecutionReport>,
    },
}

impl ExecutionError {
    /// Outcomes for every session, including the ones that succeeded.
    pub fn report(&self) -> &ExecutionReport {
        match self {
            ExecutionError::StepFailed { report, .. }
            | ExecutionError::VerificationTimedOut { report, .. } => report,
        }
    }

    pub fn step(&self) -> &str {
        match self {
            ExecutionError::StepFailed { step, .. }
            | ExecutionError::VerificationTimedOut { step, .. } => step,
        }
    }

    pub fn session(&self) -> &str {
        match self {
            ExecutionError::StepFailed { session, .. }
            | ExecutionError::VerificationTimedOut { session, .. } => session,
        }
    }
}
