// ABOUTME: Runs task lists against remote sessions, in parallel or one at a time.
// ABOUTME: Exposes the Remote trait that transports implement and the execution report.

mod error;
mod remote;
mod report;
mod runner;
mod verify;

pub use error::{ExecutionError, ExitInfo};
pub use remote::{CommandOutput, Remote, RemoteError};
pub use report::{ExecutionReport, SessionReport, SessionStatus, StepOutcome, StepReport};
pub use runner::{ExecutionMode, SessionExecutor};
pub use verify::{POLL_INTERVAL, VerificationOutcome, verify};
