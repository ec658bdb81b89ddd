// ABOUTME: Narrow interface the executor drives for each step kind.
// ABOUTME: Implemented by the SSH transport and by test doubles.

use async_trait::async_trait;
use thiserror::Error;

use crate::tasks::{CopyOptions, CopySource, ScriptRef, Vars};

/// Output from one remote operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// A zero-exit output with no captured text.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The operation could not be carried out at all (connection, I/O, unknown asset).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct RemoteError(String);

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// One target host as seen by the executor.
///
/// A non-zero exit is reported through [`CommandOutput`], not as an error;
/// `Err` is reserved for operations that never produced an exit status.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Name used in logs and reports.
    fn label(&self) -> &str;

    async fn execute_script(
        &self,
        script: &ScriptRef,
        vars: &Vars,
    ) -> Result<CommandOutput, RemoteError>;

    async fn copy(
        &self,
        source: &CopySource,
        dest: &str,
        vars: &Vars,
        options: CopyOptions,
    ) -> Result<CommandOutput, RemoteError>;

    async fn execute_command(&self, command: &str) -> Result<CommandOutput, RemoteError>;

    /// Single readiness probe against a local port on the target.
    async fn probe(&self, port: u16) -> Result<bool, RemoteError> {
        let output = self
            .execute_command(&format!(
                "curl -s -o /dev/null --max-time 5 http://localhost:{port}/"
            ))
            .await?;
        Ok(output.success())
    }
}
