// ABOUTME: Error for a failed deployment pipeline stage.
// ABOUTME: Names the stage; the wrapped error names the step and session.

use crate::error::Error;
use crate::executor::ExecutionError;

/// A pipeline stage failed; later stages were not run.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct DeployError {
    pub stage: &'static str,
    #[source]
    pub source: Box<Error>,
}

impl DeployError {
    pub fn new(stage: &'static str, source: Error) -> Self {
        Self {
            stage,
            source: Box::new(source),
        }
    }

    /// The remote execution failure behind this error, if there was one.
    pub fn execution(&self) -> Option<&ExecutionError> {
        match self.source.as_ref() {
            Error::Execution(e) => Some(e),
            _ => None,
        }
    }
}
