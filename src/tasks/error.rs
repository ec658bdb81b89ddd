// ABOUTME: Errors raised while assembling a task list.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Step names key log lines and report entries, so they must be unique per list.
    #[error("duplicate step name '{step}' in task list '{list}'")]
    DuplicateStepName { list: String, step: String },
}
