// ABOUTME: Declarative task model: steps and the ordered lists that hold them.
// ABOUTME: Building a list performs no I/O; execution lives in the executor module.

mod error;
mod list;
mod step;

pub use error::TaskError;
pub use list::TaskList;
pub use step::{CopyOptions, CopySource, ScriptRef, StepKind, TaskStep, Vars};
