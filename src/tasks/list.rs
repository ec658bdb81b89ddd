// ABOUTME: Ordered, append-only task list builder.
// ABOUTME: Rejects duplicate step names at construction time; the rejected list is dropped.

use std::path::PathBuf;
use std::time::Duration;

use super::error::TaskError;
use super::step::{CopyOptions, CopySource, ScriptRef, StepKind, TaskStep, Vars};

/// One logical operation (setup, push, start, ...) as an ordered list of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskList {
    title: String,
    steps: Vec<TaskStep>,
}

impl TaskList {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            steps: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn steps(&self) -> &[TaskStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(TaskStep::name)
    }

    /// Run a bundled script with the given vars.
    ///
    /// Every builder takes the list by value. On a duplicate step name the
    /// list is dropped with the error, so a half-built list never runs.
    pub fn add_script(
        self,
        name: impl Into<String>,
        script: ScriptRef,
        vars: Vars,
    ) -> Result<Self, TaskError> {
        self.push(name.into(), StepKind::ExecuteScript { script, vars })
    }

    /// Copy a local file or rendered template to `dest` on the remote.
    pub fn add_copy(
        self,
        name: impl Into<String>,
        source: CopySource,
        dest: impl Into<String>,
        vars: Vars,
        options: CopyOptions,
    ) -> Result<Self, TaskError> {
        self.push(
            name.into(),
            StepKind::Copy {
                source,
                dest: dest.into(),
                vars,
                options,
            },
        )
    }

    /// Shorthand for copying a plain local file without vars.
    pub fn add_file_copy(
        self,
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        dest: impl Into<String>,
        options: CopyOptions,
    ) -> Result<Self, TaskError> {
        self.add_copy(
            name,
            CopySource::File(source.into()),
            dest,
            Vars::new(),
            options,
        )
    }

    /// Run a raw shell command line.
    pub fn add_command(
        self,
        name: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<Self, TaskError> {
        self.push(
            name.into(),
            StepKind::ExecuteCommand {
                command: command.into(),
            },
        )
    }

    /// Wait up to `wait` for the service on `port` to answer.
    pub fn add_verify(
        self,
        name: impl Into<String>,
        port: u16,
        wait: Duration,
    ) -> Result<Self, TaskError> {
        self.push(name.into(), StepKind::Verify { port, wait })
    }

    fn push(mut self, name: String, kind: StepKind) -> Result<Self, TaskError> {
        if self.steps.iter().any(|s| s.name() == name) {
            return Err(TaskError::DuplicateStepName {
                list: self.title.clone(),
                step: name,
            });
        }
        self.steps.push(TaskStep::new(name, kind));
        Ok(self)
    }
}
