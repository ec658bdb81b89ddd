// ABOUTME: A single unit of remote work and its kind-specific payload.
// ABOUTME: Steps are immutable once built; only read accessors are exposed.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Variables handed to a script or template.
pub type Vars = BTreeMap<String, Value>;

/// Logical name of a bundled script asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptRef(String);

impl ScriptRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a copy step reads its content from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    /// A local file, sent as-is unless vars are supplied.
    File(PathBuf),
    /// A bundled template asset, rendered with the step vars.
    Template(String),
}

impl fmt::Display for CopySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopySource::File(path) => write!(f, "{}", path.display()),
            CopySource::Template(name) => write!(f, "template:{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Report upload progress while sending.
    pub progress: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    ExecuteScript {
        script: ScriptRef,
        vars: Vars,
    },
    Copy {
        source: CopySource,
        dest: String,
        vars: Vars,
        options: CopyOptions,
    },
    ExecuteCommand {
        command: String,
    },
    /// Poll the deployed service until it answers or the window closes.
    Verify {
        port: u16,
        wait: Duration,
    },
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::ExecuteScript { .. } => "script",
            StepKind::Copy { .. } => "copy",
            StepKind::ExecuteCommand { .. } => "command",
            StepKind::Verify { .. } => "verify",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStep {
    name: String,
    kind: StepKind,
}

impl TaskStep {
    pub(super) fn new(name: String, kind: StepKind) -> Self {
        Self { name, kind }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }
}
