// ABOUTME: Application-wide error types for rollout.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::build::BuildError;
use crate::deploy::DeployError;
use crate::executor::ExecutionError;
use crate::tasks::TaskError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("no configs found for '{0}': add an `{0}:` section to the configuration")]
    ConfigMissing(&'static str),

    #[error("invalid settings in {}: {reason}", .path.display())]
    SettingsInvalid { path: PathBuf, reason: String },

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no servers configured for roles: {0}")]
    NoServers(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
