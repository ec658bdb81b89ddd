// ABOUTME: Local bundle build behind a narrow trait.
// ABOUTME: CommandBuilder shells out to the app toolchain and normalizes the archive name.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use crate::artifact::ArtifactPath;
use crate::config::BuildOptions;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("project directory not found: {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("build produced no archive at {}", .0.display())]
    MissingArchive(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces `bundle.tar.gz` for a project inside the given artifact dir.
#[async_trait]
pub trait BundleBuilder: Send + Sync {
    async fn build(
        &self,
        project: &Path,
        options: &BuildOptions,
        out: &ArtifactPath,
    ) -> Result<PathBuf, BuildError>;
}

/// Runs `<executable> build <out> --architecture <arch>` in the project dir.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandBuilder;

#[async_trait]
impl BundleBuilder for CommandBuilder {
    async fn build(
        &self,
        project: &Path,
        options: &BuildOptions,
        out: &ArtifactPath,
    ) -> Result<PathBuf, BuildError> {
        if !project.is_dir() {
            return Err(BuildError::ProjectNotFound(project.to_path_buf()));
        }
        let project = tokio::fs::canonicalize(project).await?;
        tokio::fs::create_dir_all(out.dir()).await?;

        let mut command = Command::new(&options.executable);
        command
            .arg("build")
            .arg(out.dir())
            .arg("--architecture")
            .arg(&options.architecture);
        if options.server_only {
            command.arg("--server-only");
        }
        if options.debug {
            command.arg("--debug");
        }

        tracing::info!(
            project = %project.display(),
            out = %out,
            "building bundle with {}",
            options.executable
        );

        let output = command
            .current_dir(&project)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                program: options.executable.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BuildError::Failed {
                program: options.executable.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        normalize_archive(&project, out).await
    }
}

/// The toolchain names the archive after the project dir; rename it to the bundle name.
async fn normalize_archive(project: &Path, out: &ArtifactPath) -> Result<PathBuf, BuildError> {
    let bundle = out.bundle();

    let produced = project
        .file_name()
        .map(|name| out.dir().join(format!("{}.tar.gz", name.to_string_lossy())));

    if let Some(produced) = produced
        && produced != bundle
        && tokio::fs::try_exists(&produced).await?
    {
        tokio::fs::rename(&produced, &bundle).await?;
    }

    if tokio::fs::try_exists(&bundle).await? {
        Ok(bundle)
    } else {
        Err(BuildError::MissingArchive(bundle))
    }
}
