// ABOUTME: App operations (setup, push, envconfig, start, stop) and the deploy pipeline.
// ABOUTME: Each operation builds a task list and hands it to the session executor.

mod error;
mod pipeline;
mod tasks;

pub use error::DeployError;
pub use pipeline::{Pipeline, Stage};
pub use tasks::{envconfig_tasks, push_tasks, setup_tasks, start_tasks, stop_tasks};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::artifact::{ArtifactPath, derive_build_path, normalize_path};
use crate::build::BundleBuilder;
use crate::config::{AppConfig, Config, Settings};
use crate::error::Result;
use crate::executor::{ExecutionMode, ExecutionReport, Remote, SessionExecutor};
use crate::output::Output;

/// Everything an app operation needs: validated config, sessions, and local tooling.
pub struct DeployContext<'a, R, B: ?Sized> {
    pub config: &'a Config,
    pub app: &'a AppConfig,
    pub sessions: &'a [R],
    pub executor: &'a SessionExecutor<'a>,
    pub builder: &'a B,
    pub output: &'a Output,
}

impl<R: Remote, B: BundleBuilder + ?Sized> DeployContext<'_, R, B> {
    fn parallel(&self) -> ExecutionMode {
        ExecutionMode::Parallel {
            limit: self.app.parallelism,
        }
    }

    /// Local project directory, absolute with `.` and `..` folded out.
    fn project_dir(&self) -> Result<PathBuf> {
        let path = std::path::absolute(self.config.resolve_path(&self.app.path))?;
        Ok(normalize_path(&path))
    }

    /// Where the bundle gets built: `buildLocation` if set, otherwise derived from the project.
    fn artifact_path(&self, project: &std::path::Path) -> ArtifactPath {
        match &self.app.build_options.build_location {
            Some(location) => ArtifactPath::explicit(self.config.resolve_path(location)),
            None => derive_build_path(project),
        }
    }
}

/// Provision every app server, concurrently.
pub async fn setup<R: Remote, B: BundleBuilder + ?Sized>(
    ctx: &DeployContext<'_, R, B>,
) -> Result<ExecutionReport> {
    let list = setup_tasks(ctx.config, ctx.app)?;
    Ok(ctx.executor.run(&list, ctx.sessions, ctx.parallel()).await?)
}

/// Build the bundle locally and upload it to each server in turn.
pub async fn push<R: Remote, B: BundleBuilder + ?Sized>(
    ctx: &DeployContext<'_, R, B>,
) -> Result<ExecutionReport> {
    let project = ctx.project_dir()?;
    let out = ctx.artifact_path(&project);

    ctx.output.progress("Building App Bundle Locally");
    tracing::info!(project = %project.display(), out = %out, "building bundle");
    let bundle = ctx
        .builder
        .build(&project, &ctx.app.build_options, &out)
        .await?;

    let list = push_tasks(ctx.app, &bundle)?;
    Ok(ctx
        .executor
        .run(&list, ctx.sessions, ExecutionMode::Sequential)
        .await?)
}

/// Upload process config, settings, and environment to each server in turn.
pub async fn envconfig<R: Remote, B: BundleBuilder + ?Sized>(
    ctx: &DeployContext<'_, R, B>,
) -> Result<ExecutionReport> {
    let settings = Settings::load(&ctx.config.base_path)?;
    let list = envconfig_tasks(ctx.app, &settings)?;
    Ok(ctx
        .executor
        .run(&list, ctx.sessions, ExecutionMode::Sequential)
        .await?)
}

/// Start the app on each server in turn and wait for it to answer.
pub async fn start<R: Remote, B: BundleBuilder + ?Sized>(
    ctx: &DeployContext<'_, R, B>,
) -> Result<ExecutionReport> {
    let list = start_tasks(ctx.app)?;
    Ok(ctx
        .executor
        .run(&list, ctx.sessions, ExecutionMode::Sequential)
        .await?)
}

/// Stop the app everywhere, concurrently.
pub async fn stop<R: Remote, B: BundleBuilder + ?Sized>(
    ctx: &DeployContext<'_, R, B>,
) -> Result<ExecutionReport> {
    let list = stop_tasks(ctx.app)?;
    Ok(ctx.executor.run(&list, ctx.sessions, ctx.parallel()).await?)
}

pub struct PushStage;
pub struct EnvConfigStage;
pub struct StartStage;

#[async_trait]
impl<'a, R: Remote, B: BundleBuilder + ?Sized> Stage<DeployContext<'a, R, B>> for PushStage {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn run(&self, ctx: &DeployContext<'a, R, B>) -> Result<()> {
        push(ctx).await.map(drop)
    }
}

#[async_trait]
impl<'a, R: Remote, B: BundleBuilder + ?Sized> Stage<DeployContext<'a, R, B>> for EnvConfigStage {
    fn name(&self) -> &'static str {
        "envconfig"
    }

    async fn run(&self, ctx: &DeployContext<'a, R, B>) -> Result<()> {
        envconfig(ctx).await.map(drop)
    }
}

#[async_trait]
impl<'a, R: Remote, B: BundleBuilder + ?Sized> Stage<DeployContext<'a, R, B>> for StartStage {
    fn name(&self) -> &'static str {
        "start"
    }

    async fn run(&self, ctx: &DeployContext<'a, R, B>) -> Result<()> {
        start(ctx).await.map(drop)
    }
}

/// Push, envconfig, then start; stops at the first failing stage.
///
/// `settings.json` is checked before anything is built, so an invalid file
/// never costs a build or touches a server.
pub async fn deploy<R: Remote, B: BundleBuilder + ?Sized>(
    ctx: &DeployContext<'_, R, B>,
) -> Result<()> {
    Settings::load(&ctx.config.base_path)?;

    Pipeline::new()
        .stage(PushStage)
        .stage(EnvConfigStage)
        .stage(StartStage)
        .run(ctx)
        .await?;
    Ok(())
}
