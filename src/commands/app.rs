// ABOUTME: App command implementation shared by setup, push, envconfig, start, stop, deploy.
// ABOUTME: Resolves servers into sessions, runs the operation, then disconnects.

use futures::future::join_all;
use rollout::build::CommandBuilder;
use rollout::config::Config;
use rollout::deploy::{self, DeployContext};
use rollout::diagnostics::{Diagnostics, Warning};
use rollout::error::{Error, Result};
use rollout::executor::{Remote, SessionExecutor};
use rollout::output::Output;
use rollout::ssh::SshTarget;
use rollout::types::Role;

/// Operations acting on the app servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Setup,
    Push,
    EnvConfig,
    Start,
    Stop,
    Deploy,
}

impl AppCommand {
    fn verb(self) -> &'static str {
        match self {
            AppCommand::Setup => "Setting up",
            AppCommand::Push => "Pushing",
            AppCommand::EnvConfig => "Configuring",
            AppCommand::Start => "Starting",
            AppCommand::Stop => "Stopping",
            AppCommand::Deploy => "Deploying",
        }
    }

    fn done(self) -> &'static str {
        match self {
            AppCommand::Setup => "Setup complete",
            AppCommand::Push => "Push complete",
            AppCommand::EnvConfig => "Environment configured",
            AppCommand::Start => "App started",
            AppCommand::Stop => "App stopped",
            AppCommand::Deploy => "Deployment complete",
        }
    }
}

/// Run one app command against every server with the app role.
pub async fn run_app_command(config: Config, command: AppCommand, mut output: Output) -> Result<()> {
    // Missing app section fails before any server is contacted.
    let app = config.app()?;

    output.start_timer();
    let diag = Diagnostics::default();
    let targets = resolve_targets(&config, &output, &diag)?;

    output.progress(&format!(
        "{} {} on {} server(s)",
        command.verb(),
        app.name,
        targets.len()
    ));

    let executor = SessionExecutor::new(&output);
    let builder = CommandBuilder;
    let ctx = DeployContext {
        config: &config,
        app,
        sessions: &targets,
        executor: &executor,
        builder: &builder,
        output: &output,
    };

    let result = match command {
        AppCommand::Setup => deploy::setup(&ctx).await.map(drop),
        AppCommand::Push => deploy::push(&ctx).await.map(drop),
        AppCommand::EnvConfig => deploy::envconfig(&ctx).await.map(drop),
        AppCommand::Start => deploy::start(&ctx).await.map(drop),
        AppCommand::Stop => deploy::stop(&ctx).await.map(drop),
        AppCommand::Deploy => deploy::deploy(&ctx).await,
    };

    disconnect_all(targets, &diag).await;
    diag.report(&output);

    result?;
    output.success(command.done());
    Ok(())
}

fn resolve_targets(config: &Config, output: &Output, diag: &Diagnostics) -> Result<Vec<SshTarget>> {
    let roles = [Role::app()];

    for server in config.servers.iter().filter(|s| !s.has_any_role(&roles)) {
        diag.warn(Warning::unused_server(format!(
            "{} has no '{}' role and is ignored",
            server.label(),
            Role::APP
        )));
    }

    let servers = config.servers_for(&roles);
    if servers.is_empty() {
        return Err(Error::NoServers(Role::APP.to_string()));
    }

    Ok(servers
        .into_iter()
        .map(|server| SshTarget::new(server.label(), server.ssh_session_config(), output.clone()))
        .collect())
}

async fn disconnect_all(targets: Vec<SshTarget>, diag: &Diagnostics) {
    let results = join_all(targets.into_iter().map(|target| async move {
        let label = target.label().to_string();
        (label, target.disconnect().await)
    }))
    .await;

    for (label, result) in results {
        if let Err(e) = result {
            diag.warn(Warning::ssh_disconnect(format!("{label}: {e}")));
        }
    }
}
