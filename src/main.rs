// ABOUTME: Entry point for the rollout CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{AppCommand, run_app_command};
use rollout::config::{self, CONFIG_FILENAME, Config};
use rollout::error::Result;
use rollout::output::{Output, OutputMode};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    if let Err(e) = run(cli, output.clone()).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    let command = match cli.command {
        Commands::Init { name, host, force } => {
            config::init_config(&cwd, name.as_deref(), host.as_deref(), force)?;
            output.success(&format!("Created {CONFIG_FILENAME}"));
            return Ok(());
        }
        Commands::Setup => AppCommand::Setup,
        Commands::Push => AppCommand::Push,
        Commands::Envconfig => AppCommand::EnvConfig,
        Commands::Start => AppCommand::Start,
        Commands::Stop => AppCommand::Stop,
        Commands::Deploy => AppCommand::Deploy,
    };

    let config = load_config(&cwd, cli.config.as_deref())?;
    run_app_command(config, command, output).await
}

fn load_config(cwd: &Path, explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path),
        None => Config::discover(cwd),
    }
}
