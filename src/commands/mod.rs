// ABOUTME: Command module aggregator for the rollout CLI.
// ABOUTME: Re-exports the app command handler.

mod app;

pub use app::{AppCommand, run_app_command};
