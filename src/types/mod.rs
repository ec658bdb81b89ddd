// ABOUTME: Validated domain types shared across config, tasks, and commands.
// ABOUTME: Values are checked once at construction and trusted afterwards.

mod app_name;
mod role;

pub use app_name::{AppName, AppNameError};
pub use role::Role;
