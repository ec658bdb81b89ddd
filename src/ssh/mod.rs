// ABOUTME: SSH transport for remote servers.
// ABOUTME: Supports SSH agent and key-based authentication with known_hosts verification.

mod client;
mod error;
mod target;

pub use client::{Session, SessionConfig};
pub use error::{Error, Result};
pub use target::SshTarget;
