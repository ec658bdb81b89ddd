// ABOUTME: Role tags used to select which servers a command targets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role tag attached to a server in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Role every app command targets, and the default for untagged servers.
    pub const APP: &'static str = "app";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn app() -> Self {
        Self::new(Self::APP)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
