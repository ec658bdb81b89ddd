// ABOUTME: Diagnostics accumulator for non-fatal warnings during a command.
// ABOUTME: Collects warnings that shouldn't fail a run but should be shown to users.

use parking_lot::Mutex;

use crate::output::Output;

/// Collects non-fatal warnings; shared by reference across sessions.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.lock().push(warning);
    }

    /// Snapshot of all collected warnings.
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().is_empty()
    }

    /// Print every collected warning.
    pub fn report(&self, output: &Output) {
        for warning in self.warnings.lock().iter() {
            output.warning(&warning.message);
        }
    }
}

/// A non-fatal warning collected during a command.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }

    /// Create a warning for servers that matched no role and were ignored.
    pub fn unused_server(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::UnusedServer,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
    /// A configured server carries none of the roles a command targets.
    UnusedServer,
}
