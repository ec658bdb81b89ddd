// ABOUTME: Per-session, per-step outcomes of one task list run.
// ABOUTME: Serializable so JSON output mode can emit it verbatim.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::ExitInfo;
use crate::tasks::TaskList;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { exit: ExitInfo },
    /// Not run because an earlier step on the same session failed.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Succeeded,
    Failed,
    /// The run was aborted before this session began.
    NotStarted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: String,
    pub status: SessionStatus,
    pub steps: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionReport {
    pub(super) fn not_started(session: &str, list: &TaskList) -> Self {
        Self {
            session: session.to_string(),
            status: SessionStatus::NotStarted,
            steps: list
                .step_names()
                .map(|name| StepReport {
                    name: name.to_string(),
                    outcome: StepOutcome::Skipped,
                })
                .collect(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.outcome)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub title: String,
    pub sessions: Vec<SessionReport>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.sessions
            .iter()
            .all(|s| s.status == SessionStatus::Succeeded)
    }

    pub fn session(&self, label: &str) -> Option<&SessionReport> {
        self.sessions.iter().find(|s| s.session == label)
    }

    pub fn failed_sessions(&self) -> impl Iterator<Item = &SessionReport> {
        self.sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Failed)
    }
}
