// ABOUTME: Session executor: drives one task list across a set of sessions.
// ABOUTME: Steps run in order per session; the first failure halts that session.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::error::{ExecutionError, ExitInfo};
use super::remote::{CommandOutput, Remote, RemoteError};
use super::report::{ExecutionReport, SessionReport, SessionStatus, StepOutcome, StepReport};
use super::verify::{VerificationOutcome, verify};
use crate::output::Output;
use crate::tasks::{StepKind, TaskList, TaskStep};

/// How one task list is spread across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run on every session concurrently, at most `limit` at a time.
    Parallel { limit: Option<usize> },
    /// Finish on one session before starting the next; stop at the first failure.
    Sequential,
}

impl ExecutionMode {
    /// Parallel across all sessions with no concurrency cap.
    pub const PARALLEL: Self = ExecutionMode::Parallel { limit: None };
}

/// How a single step went wrong.
#[derive(Debug)]
enum StepFault {
    Exit(ExitInfo),
    TimedOut { port: u16, waited: Duration },
}

impl StepFault {
    fn exit_info(&self) -> ExitInfo {
        match self {
            StepFault::Exit(info) => info.clone(),
            StepFault::TimedOut { port, waited } => ExitInfo::TimedOut {
                port: *port,
                waited_secs: waited.as_secs(),
            },
        }
    }
}

impl From<RemoteError> for StepFault {
    fn from(err: RemoteError) -> Self {
        StepFault::Exit(ExitInfo::Transport {
            message: err.message().to_string(),
        })
    }
}

/// First failing step of one session.
#[derive(Debug)]
struct SessionFailure {
    session: String,
    step: String,
    fault: StepFault,
}

type SessionRun = (SessionReport, Option<SessionFailure>);

/// Runs task lists against remote sessions.
pub struct SessionExecutor<'a> {
    output: &'a Output,
}

impl<'a> SessionExecutor<'a> {
    pub fn new(output: &'a Output) -> Self {
        Self { output }
    }

    /// Run `list` on every session according to `mode`.
    ///
    /// Succeeds only if every step succeeded on every session. On failure the
    /// error names the first failing step (in session order) and carries the
    /// report for all sessions.
    pub async fn run<R: Remote>(
        &self,
        list: &TaskList,
        sessions: &[R],
        mode: ExecutionMode,
    ) -> Result<ExecutionReport, ExecutionError> {
        tracing::debug!(
            list = list.title(),
            sessions = sessions.len(),
            ?mode,
            "running task list"
        );

        let runs = match mode {
            ExecutionMode::Sequential => self.run_sequential(list, sessions).await,
            ExecutionMode::Parallel { limit } => self.run_parallel(list, sessions, limit).await,
        };

        let mut reports = Vec::with_capacity(runs.len());
        let mut first_failure = None;
        for (report, failure) in runs {
            reports.push(report);
            if first_failure.is_none() {
                first_failure = failure;
            }
        }

        let report = ExecutionReport {
            title: list.title().to_string(),
            sessions: reports,
        };
        self.output.report(&report);

        match first_failure {
            None => Ok(report),
            Some(failure) => Err(into_error(failure, report)),
        }
    }

    async fn run_sequential<R: Remote>(&self, list: &TaskList, sessions: &[R]) -> Vec<SessionRun> {
        let mut runs = Vec::with_capacity(sessions.len());
        let mut aborted = false;

        for session in sessions {
            if aborted {
                runs.push((SessionReport::not_started(session.label(), list), None));
                continue;
            }
            let run = self.run_session(list, session).await;
            aborted = run.1.is_some();
            runs.push(run);
        }

        runs
    }

    async fn run_parallel<R: Remote>(
        &self,
        list: &TaskList,
        sessions: &[R],
        limit: Option<usize>,
    ) -> Vec<SessionRun> {
        let limit = limit.unwrap_or(sessions.len()).max(1);
        let aborted = &AtomicBool::new(false);

        // The first `limit` sessions start together. Later ones wait for a
        // free slot and are not started once any session has failed.
        let runs: Vec<_> = sessions
            .iter()
            .enumerate()
            .map(move |(idx, session)| async move {
                if idx >= limit && aborted.load(Ordering::SeqCst) {
                    tracing::debug!(
                        session = session.label(),
                        "not starting after earlier failure"
                    );
                    return (idx, (SessionReport::not_started(session.label(), list), None));
                }
                let run = self.run_session(list, session).await;
                if run.1.is_some() {
                    aborted.store(true, Ordering::SeqCst);
                }
                (idx, run)
            })
            .collect();
        let mut finished = stream::iter(runs).buffer_unordered(limit);

        let mut slots: Vec<Option<SessionRun>> = sessions.iter().map(|_| None).collect();
        while let Some((idx, run)) = finished.next().await {
            slots[idx] = Some(run);
        }

        slots
            .into_iter()
            .zip(sessions)
            .map(|(slot, session)| {
                slot.unwrap_or_else(|| (SessionReport::not_started(session.label(), list), None))
            })
            .collect()
    }

    async fn run_session<R: Remote>(&self, list: &TaskList, session: &R) -> SessionRun {
        let label = session.label();
        let started_at = Utc::now();
        let mut steps = Vec::with_capacity(list.len());
        let mut failure: Option<SessionFailure> = None;

        for step in list.steps() {
            if failure.is_some() {
                steps.push(StepReport {
                    name: step.name().to_string(),
                    outcome: StepOutcome::Skipped,
                });
                continue;
            }

            tracing::debug!(
                session = label,
                step = step.name(),
                kind = step.kind().label(),
                "running step"
            );

            let outcome = match run_step(session, step).await {
                Ok(()) => {
                    tracing::info!(session = label, step = step.name(), "step succeeded");
                    self.output.step(label, step.name(), true);
                    StepOutcome::Succeeded
                }
                Err(fault) => {
                    let exit = fault.exit_info();
                    tracing::warn!(session = label, step = step.name(), %exit, "step failed");
                    self.output.step(label, step.name(), false);
                    failure = Some(SessionFailure {
                        session: label.to_string(),
                        step: step.name().to_string(),
                        fault,
                    });
                    StepOutcome::Failed { exit }
                }
            };

            steps.push(StepReport {
                name: step.name().to_string(),
                outcome,
            });
        }

        let status = if failure.is_some() {
            SessionStatus::Failed
        } else {
            SessionStatus::Succeeded
        };

        let report = SessionReport {
            session: label.to_string(),
            status,
            steps,
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
        };

        (report, failure)
    }
}

async fn run_step<R: Remote>(session: &R, step: &TaskStep) -> Result<(), StepFault> {
    let output = match step.kind() {
        StepKind::ExecuteScript { script, vars } => session.execute_script(script, vars).await?,
        StepKind::Copy {
            source,
            dest,
            vars,
            options,
        } => session.copy(source, dest, vars, *options).await?,
        StepKind::ExecuteCommand { command } => session.execute_command(command).await?,
        StepKind::Verify { port, wait } => {
            return match verify(session, *port, *wait).await? {
                VerificationOutcome::VerifiedUp => Ok(()),
                VerificationOutcome::VerificationTimedOut => Err(StepFault::TimedOut {
                    port: *port,
                    waited: *wait,
                }),
            };
        }
    };

    check_exit(output)
}

fn check_exit(output: CommandOutput) -> Result<(), StepFault> {
    if output.success() {
        Ok(())
    } else {
        Err(StepFault::Exit(ExitInfo::Status {
            code: output.exit_code,
            stderr: output.stderr,
        }))
    }
}

fn into_error(failure: SessionFailure, report: ExecutionReport) -> ExecutionError {
    let report = Box::new(report);
    match failure.fault {
        StepFault::Exit(exit) => ExecutionError::StepFailed {
            step: failure.step,
            session: failure.session,
            exit,
            report,
        },
        StepFault::TimedOut { port, waited } => ExecutionError::VerificationTimedOut {
            step: failure.step,
            session: failure.session,
            port,
            waited,
            report,
        },
    }
}
