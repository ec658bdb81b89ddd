// ABOUTME: Integration tests for the session executor.
// ABOUTME: Drives task lists across scripted fake sessions in both execution modes.

mod support;

use rollout::executor::{
    ExecutionError, ExecutionMode, ExitInfo, SessionExecutor, SessionStatus, StepOutcome,
};
use rollout::output::{Output, OutputMode};
use rollout::tasks::TaskList;
use std::time::Duration;
use support::{CallLog, FakeRemote};

fn abc() -> TaskList {
    TaskList::new("Three Steps")
        .add_command("A", "a")
        .unwrap()
        .add_command("B", "b")
        .unwrap()
        .add_command("C", "c")
        .unwrap()
}

fn quiet() -> Output {
    Output::new(OutputMode::Quiet)
}

mod sequential {
    use super::*;

    #[tokio::test]
    async fn all_steps_succeed() {
        support::init_tracing();
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log), FakeRemote::new("web2", &log)];
        let output = quiet();

        let report = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::Sequential)
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.title, "Three Steps");
        assert_eq!(
            log.calls(),
            [
                "web1 command:a",
                "web1 command:b",
                "web1 command:c",
                "web2 command:a",
                "web2 command:b",
                "web2 command:c",
            ]
        );
    }

    #[tokio::test]
    async fn failing_step_skips_the_rest() {
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log).failing("command:b")];
        let output = quiet();

        let err = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::Sequential)
            .await
            .unwrap_err();

        assert_eq!(err.step(), "B");
        assert_eq!(err.session(), "web1");
        assert!(matches!(
            &err,
            ExecutionError::StepFailed { exit: ExitInfo::Status { code: 1, .. }, .. }
        ));
        assert_eq!(log.calls_for("web1"), ["command:a", "command:b"]);

        let session = err.report().session("web1").unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.step("A"), Some(&StepOutcome::Succeeded));
        assert!(matches!(session.step("B"), Some(StepOutcome::Failed { .. })));
        assert_eq!(session.step("C"), Some(&StepOutcome::Skipped));
    }

    #[tokio::test]
    async fn failure_leaves_later_sessions_untouched() {
        let log = CallLog::default();
        let sessions = [
            FakeRemote::new("web1", &log).failing("command:a"),
            FakeRemote::new("web2", &log),
        ];
        let output = quiet();

        let err = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::Sequential)
            .await
            .unwrap_err();

        assert_eq!(err.session(), "web1");
        assert!(log.calls_for("web2").is_empty());

        let web2 = err.report().session("web2").unwrap();
        assert_eq!(web2.status, SessionStatus::NotStarted);
        assert!(web2.started_at.is_none());
        assert!(web2.steps.iter().all(|s| s.outcome == StepOutcome::Skipped));
    }

    #[tokio::test]
    async fn transport_error_fails_the_step() {
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log).broken("command:a")];
        let output = quiet();

        let err = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::Sequential)
            .await
            .unwrap_err();

        match err {
            ExecutionError::StepFailed {
                exit: ExitInfo::Transport { message },
                ..
            } => assert!(message.contains("connection lost")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

mod parallel {
    use super::*;

    #[tokio::test]
    async fn failure_on_one_session_does_not_mark_the_other() {
        let log = CallLog::default();
        let sessions = [
            FakeRemote::new("s1", &log),
            FakeRemote::new("s2", &log).failing("command:b"),
        ];
        let output = quiet();

        let err = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::PARALLEL)
            .await
            .unwrap_err();

        assert_eq!(err.session(), "s2");
        assert_eq!(err.step(), "B");

        let report = err.report();
        assert_eq!(report.session("s1").unwrap().status, SessionStatus::Succeeded);
        assert_eq!(report.session("s2").unwrap().status, SessionStatus::Failed);
        assert_eq!(report.failed_sessions().count(), 1);
        assert_eq!(log.calls_for("s1"), ["command:a", "command:b", "command:c"]);
    }

    #[tokio::test]
    async fn in_flight_sessions_finish_after_a_failure() {
        let log = CallLog::default();
        let sessions = [
            FakeRemote::new("s1", &log).failing("command:a"),
            FakeRemote::new("s2", &log).delayed(Duration::from_millis(5)),
        ];
        let output = quiet();

        let err = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::PARALLEL)
            .await
            .unwrap_err();

        assert_eq!(err.session(), "s1");
        assert_eq!(err.report().session("s2").unwrap().status, SessionStatus::Succeeded);
    }

    #[tokio::test]
    async fn reports_keep_session_order() {
        let log = CallLog::default();
        let sessions = [
            FakeRemote::new("slow", &log).delayed(Duration::from_millis(20)),
            FakeRemote::new("fast", &log),
        ];
        let output = quiet();

        let report = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::PARALLEL)
            .await
            .unwrap();

        let order: Vec<_> = report.sessions.iter().map(|s| s.session.as_str()).collect();
        assert_eq!(order, ["slow", "fast"]);
    }

    #[tokio::test]
    async fn limit_keeps_waiting_sessions_from_starting_after_failure() {
        let log = CallLog::default();
        let sessions = [
            FakeRemote::new("s1", &log).failing("command:a"),
            FakeRemote::new("s2", &log),
            FakeRemote::new("s3", &log),
        ];
        let output = quiet();

        let err = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::Parallel { limit: Some(1) })
            .await
            .unwrap_err();

        assert_eq!(err.session(), "s1");
        assert!(log.calls_for("s2").is_empty());
        assert!(log.calls_for("s3").is_empty());
        for label in ["s2", "s3"] {
            assert_eq!(
                err.report().session(label).unwrap().status,
                SessionStatus::NotStarted
            );
        }
    }

    #[tokio::test]
    async fn first_failure_is_reported_in_session_order() {
        let log = CallLog::default();
        let sessions = [
            FakeRemote::new("s1", &log)
                .failing("command:c")
                .delayed(Duration::from_millis(10)),
            FakeRemote::new("s2", &log).failing("command:a"),
        ];
        let output = quiet();

        let err = SessionExecutor::new(&output)
            .run(&abc(), &sessions, ExecutionMode::PARALLEL)
            .await
            .unwrap_err();

        assert_eq!(err.session(), "s1");
        assert_eq!(err.step(), "C");
        assert_eq!(err.report().failed_sessions().count(), 2);
    }
}

mod verification {
    use super::*;

    fn start_and_verify(wait: Duration) -> TaskList {
        TaskList::new("Start App")
            .add_command("Start", "start")
            .unwrap()
            .add_verify("Verifying Deployment", 3000, wait)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn service_coming_up_passes() {
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log).up_after(2)];
        let output = quiet();

        let report = SessionExecutor::new(&output)
            .run(
                &start_and_verify(Duration::from_secs(10)),
                &sessions,
                ExecutionMode::Sequential,
            )
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(sessions[0].probe_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_service_times_out() {
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log).never_up()];
        let output = quiet();

        let err = SessionExecutor::new(&output)
            .run(
                &start_and_verify(Duration::from_secs(5)),
                &sessions,
                ExecutionMode::Sequential,
            )
            .await
            .unwrap_err();

        match &err {
            ExecutionError::VerificationTimedOut {
                step, port, waited, ..
            } => {
                assert_eq!(step, "Verifying Deployment");
                assert_eq!(*port, 3000);
                assert_eq!(*waited, Duration::from_secs(5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // One probe per second, including both ends of the window.
        assert_eq!(sessions[0].probe_count(), 6);

        let outcome = err
            .report()
            .session("web1")
            .unwrap()
            .step("Verifying Deployment");
        assert_eq!(
            outcome,
            Some(&StepOutcome::Failed {
                exit: ExitInfo::TimedOut {
                    port: 3000,
                    waited_secs: 5
                }
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_wait_still_probes_once() {
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log).never_up()];
        let output = quiet();

        let result = SessionExecutor::new(&output)
            .run(&start_and_verify(Duration::ZERO), &sessions, ExecutionMode::Sequential)
            .await;

        assert!(result.is_err());
        assert_eq!(sessions[0].probe_count(), 1);
    }
}
