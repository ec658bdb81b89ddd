// ABOUTME: Integration tests for app operations and the deploy pipeline.
// ABOUTME: Uses fake sessions and a fake builder against a temp project directory.

mod support;

use rollout::artifact::derive_build_path;
use rollout::config::Config;
use rollout::deploy::{self, DeployContext};
use rollout::error::Error;
use rollout::executor::{ExecutionError, SessionExecutor};
use rollout::output::{Output, OutputMode};
use rollout::tasks::StepKind;
use std::fs;
use std::path::Path;
use std::time::Duration;
use support::{CallLog, FakeBuilder, FakeRemote};
use tempfile::TempDir;

const APP: &str = r#"
servers:
  - host: web1
  - host: web2
app:
  name: demo
  env:
    PORT: 3000
"#;

fn project(yaml: &str, settings: Option<&str>) -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("rollout.yml"), yaml).unwrap();
    if let Some(settings) = settings {
        fs::write(dir.path().join("settings.json"), settings).unwrap();
    }
    let config = Config::load(&dir.path().join("rollout.yml")).unwrap();
    (dir, config)
}

fn context<'a>(
    config: &'a Config,
    sessions: &'a [FakeRemote],
    executor: &'a SessionExecutor<'a>,
    builder: &'a FakeBuilder,
    output: &'a Output,
) -> DeployContext<'a, FakeRemote, FakeBuilder> {
    DeployContext {
        config,
        app: config.app().unwrap(),
        sessions,
        executor,
        builder,
        output,
    }
}

fn deploy_calls() -> Vec<&'static str> {
    vec![
        "command:mkdir -p '/opt/demo/tmp'",
        "copy:/opt/demo/tmp/bundle.tar.gz",
        "copy:/opt/demo/app.json",
        "copy:/opt/demo/settings.json",
        "copy:/opt/demo/config/env.list",
        "script:start.sh",
        "probe:3000",
    ]
}

mod deploy_pipeline {
    use super::*;

    #[tokio::test]
    async fn stages_run_in_order_on_every_session() {
        support::init_tracing();
        let yaml = format!("{APP}  deployCheckWaitTime: 5\n");
        let (_dir, config) = project(&yaml, Some(r#"{"public": {}}"#));
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log), FakeRemote::new("web2", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        deploy::deploy(&ctx).await.unwrap();

        assert_eq!(log.calls_for("web1"), deploy_calls());
        assert_eq!(log.calls_for("web2"), deploy_calls());
        assert_eq!(builder.builds.lock().len(), 1);

        // Each stage finishes on every session before the next stage begins.
        let calls = log.calls();
        let last_push = calls
            .iter()
            .rposition(|c| c.ends_with("bundle.tar.gz"))
            .unwrap();
        let first_envconfig = calls.iter().position(|c| c.ends_with("app.json")).unwrap();
        assert!(last_push < first_envconfig);

        let start = deploy::start_tasks(config.app().unwrap()).unwrap();
        let verify = start.steps().last().unwrap();
        assert_eq!(
            verify.kind(),
            &StepKind::Verify {
                port: 3000,
                wait: Duration::from_secs(5),
            }
        );
    }

    #[tokio::test]
    async fn push_failure_stops_later_stages() {
        let (_dir, config) = project(APP, Some("{}"));
        let log = CallLog::default();
        let sessions = [
            FakeRemote::new("web1", &log).failing("copy:/opt/demo/tmp/bundle.tar.gz"),
            FakeRemote::new("web2", &log),
        ];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        let err = deploy::deploy(&ctx).await.unwrap_err();

        let deploy_err = match err {
            Error::Deploy(e) => e,
            other => panic!("expected a stage failure, got {other:?}"),
        };
        assert_eq!(deploy_err.stage, "push");
        let execution = deploy_err.execution().unwrap();
        assert!(matches!(execution, ExecutionError::StepFailed { .. }));
        assert_eq!(execution.step(), "Pushing App Bundle to The Server");
        assert_eq!(execution.session(), "web1");

        assert_eq!(
            log.calls(),
            [
                "web1 command:mkdir -p '/opt/demo/tmp'",
                "web1 copy:/opt/demo/tmp/bundle.tar.gz",
            ]
        );
    }

    #[tokio::test]
    async fn build_failure_never_reaches_a_server() {
        let (_dir, config) = project(APP, Some("{}"));
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder {
            fail: true,
            ..Default::default()
        };
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        let err = deploy::deploy(&ctx).await.unwrap_err();

        match err {
            Error::Deploy(e) => {
                assert_eq!(e.stage, "push");
                assert!(matches!(*e.source, Error::Build(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_settings_abort_before_build() {
        let (_dir, config) = project(APP, Some("[1, 2]"));
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        let err = deploy::deploy(&ctx).await.unwrap_err();

        assert!(matches!(err, Error::SettingsInvalid { .. }));
        assert!(builder.builds.lock().is_empty());
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_settings_abort_before_build() {
        let (_dir, config) = project(APP, None);
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        let err = deploy::deploy(&ctx).await.unwrap_err();

        assert!(matches!(err, Error::SettingsInvalid { .. }));
        assert!(builder.builds.lock().is_empty());
    }
}

mod single_operations {
    use super::*;

    #[tokio::test]
    async fn push_builds_into_derived_dir() {
        let (_dir, config) = project(APP, None);
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        deploy::push(&ctx).await.unwrap();

        let builds = builder.builds.lock();
        let (project_dir, out_dir) = &builds[0];
        assert!(project_dir.is_absolute());
        assert_eq!(out_dir, derive_build_path(project_dir).dir());
    }

    #[tokio::test]
    async fn push_folds_parent_dirs_out_of_project_path() {
        let yaml = format!("{APP}  path: tools/../demo/.\n");
        let (dir, config) = project(&yaml, None);
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        deploy::push(&ctx).await.unwrap();

        let builds = builder.builds.lock();
        let (project_dir, out_dir) = &builds[0];
        let expected = std::path::absolute(dir.path().join("demo")).unwrap();
        assert_eq!(project_dir, &expected);
        assert_eq!(out_dir, derive_build_path(&expected).dir());
    }

    #[tokio::test]
    async fn push_honors_build_location() {
        let yaml = format!("{APP}  buildOptions:\n    buildLocation: out/build\n");
        let (dir, config) = project(&yaml, None);
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        deploy::push(&ctx).await.unwrap();

        let builds = builder.builds.lock();
        assert_eq!(builds[0].1, dir.path().join("out/build"));
    }

    #[tokio::test]
    async fn setup_installs_on_every_server() {
        let (_dir, config) = project(APP, None);
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log), FakeRemote::new("web2", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        let report = deploy::setup(&ctx).await.unwrap();

        assert!(report.succeeded());
        for label in ["web1", "web2"] {
            assert_eq!(
                log.calls_for(label),
                [
                    "script:setup.sh",
                    "script:install-init.sh",
                    "script:install-nvm.sh",
                    "script:install-nodejs.sh",
                    "script:install-pm2.sh",
                ]
            );
        }
    }

    #[tokio::test]
    async fn stop_failure_on_one_server_still_stops_the_other() {
        let (_dir, config) = project(APP, None);
        let log = CallLog::default();
        let sessions = [
            FakeRemote::new("web1", &log).failing("script:stop.sh"),
            FakeRemote::new("web2", &log),
        ];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        let err = deploy::stop(&ctx).await.unwrap_err();

        assert!(matches!(err, Error::Execution(_)));
        assert_eq!(log.calls_for("web2"), ["script:stop.sh"]);
    }

    #[tokio::test]
    async fn start_uses_configured_check_port() {
        let yaml = format!("{APP}  deployCheckPort: 8080\n");
        let (_dir, config) = project(&yaml, None);
        let log = CallLog::default();
        let sessions = [FakeRemote::new("web1", &log)];
        let output = Output::new(OutputMode::Quiet);
        let executor = SessionExecutor::new(&output);
        let builder = FakeBuilder::default();
        let ctx = context(&config, &sessions, &executor, &builder, &output);

        deploy::start(&ctx).await.unwrap();

        assert_eq!(log.calls_for("web1"), ["script:start.sh", "probe:8080"]);
    }
}

#[test]
fn derived_dir_is_stable_for_a_project() {
    let a = derive_build_path(Path::new("/work/demo"));
    let b = derive_build_path(Path::new("/work/demo"));
    assert_eq!(a, b);
}
