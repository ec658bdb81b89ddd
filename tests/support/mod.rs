// ABOUTME: Test support utilities.
// ABOUTME: Provides a scripted in-memory Remote and bundle builder for integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use rollout::artifact::ArtifactPath;
use rollout::build::{BuildError, BundleBuilder};
use rollout::config::BuildOptions;
use rollout::executor::{CommandOutput, Remote, RemoteError};
use rollout::tasks::{CopyOptions, CopySource, ScriptRef, Vars};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("rollout=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Calls seen across all fakes sharing it, as `"<label> <op>:<arg>"`.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl CallLog {
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Operations one session saw, without the label prefix.
    pub fn calls_for(&self, label: &str) -> Vec<String> {
        let prefix = format!("{label} ");
        self.0
            .lock()
            .iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn record(&self, label: &str, op: String) {
        self.0.lock().push(format!("{label} {op}"));
    }
}

/// Remote that answers from a script instead of a server.
///
/// Operations are keyed as `script:<name>`, `copy:<dest>`, `command:<cmd>`;
/// a key listed with [`FakeRemote::failing`] exits with code 1.
pub struct FakeRemote {
    label: String,
    log: CallLog,
    failing: Vec<String>,
    broken: Vec<String>,
    up_after: Option<usize>,
    probes: AtomicUsize,
    delay: Duration,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn new(label: &str, log: &CallLog) -> Self {
        Self {
            label: label.to_string(),
            log: log.clone(),
            failing: Vec::new(),
            broken: Vec::new(),
            up_after: Some(0),
            probes: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Exit non-zero for this operation key.
    pub fn failing(mut self, key: &str) -> Self {
        self.failing.push(key.to_string());
        self
    }

    /// Fail this operation key at the transport level.
    pub fn broken(mut self, key: &str) -> Self {
        self.broken.push(key.to_string());
        self
    }

    /// Answer probes only after this many unsuccessful ones.
    pub fn up_after(mut self, probes: usize) -> Self {
        self.up_after = Some(probes);
        self
    }

    pub fn never_up(mut self) -> Self {
        self.up_after = None;
        self
    }

    /// Sleep this long inside every operation.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    async fn answer(&self, key: String) -> Result<CommandOutput, RemoteError> {
        self.log.record(&self.label, key.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.broken.contains(&key) {
            return Err(RemoteError::new(format!("connection lost during {key}")));
        }
        if self.failing.contains(&key) {
            return Ok(CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("{key} failed"),
            });
        }
        Ok(CommandOutput::ok())
    }
}

#[async_trait]
impl Remote for FakeRemote {
    fn label(&self) -> &str {
        &self.label
    }

    async fn execute_script(
        &self,
        script: &ScriptRef,
        _vars: &Vars,
    ) -> Result<CommandOutput, RemoteError> {
        self.answer(format!("script:{}", script.name())).await
    }

    async fn copy(
        &self,
        _source: &CopySource,
        dest: &str,
        _vars: &Vars,
        _options: CopyOptions,
    ) -> Result<CommandOutput, RemoteError> {
        self.answer(format!("copy:{dest}")).await
    }

    async fn execute_command(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        self.answer(format!("command:{command}")).await
    }

    async fn probe(&self, port: u16) -> Result<bool, RemoteError> {
        self.log.record(&self.label, format!("probe:{port}"));
        let seen = self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.up_after.is_some_and(|after| seen >= after))
    }
}

/// Builder that records its inputs instead of invoking a toolchain.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeBuilder {
    pub fail: bool,
    pub builds: Mutex<Vec<(PathBuf, PathBuf)>>,
}

#[async_trait]
impl BundleBuilder for FakeBuilder {
    async fn build(
        &self,
        project: &Path,
        _options: &BuildOptions,
        out: &ArtifactPath,
    ) -> Result<PathBuf, BuildError> {
        self.builds
            .lock()
            .push((project.to_path_buf(), out.dir().to_path_buf()));
        if self.fail {
            return Err(BuildError::Failed {
                program: "fake".to_string(),
                code: Some(1),
                stderr: "compile error".to_string(),
            });
        }
        Ok(out.bundle())
    }
}
