// ABOUTME: A server as an executor session, speaking SSH on first use.
// ABOUTME: Renders bundled assets and streams files through the session's stdin.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncRead;
use tokio::sync::OnceCell;

use super::client::{Progress, Session, SessionConfig};
use super::error::Result;
use crate::assets::{self, render_script, render_template, shell_quote};
use crate::executor::{CommandOutput, Remote, RemoteError};
use crate::output::Output;
use crate::tasks::{CopyOptions, CopySource, ScriptRef, Vars};

/// One remote server. The SSH connection is opened lazily, so a server whose
/// run never starts is never contacted.
pub struct SshTarget {
    label: String,
    config: SessionConfig,
    session: OnceCell<Session>,
    output: Output,
}

impl SshTarget {
    pub fn new(label: impl Into<String>, config: SessionConfig, output: Output) -> Self {
        Self {
            label: label.into(),
            config,
            session: OnceCell::new(),
            output,
        }
    }

    /// Whether an SSH connection has been opened.
    pub fn is_connected(&self) -> bool {
        self.session.initialized()
    }

    async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| {
                tracing::debug!(session = %self.label, "connecting");
                Session::connect(self.config.clone())
            })
            .await
    }

    /// Close the connection if one was opened.
    pub async fn disconnect(self) -> Result<()> {
        match self.session.into_inner() {
            Some(session) => session.disconnect().await,
            None => Ok(()),
        }
    }

    async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        len: u64,
        dest: &str,
        progress: bool,
    ) -> std::result::Result<CommandOutput, RemoteError> {
        let session = self.session().await?;
        let command = format!("cat > {}", shell_quote(dest));

        let last_decile = AtomicU64::new(0);
        let report = |sent: u64, total: u64| {
            let decile = if total == 0 { 10 } else { sent * 10 / total };
            if last_decile.swap(decile, Ordering::Relaxed) != decile {
                self.output
                    .progress(&format!("[{}] uploading {dest}: {}%", self.label, decile * 10));
            }
        };
        let on_progress: Progress<'_> = if progress { Some(&report) } else { None };

        tracing::debug!(session = %self.label, dest, bytes = len, "uploading");
        Ok(session.upload(&command, reader, len, on_progress).await?)
    }
}

/// What a copy step sends: a local file streamed from disk, or a rendered body.
#[derive(Debug)]
enum Payload {
    File { file: tokio::fs::File, len: u64 },
    Rendered(Vec<u8>),
}

async fn open_source(source: &CopySource, vars: &Vars) -> std::result::Result<Payload, RemoteError> {
    match source {
        CopySource::Template(name) => {
            let asset = assets::template(name)
                .ok_or_else(|| RemoteError::new(format!("unknown template asset: {name}")))?;
            render(asset.body, vars).map(Payload::Rendered)
        }
        CopySource::File(path) if vars.is_empty() => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| read_error(path, e))?;
            let len = file.metadata().await.map_err(|e| read_error(path, e))?.len();
            Ok(Payload::File { file, len })
        }
        CopySource::File(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| read_error(path, e))?;
            let text = String::from_utf8(bytes).map_err(|_| {
                RemoteError::new(format!("{} is not UTF-8 text", path.display()))
            })?;
            render(&text, vars).map(Payload::Rendered)
        }
    }
}

fn read_error(path: &Path, err: std::io::Error) -> RemoteError {
    RemoteError::new(format!("failed to read {}: {err}", path.display()))
}

fn render(body: &str, vars: &Vars) -> std::result::Result<Vec<u8>, RemoteError> {
    render_template(body, vars)
        .map(String::into_bytes)
        .map_err(|e| RemoteError::new(e.to_string()))
}

#[async_trait]
impl Remote for SshTarget {
    fn label(&self) -> &str {
        &self.label
    }

    async fn execute_script(
        &self,
        script: &ScriptRef,
        vars: &Vars,
    ) -> std::result::Result<CommandOutput, RemoteError> {
        let asset = assets::script(script.name())
            .ok_or_else(|| RemoteError::new(format!("unknown script asset: {script}")))?;
        let body = render_script(asset.body, vars).map_err(|e| RemoteError::new(e.to_string()))?;

        let session = self.session().await?;
        Ok(session
            .exec_with_input("bash -s", body.as_bytes())
            .await?)
    }

    async fn copy(
        &self,
        source: &CopySource,
        dest: &str,
        vars: &Vars,
        options: CopyOptions,
    ) -> std::result::Result<CommandOutput, RemoteError> {
        match open_source(source, vars).await? {
            Payload::File { mut file, len } => {
                self.upload(&mut file, len, dest, options.progress).await
            }
            Payload::Rendered(content) => {
                let len = content.len() as u64;
                self.upload(&mut content.as_slice(), len, dest, options.progress)
                    .await
            }
        }
    }

    async fn execute_command(
        &self,
        command: &str,
    ) -> std::result::Result<CommandOutput, RemoteError> {
        let session = self.session().await?;
        Ok(session.exec(command).await?)
    }
}
