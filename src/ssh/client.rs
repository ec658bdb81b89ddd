// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, authentication, command execution, and uploads.

use super::error::{Error, Result};
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UnixStream;

use crate::executor::CommandOutput;

/// Size of each data packet written during uploads.
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Called with (bytes sent, total) after each chunk.
pub type Progress<'a> = Option<&'a (dyn Fn(u64, u64) + Send + Sync)>;

/// Data fed to a remote command's stdin.
struct Input<'a> {
    reader: &'a mut (dyn AsyncRead + Unpin + Send),
    len: u64,
    on_progress: Progress<'a>,
}

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Optional path to private key file.
    /// If None, will try SSH agent then default key locations.
    pub key_path: Option<PathBuf>,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Timeout for command execution (default: 5 minutes).
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: None,
            trust_on_first_use: false,
            known_hosts_path: None,
            command_timeout: Duration::from_secs(300), // 5 minutes
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Key files tried under `~/.ssh` when neither a key path nor an agent is available.
const DEFAULT_KEY_FILES: [&str; 3] = ["id_ed25519", "id_rsa", "id_ecdsa"];

/// Host key checking against known_hosts, optionally learning unknown hosts.
struct HostKeyCheck {
    host: String,
    port: u16,
    learn_unknown: bool,
    known_hosts: Option<PathBuf>,
}

impl HostKeyCheck {
    fn from_config(config: &SessionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            learn_unknown: config.trust_on_first_use,
            known_hosts: config.known_hosts_path.clone(),
        }
    }

    fn lookup(&self, key: &ssh_key::PublicKey) -> std::result::Result<bool, russh::keys::Error> {
        match &self.known_hosts {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        }
    }

    fn learn(&self, key: &ssh_key::PublicKey) {
        let saved = match &self.known_hosts {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = saved {
            tracing::warn!(host = %self.host, error = %e, "failed to save host key");
        }
    }
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.lookup(server_public_key) {
            Ok(true) => Ok(true),
            // A changed key is never accepted, even with trust-on-first-use.
            Err(russh::keys::Error::KeyChanged { .. }) => Ok(false),
            Ok(false) if self.learn_unknown => {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    "trusting unknown host key on first connection"
                );
                self.learn(server_public_key);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(_) => Ok(self.learn_unknown),
        }
    }
}

/// Authentication method resolved from config.
enum AuthMethod {
    Agent(AgentClient<UnixStream>),
    KeyFile(Arc<ssh_key::PrivateKey>),
}

impl AuthMethod {
    /// Explicit key, then the agent, then the usual key files.
    async fn resolve(config: &SessionConfig) -> Result<Self> {
        if let Some(key_path) = &config.key_path {
            let key = load_secret_key(key_path, None).map_err(|e| Error::KeyLoadFailed {
                path: key_path.clone(),
                reason: e.to_string(),
            })?;
            return Ok(AuthMethod::KeyFile(Arc::new(key)));
        }

        if let Ok(agent) = AgentClient::connect_env().await {
            return Ok(AuthMethod::Agent(agent));
        }

        let home = std::env::var("HOME").map_err(|_| {
            Error::AgentUnavailable("SSH agent not available and HOME not set".to_string())
        })?;
        let ssh_dir = PathBuf::from(home).join(".ssh");

        DEFAULT_KEY_FILES
            .iter()
            .find_map(|name| load_secret_key(ssh_dir.join(name), None).ok())
            .map(|key| AuthMethod::KeyFile(Arc::new(key)))
            .ok_or_else(|| {
                Error::AgentUnavailable("SSH agent not available and no default keys found".to_string())
            })
    }

    async fn authenticate(self, handle: &mut Handle<HostKeyCheck>, user: &str) -> Result<bool> {
        match self {
            AuthMethod::Agent(mut agent) => {
                let keys = agent.request_identities().await.map_err(|e| {
                    Error::AgentUnavailable(format!("failed to list agent keys: {e}"))
                })?;
                if keys.is_empty() {
                    return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
                }

                for key in keys {
                    let accepted = handle
                        .authenticate_publickey_with(user, key, None, &mut agent)
                        .await
                        .is_ok_and(|result| result.success());
                    if accepted {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            AuthMethod::KeyFile(key) => {
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();
                let result = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
        }
    }
}

/// An established SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<HostKeyCheck>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("user", &self.config.user)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let auth = AuthMethod::resolve(&config).await?;

        let client_config = Arc::new(Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });

        let mut handle = client::connect(
            client_config,
            (config.host.as_str(), config.port),
            HostKeyCheck::from_config(&config),
        )
        .await
        .map_err(|e| {
            Error::Connection(format!("{}@{}:{}: {e}", config.user, config.host, config.port))
        })?;

        if !auth.authenticate(&mut handle, &config.user).await? {
            return Err(Error::AuthenticationFailed);
        }

        tracing::debug!(host = %config.host, port = config.port, "SSH session established");
        Ok(Self { config, handle })
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config.command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command, None)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    /// Execute a command with `input` written to its stdin, under the
    /// command timeout.
    pub async fn exec_with_input(&self, command: &str, input: &[u8]) -> Result<CommandOutput> {
        let timeout = self.config.command_timeout;
        let mut reader = input;
        let input = Input {
            len: input.len() as u64,
            reader: &mut reader,
            on_progress: None,
        };
        match tokio::time::timeout(timeout, self.exec_inner(command, Some(input))).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    /// Stream `len` bytes from `reader` into the stdin of `command`.
    ///
    /// Uploads are not bounded by the command timeout. A stalled transfer
    /// is ended by the connection's inactivity timeout instead.
    pub async fn upload(
        &self,
        command: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        len: u64,
        on_progress: Progress<'_>,
    ) -> Result<CommandOutput> {
        let input = Input {
            reader,
            len,
            on_progress,
        };
        self.exec_inner(command, Some(input)).await
    }

    async fn exec_inner(&self, command: &str, input: Option<Input<'_>>) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        if let Some(input) = input {
            let mut buf = vec![0u8; UPLOAD_CHUNK];
            let mut sent = 0u64;
            loop {
                let n = fill_chunk(&mut *input.reader, &mut buf).await?;
                if n == 0 {
                    break;
                }
                channel
                    .data(&buf[..n])
                    .await
                    .map_err(|e| Error::CommandFailed(format!("failed to send data: {}", e)))?;
                sent += n as u64;
                if let Some(report) = input.on_progress {
                    report(sent, input.len.max(sent));
                }
            }
            channel
                .eof()
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to close stdin: {}", e)))?;
        }

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        // stderr
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        // No exit status means the channel died (connection drop, timeout)
        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    /// Disconnect the session.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}

/// Read until `buf` is full or the reader is exhausted.
async fn fill_chunk<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_defaults() {
        let config = SessionConfig::new("web1.example.com", "deploy");
        assert_eq!(config.port, 22);
        assert!(!config.trust_on_first_use);
        assert_eq!(config.command_timeout, Duration::from_secs(300));
    }

    #[test]
    fn session_config_builder_chains() {
        let config = SessionConfig::new("web1", "deploy")
            .port(2222)
            .key_path("/home/deploy/.ssh/id_ed25519")
            .trust_on_first_use(true);
        assert_eq!(config.port, 2222);
        assert!(config.trust_on_first_use);
        assert_eq!(
            config.key_path,
            Some(PathBuf::from("/home/deploy/.ssh/id_ed25519"))
        );
    }

    #[tokio::test]
    async fn fill_chunk_joins_short_reads() {
        let mut reader = (&b"abc"[..]).chain(&b"defgh"[..]);
        let mut buf = [0u8; 6];

        assert_eq!(fill_chunk(&mut reader, &mut buf).await.unwrap(), 6);
        assert_eq!(&buf, b"abcdef");
        assert_eq!(fill_chunk(&mut reader, &mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"gh");
        assert_eq!(fill_chunk(&mut reader, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn large_file_is_read_in_bounded_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.tar.gz");
        std::fs::write(&path, vec![7u8; UPLOAD_CHUNK * 2 + 10]).unwrap();

        let mut file = tokio::fs::File::open(&path).await.unwrap();
        let mut buf = vec![0u8; UPLOAD_CHUNK];
        let mut sizes = Vec::new();
        loop {
            let n = fill_chunk(&mut file, &mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            sizes.push(n);
        }
        assert_eq!(sizes, vec![UPLOAD_CHUNK, UPLOAD_CHUNK, 10]);
    }
}
