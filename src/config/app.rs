// ABOUTME: The `app` section: what to build, where it lives remotely, how to verify it.
// ABOUTME: Derived values (remote dirs, check port) are computed here, not by callers.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::deserialize::deserialize_app_name;
use super::env_value::EnvValue;
use crate::error::{Error, Result};
use crate::types::AppName;

/// Port probed when neither `deployCheckPort` nor `env.PORT` is set.
pub const DEFAULT_CHECK_PORT: u16 = 80;

/// Seconds to wait for the started app to answer.
pub const DEFAULT_CHECK_WAIT_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(deserialize_with = "deserialize_app_name")]
    pub name: AppName,

    /// Project directory, relative to the config file.
    #[serde(default = "default_project_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub setup: SetupConfig,

    #[serde(default)]
    pub ssl: Option<SslConfig>,

    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub build_options: BuildOptions,

    #[serde(default = "default_check_wait")]
    pub deploy_check_wait_time: u64,

    #[serde(default)]
    pub deploy_check_port: Option<u16>,

    #[serde(default)]
    pub enable_upload_progress_bar: bool,

    /// Cap on concurrently served hosts for parallel commands.
    #[serde(default)]
    pub parallelism: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupConfig {
    /// Remote base install path; the app lives in `<path>/<name>`.
    #[serde(default = "default_setup_path")]
    pub path: String,

    #[serde(default)]
    pub mongo: bool,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            path: default_setup_path(),
            mongo: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslConfig {
    #[serde(default)]
    pub crt: Option<PathBuf>,

    #[serde(default)]
    pub key: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub upload: bool,

    /// Certificates are issued on the server; nothing is uploaded.
    #[serde(default)]
    pub autogenerate: Option<AutogenerateConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutogenerateConfig {
    pub email: String,
    pub domains: String,
}

impl SslConfig {
    /// Local certificate and key to upload, if this config uploads any.
    pub fn upload_files(&self) -> Option<(&PathBuf, &PathBuf)> {
        if self.autogenerate.is_some() || !self.upload {
            return None;
        }
        self.crt.as_ref().zip(self.key.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    /// Explicit output directory; derived from the project path when unset.
    #[serde(default)]
    pub build_location: Option<PathBuf>,

    #[serde(default)]
    pub server_only: bool,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_executable")]
    pub executable: String,

    #[serde(default = "default_architecture")]
    pub architecture: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_location: None,
            server_only: false,
            debug: false,
            executable: default_executable(),
            architecture: default_architecture(),
        }
    }
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn default_project_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_setup_path() -> String {
    "/opt/".to_string()
}

fn default_check_wait() -> u64 {
    DEFAULT_CHECK_WAIT_SECS
}

fn default_true() -> bool {
    true
}

fn default_executable() -> String {
    "meteor".to_string()
}

fn default_architecture() -> String {
    "os.linux.x86_64".to_string()
}

impl AppConfig {
    /// Remote directory holding this app: `<setup.path>/<name>`.
    pub fn remote_dir(&self) -> String {
        format!("{}/{}", self.remote_root(), self.name)
    }

    /// Remote base install path without a trailing slash.
    pub fn remote_root(&self) -> &str {
        self.setup.path.trim_end_matches('/')
    }

    /// `PORT` from the env section, if present and numeric.
    pub fn env_port(&self) -> Result<Option<u16>> {
        let Some(value) = self.env.get("PORT") else {
            return Ok(None);
        };
        let raw = value.resolve()?;
        raw.parse::<u16>()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("env.PORT is not a valid port: {raw}")))
    }

    /// Port the post-start verification probes.
    pub fn deploy_check_port(&self) -> Result<u16> {
        if let Some(port) = self.deploy_check_port {
            return Ok(port);
        }
        Ok(self.env_port()?.unwrap_or(DEFAULT_CHECK_PORT))
    }

    pub fn deploy_check_wait(&self) -> Duration {
        Duration::from_secs(self.deploy_check_wait_time)
    }

    pub(super) fn validate(&self) -> Result<()> {
        if let Some(key) = self
            .env
            .keys()
            .find(|k| !is_env_name(k))
        {
            return Err(Error::InvalidConfig(format!(
                "invalid environment variable name: '{key}'"
            )));
        }

        if let Some(ssl) = &self.ssl
            && ssl.autogenerate.is_none()
            && ssl.upload
            && (ssl.crt.is_none() || ssl.key.is_none())
        {
            return Err(Error::InvalidConfig(
                "ssl requires both crt and key unless autogenerate is set or upload is false"
                    .to_string(),
            ));
        }

        if self.parallelism == Some(0) {
            return Err(Error::InvalidConfig(
                "parallelism must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
