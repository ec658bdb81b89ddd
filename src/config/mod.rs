// ABOUTME: Configuration types and parsing for rollout.yml.
// ABOUTME: Handles YAML parsing, validation, server roles, and settings.json.

mod app;
mod deserialize;
mod env_value;
mod init;
mod server;
mod settings;

pub use app::{
    AppConfig, AutogenerateConfig, BuildOptions, DEFAULT_CHECK_PORT, DEFAULT_CHECK_WAIT_SECS,
    SetupConfig, SslConfig,
};
pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use server::ServerConfig;
pub use settings::{SETTINGS_FILENAME, Settings};

use crate::error::{Error, Result};
use crate::types::Role;
use deserialize::deserialize_servers;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "rollout.yml";
pub const CONFIG_FILENAME_ALT: &str = "rollout.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".rollout/config.yml";

/// Name of the section every app command requires.
pub const APP_SECTION: &str = "app";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_servers")]
    pub servers: NonEmpty<ServerConfig>,

    #[serde(default)]
    pub app: Option<AppConfig>,

    /// Directory relative paths in the config resolve against.
    #[serde(skip)]
    pub base_path: PathBuf,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.base_path = PathBuf::from(".");
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.base_path = config_base(path);
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                let mut config = Self::load(path)?;
                // .rollout/config.yml still belongs to the project dir
                config.base_path = dir.to_path_buf();
                return Ok(config);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// The app section, or `ConfigMissing` when the file has none.
    pub fn app(&self) -> Result<&AppConfig> {
        self.app
            .as_ref()
            .ok_or(Error::ConfigMissing(APP_SECTION))
    }

    /// Servers carrying at least one of `roles`, in file order.
    pub fn servers_for(&self, roles: &[Role]) -> Vec<&ServerConfig> {
        self.servers
            .iter()
            .filter(|server| server.has_any_role(roles))
            .collect()
    }

    /// Resolve a config-relative path.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn validate(&self) -> Result<()> {
        match &self.app {
            Some(app) => app.validate(),
            None => Ok(()),
        }
    }
}

fn config_base(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
