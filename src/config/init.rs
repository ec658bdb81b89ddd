// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates rollout.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::AppName;

use super::CONFIG_FILENAME;

pub fn init_config(dir: &Path, name: Option<&str>, host: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let name = match name {
        Some(n) => AppName::new(n).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => AppName::new("my-app").map_err(|e| Error::InvalidConfig(e.to_string()))?,
    };
    let host = host.unwrap_or("server.example.com");

    std::fs::write(&config_path, generate_template_yaml(&name, host))?;

    Ok(())
}

fn generate_template_yaml(name: &AppName, host: &str) -> String {
    format!(
        r#"servers:
  - host: {host}
    user: deploy
    roles: [app]
    # SSH host key verification (default: true, Trust-On-First-Use)
    # trustFirstConnection: false
    # knownHostsPath: /etc/rollout/known_hosts

app:
  name: {name}
  path: .
  setup:
    path: /opt/
    mongo: false
  env:
    PORT: 3000
    ROOT_URL: http://{host}
  deployCheckWaitTime: 60
  enableUploadProgressBar: true
"#
    )
}
