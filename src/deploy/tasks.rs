// ABOUTME: Task lists for each app operation: setup, push, envconfig, start, stop.
// ABOUTME: Pure builders over validated config; nothing here touches the network.

use serde_json::{Value, json};
use std::path::Path;

use crate::assets;
use crate::config::{AppConfig, Config, Settings, resolve_env_map};
use crate::error::Result;
use crate::tasks::{CopyOptions, CopySource, ScriptRef, TaskList, Vars};

fn vars(value: Value) -> Vars {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Vars::new(),
    }
}

/// Provision a fresh server: directories, toolchain, optional database and certificates.
pub fn setup_tasks(config: &Config, app: &AppConfig) -> Result<TaskList> {
    let app_dir = app.remote_dir();

    let mut list = TaskList::new("Setup App")
        .add_script(
            "Setup Environment",
            ScriptRef::new(assets::SETUP),
            vars(json!({ "appName": app.name.as_str(), "rootPath": app.remote_root() })),
        )?
        .add_script(
            "Installing gcc++ and make",
            ScriptRef::new(assets::INSTALL_INIT),
            Vars::new(),
        )?
        .add_script("Installing NVM", ScriptRef::new(assets::INSTALL_NVM), Vars::new())?
        .add_script(
            "Installing Nodejs",
            ScriptRef::new(assets::INSTALL_NODEJS),
            Vars::new(),
        )?
        .add_script("Installing PM2", ScriptRef::new(assets::INSTALL_PM2), Vars::new())?;

    if app.setup.mongo {
        list = list.add_script(
            "Installing MongoDB",
            ScriptRef::new(assets::INSTALL_MONGODB),
            Vars::new(),
        )?;
    }

    if let Some((crt, key)) = app.ssl.as_ref().and_then(|ssl| ssl.upload_files()) {
        list = list
            .add_file_copy(
                "Copying SSL Certificate Bundle",
                config.resolve_path(crt),
                format!("{app_dir}/config/bundle.crt"),
                CopyOptions::default(),
            )?
            .add_file_copy(
                "Copying SSL Private Key",
                config.resolve_path(key),
                format!("{app_dir}/config/private.key"),
                CopyOptions::default(),
            )?;
    }

    Ok(list)
}

/// Upload a locally built bundle into the app's tmp dir.
pub fn push_tasks(app: &AppConfig, bundle: &Path) -> Result<TaskList> {
    let tmp_dir = format!("{}/tmp", app.remote_dir());

    Ok(TaskList::new("Pushing App")
        .add_command(
            "Create Project Directory",
            format!("mkdir -p {}", assets::shell_quote(&tmp_dir)),
        )?
        .add_file_copy(
            "Pushing App Bundle to The Server",
            bundle,
            format!("{tmp_dir}/bundle.tar.gz"),
            CopyOptions {
                progress: app.enable_upload_progress_bar,
            },
        )?)
}

/// Upload the process manager config, settings, and environment.
pub fn envconfig_tasks(app: &AppConfig, settings: &Settings) -> Result<TaskList> {
    let app_dir = app.remote_dir();

    let env = resolve_env_map(&app.env)?;
    let mut env_with_settings = env.clone();
    env_with_settings.insert("METEOR_SETTINGS".to_string(), settings.to_json_string());

    Ok(TaskList::new("Setup App Env")
        .add_copy(
            "Uploading pm start script",
            CopySource::Template(assets::APP_JSON.to_string()),
            format!("{app_dir}/app.json"),
            vars(json!({ "appName": app.name.as_str(), "appDir": app_dir, "env": env })),
            CopyOptions::default(),
        )?
        .add_file_copy(
            "Uploading app settings.json",
            settings.path(),
            format!("{app_dir}/settings.json"),
            CopyOptions::default(),
        )?
        .add_copy(
            "Sending Environment Variables",
            CopySource::Template(assets::ENV_LIST.to_string()),
            format!("{app_dir}/config/env.list"),
            vars(json!({ "appName": app.name.as_str(), "env": env_with_settings })),
            CopyOptions::default(),
        )?)
}

/// Start the uploaded bundle, then wait for it to answer.
pub fn start_tasks(app: &AppConfig) -> Result<TaskList> {
    let mut start_vars = vars(json!({
        "appName": app.name.as_str(),
        "rootPath": app.remote_root(),
    }));
    if let Some(port) = app.env_port()? {
        start_vars.insert("rootPort".to_string(), json!(port));
    }

    Ok(TaskList::new("Start App")
        .add_script("Start App", ScriptRef::new(assets::START), start_vars)?
        .add_verify(
            "Verifying Deployment",
            app.deploy_check_port()?,
            app.deploy_check_wait(),
        )?)
}

pub fn stop_tasks(app: &AppConfig) -> Result<TaskList> {
    Ok(TaskList::new("Stop App").add_script(
        "Stop App",
        ScriptRef::new(assets::STOP),
        vars(json!({ "appName": app.name.as_str() })),
    )?)
}
