// ABOUTME: Bundled shell scripts and templates, addressed by stable logical names.
// ABOUTME: Content is opaque to the orchestrator; only names and vars cross the seam.

mod render;

pub use render::{RenderError, render_script, render_template, shell_quote};

pub const SETUP: &str = "setup.sh";
pub const INSTALL_INIT: &str = "install-init.sh";
pub const INSTALL_NVM: &str = "install-nvm.sh";
pub const INSTALL_NODEJS: &str = "install-nodejs.sh";
pub const INSTALL_PM2: &str = "install-pm2.sh";
pub const INSTALL_MONGODB: &str = "install-mongodb.sh";
pub const START: &str = "start.sh";
pub const STOP: &str = "stop.sh";

pub const APP_JSON: &str = "app.json";
pub const ENV_LIST: &str = "env.list";

/// A named asset body.
#[derive(Debug, Clone, Copy)]
pub struct Asset {
    pub name: &'static str,
    pub body: &'static str,
}

static SCRIPTS: &[Asset] = &[
    Asset {
        name: SETUP,
        body: include_str!("../../assets/scripts/setup.sh"),
    },
    Asset {
        name: INSTALL_INIT,
        body: include_str!("../../assets/scripts/install-init.sh"),
    },
    Asset {
        name: INSTALL_NVM,
        body: include_str!("../../assets/scripts/install-nvm.sh"),
    },
    Asset {
        name: INSTALL_NODEJS,
        body: include_str!("../../assets/scripts/install-nodejs.sh"),
    },
    Asset {
        name: INSTALL_PM2,
        body: include_str!("../../assets/scripts/install-pm2.sh"),
    },
    Asset {
        name: INSTALL_MONGODB,
        body: include_str!("../../assets/scripts/install-mongodb.sh"),
    },
    Asset {
        name: START,
        body: include_str!("../../assets/scripts/start.sh"),
    },
    Asset {
        name: STOP,
        body: include_str!("../../assets/scripts/stop.sh"),
    },
];

static TEMPLATES: &[Asset] = &[
    Asset {
        name: APP_JSON,
        body: include_str!("../../assets/templates/app.json"),
    },
    Asset {
        name: ENV_LIST,
        body: include_str!("../../assets/templates/env.list"),
    },
];

pub fn script(name: &str) -> Option<&'static Asset> {
    SCRIPTS.iter().find(|a| a.name == name)
}

pub fn template(name: &str) -> Option<&'static Asset> {
    TEMPLATES.iter().find(|a| a.name == name)
}
