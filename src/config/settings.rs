// ABOUTME: Application runtime settings loaded from settings.json.
// ABOUTME: Validated before a deploy starts so a bad file never reaches a server.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Settings {
    /// Load `settings.json` from `base`; it must exist and hold a JSON object.
    pub fn load(base: &Path) -> Result<Self> {
        let path = base.join(SETTINGS_FILENAME);
        let content = std::fs::read_to_string(&path).map_err(|e| Error::SettingsInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    pub fn parse(path: PathBuf, content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).map_err(|e| Error::SettingsInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        match value {
            Value::Object(values) => Ok(Self { path, values }),
            other => Err(Error::SettingsInvalid {
                path,
                reason: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compact JSON, as exported to the app's environment.
    pub fn to_json_string(&self) -> String {
        Value::Object(self.values.clone()).to_string()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
