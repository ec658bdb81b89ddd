// ABOUTME: Variable substitution for bundled assets.
// ABOUTME: Scripts get an export preamble; templates get {{name}} placeholders.

use serde_json::Value;
use thiserror::Error;

use crate::tasks::Vars;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("template references unknown variable '{0}'")]
    UnknownVar(String),

    #[error("unknown placeholder format '{0}'")]
    UnknownFormat(String),

    #[error("'{0}' must be an object to render as exports")]
    NotAnObject(String),

    #[error("unterminated placeholder")]
    Unterminated,

    #[error("invalid shell variable name '{0}'")]
    InvalidName(String),
}

/// Quote a value for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Plain string form of a var: strings unquoted, everything else as JSON.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_shell_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn exports(vars: impl IntoIterator<Item = (String, String)>) -> Result<String, RenderError> {
    let mut out = String::new();
    for (name, value) in vars {
        if !is_shell_name(&name) {
            return Err(RenderError::InvalidName(name));
        }
        out.push_str(&format!("export {name}={}\n", shell_quote(&value)));
    }
    Ok(out)
}

/// Prefix a script body with one `export` per var.
pub fn render_script(body: &str, vars: &Vars) -> Result<String, RenderError> {
    let preamble = exports(vars.iter().map(|(k, v)| (k.clone(), scalar(v))))?;
    Ok(format!("{preamble}{body}"))
}

/// Replace `{{name}}` and `{{name:exports}}` placeholders.
pub fn render_template(body: &str, vars: &Vars) -> Result<String, RenderError> {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or(RenderError::Unterminated)?;
        let placeholder = after[..end].trim();

        let (name, format) = match placeholder.split_once(':') {
            Some((name, format)) => (name.trim(), Some(format.trim())),
            None => (placeholder, None),
        };
        let value = vars
            .get(name)
            .ok_or_else(|| RenderError::UnknownVar(name.to_string()))?;

        match format {
            None => out.push_str(&scalar(value)),
            Some("exports") => {
                let map = value
                    .as_object()
                    .ok_or_else(|| RenderError::NotAnObject(name.to_string()))?;
                let rendered = exports(map.iter().map(|(k, v)| (k.clone(), scalar(v))))?;
                out.push_str(rendered.trim_end());
            }
            Some(other) => return Err(RenderError::UnknownFormat(other.to_string())),
        }

        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}
