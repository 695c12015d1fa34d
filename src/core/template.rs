//! Minimal `{{Variable}}` templating for request URLs and bodies.
//!
//! The variables are `Port`, `Username` and `Password`. A leading dot
//! (`{{.Port}}`) and inner whitespace (`{{ Port }}`) are accepted. Referencing
//! a variable that is unknown or not bound in the context is an error, so a
//! broken template never silently renders as an empty string.

use crate::domain::model::{Credentials, Port};
use crate::utils::error::{Result, SyncError};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const PORT: &str = "Port";
pub const USERNAME: &str = "Username";
pub const PASSWORD: &str = "Password";

fn action_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid template regex")
    })
}

/// Variable bindings for one service group within one dispatch.
#[derive(Clone, Default)]
pub struct TemplateContext {
    vars: BTreeMap<&'static str, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_group(port: Port, credentials: &Credentials) -> Self {
        Self::new().with_port(port).with_credentials(credentials)
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.vars.insert(PORT, port.to_string());
        self
    }

    pub fn with_credentials(mut self, credentials: &Credentials) -> Self {
        if let Some(username) = &credentials.username {
            self.vars.insert(USERNAME, username.clone());
        }
        if let Some(password) = &credentials.password {
            self.vars.insert(PASSWORD, password.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Renders `template` against `context`.
pub fn render(template: &str, context: &TemplateContext) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    for caps in action_pattern().captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        push_literal(&mut output, &template[last..whole.start()])?;

        let name = name.as_str();
        if ![PORT, USERNAME, PASSWORD].contains(&name) {
            return Err(SyncError::template(format!(
                "unknown variable '{}' (expected Port, Username or Password)",
                name
            )));
        }
        let value = context
            .get(name)
            .ok_or_else(|| SyncError::template(format!("variable '{}' is not set", name)))?;
        output.push_str(value);

        last = whole.end();
    }

    push_literal(&mut output, &template[last..])?;
    Ok(output)
}

fn push_literal(output: &mut String, literal: &str) -> Result<()> {
    if let Some(offset) = literal.find("{{") {
        return Err(SyncError::template(format!(
            "malformed action near '{}'",
            literal[offset..].chars().take(24).collect::<String>()
        )));
    }
    output.push_str(literal);
    Ok(())
}
