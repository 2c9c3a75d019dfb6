use crate::settings::error::SettingsError;
use std::collections::HashMap;

/// Variables available to `${VAR}` references inside settings files.
#[derive(Debug, Clone)]
pub struct EnvContext {
    vars: HashMap<String, String>,
}

impl EnvContext {
    /// Snapshot of the process environment.
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn merge(&mut self, vars: HashMap<String, String>) {
        self.vars.extend(vars);
    }

    /// Replaces every `${VAR}` in `input`. `$$` yields a literal `$`.
    pub fn expand(&self, input: &str) -> Result<String, SettingsError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];

            if let Some(after) = tail.strip_prefix('$') {
                out.push('$');
                rest = after;
            } else if let Some(body) = tail.strip_prefix('{') {
                let end = body
                    .find('}')
                    .ok_or_else(|| SettingsError::UnterminatedVariable(input.to_string()))?;
                let key = &body[..end];
                let value = self
                    .get(key)
                    .ok_or_else(|| SettingsError::UnknownVariable(key.to_string()))?;
                out.push_str(value);
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = tail;
            }
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Expands references in every string of a JSON document.
    pub fn expand_json(&self, value: &mut serde_json::Value) -> Result<(), SettingsError> {
        match value {
            serde_json::Value::String(s) => {
                if s.contains('$') {
                    *s = self.expand(s)?;
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.expand_json(item)?;
                }
            }
            serde_json::Value::Object(map) => {
                for (_, item) in map.iter_mut() {
                    self.expand_json(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for EnvContext {
    fn default() -> Self {
        Self::new()
    }
}
