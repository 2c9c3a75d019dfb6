use crate::error::CliError;
use engine_config::settings::env::EnvContext;
use std::{collections::HashMap, fs, path::Path};

/// Process environment plus, optionally, a `.env` style file whose entries
/// take precedence.
pub fn load_env(env_file: Option<&Path>) -> Result<EnvContext, CliError> {
    let mut env = EnvContext::new();
    if let Some(path) = env_file {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;
        env.merge(parse_env_content(&content)?);
    }
    Ok(env)
}

fn parse_env_content(content: &str) -> Result<HashMap<String, String>, CliError> {
    let mut vars = HashMap::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid env file: malformed line {} (expected KEY=VALUE)",
                line_num + 1
            )));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::Config(format!(
                "Invalid env file: empty key at line {}",
                line_num + 1
            )));
        }
        vars.insert(key.to_string(), unquote_value(value));
    }

    Ok(vars)
}

fn unquote_value(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}
