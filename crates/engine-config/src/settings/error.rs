use thiserror::Error;

/// Errors raised when loading source settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// A `${VAR}` reference names a variable that is not set.
    #[error("Environment variable `{0}` is not set")]
    UnknownVariable(String),

    #[error("Unterminated variable reference in `{0}`")]
    UnterminatedVariable(String),
}
