use connectors::error::AdapterError;
use engine_config::settings::error::SettingsError;
use engine_core::error::StateStoreError;
use engine_runtime::error::RunnerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Invalid connection format provided: {0}")]
    InvalidConnectionFormat(String),

    #[error("Connection test failed: {0}")]
    Connection(#[from] AdapterError),

    #[error("No checkpoint stored for source '{0}'")]
    NoCheckpoint(String),
}
