use crate::sink::SinkError;
use connectors::error::AdapterError;
use engine_config::settings::error::SettingsError;
use engine_core::error::StateStoreError;
use engine_processing::error::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// Every attempt failed with an error classified as transient.
    #[error("Giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: SourceError,
    },

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}
