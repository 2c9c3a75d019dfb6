use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Failed to open state store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sled::Error,
    },

    #[error("Failed to save checkpoint for source '{source_name}': {reason}")]
    SaveCheckpoint { source_name: String, reason: String },

    #[error("Failed to load checkpoint for source '{source_name}': {reason}")]
    LoadCheckpoint { source_name: String, reason: String },

    #[error("State store error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Checkpoint encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}
