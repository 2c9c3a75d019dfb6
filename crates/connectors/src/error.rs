use crate::sql::base::error::{ConnectorError, DbError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// An unsupported data format was requested.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Failed to initialize a data connector/adapter.
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Database-related error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Missing required property error.
    #[error("Missing required property: {0}")]
    MissingProperty(String),
}
