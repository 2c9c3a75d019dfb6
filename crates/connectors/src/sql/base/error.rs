use thiserror::Error;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Low-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any error reported by the Postgres driver.
    #[error("Postgres error: {0}")]
    PgError(#[from] tokio_postgres::Error),

    /// The connection to the database was lost or could not be used.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The statement was rejected by the database.
    #[error("Query error: {0}")]
    Query(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// A column value could not be converted into a [`model::core::value::Value`].
    #[error("Decode error: {0}")]
    Decode(String),

    /// An error occurred while building a SQL query.
    #[error("Query build error: {0}")]
    QueryBuildError(String),

    /// The cursor was used after it had been closed.
    #[error("Cursor '{0}' is closed")]
    CursorClosed(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Errors happening during adapter or connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection url: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("TLS configuration failed: {0}")]
    TlsConfig(#[from] native_tls::Error),
}
