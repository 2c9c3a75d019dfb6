use crate::retry::{classify_db_error, classify_source_error};
use connectors::sql::base::error::DbError;
use engine_config::report::issue::ConfigIssue;
use engine_core::{discovery::DiscoveryError, offset::OffsetError, retry::RetryDisposition};
use model::core::identifiers::TableId;
use thiserror::Error;

pub const CODE_OFFSET_VALUE_INVALID: &str = "OFFSET_VALUE_INVALID";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source configuration is invalid: {}", join_issues(.0))]
    InvalidConfig(Vec<ConfigIssue>),

    #[error("Source has been destroyed")]
    Destroyed,

    #[error(transparent)]
    Offset(#[from] OffsetError),

    /// The database failed while a table was read. No position moved.
    #[error("Failed to read table '{table}': {source}")]
    Read {
        table: TableId,
        #[source]
        source: DbError,
    },

    /// A row could not be placed in offset order and the record error
    /// policy says to stop.
    #[error("Invalid offset value in row {record} of table '{table}': {message}")]
    DataError {
        table: TableId,
        record: String,
        message: String,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl SourceError {
    /// Whether repeating the same produce call may succeed.
    pub fn is_retryable(&self) -> bool {
        classify_source_error(self) == RetryDisposition::Retry
    }

    pub fn db_disposition(&self) -> Option<RetryDisposition> {
        match self {
            SourceError::Read { source, .. } => Some(classify_db_error(source)),
            SourceError::Discovery(e) => Some(classify_db_error(e.db_error())),
            _ => None,
        }
    }
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
