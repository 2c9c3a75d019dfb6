use crate::error::SourceError;
use connectors::sql::base::error::DbError;
use engine_core::retry::RetryDisposition;
use tokio_postgres::{Error as PgError, error::SqlState};

pub fn classify_source_error(err: &SourceError) -> RetryDisposition {
    err.db_disposition().unwrap_or(RetryDisposition::Stop)
}

pub fn classify_db_error(err: &DbError) -> RetryDisposition {
    match err {
        DbError::Io(_) => RetryDisposition::Retry,
        DbError::PgError(pg_err) => classify_pg_error(pg_err),
        DbError::Connection(_) => RetryDisposition::Retry,
        DbError::Timeout(_) => RetryDisposition::Retry,
        DbError::Query(_) => RetryDisposition::Stop,
        DbError::PermissionDenied(_) => RetryDisposition::Stop,
        DbError::Decode(_) => RetryDisposition::Stop,
        DbError::QueryBuildError(_) => RetryDisposition::Stop,
        DbError::CursorClosed(_) => RetryDisposition::Stop,
        DbError::Unknown(_) => RetryDisposition::Stop,
    }
}

pub fn classify_pg_error(err: &PgError) -> RetryDisposition {
    if err.is_closed() {
        return RetryDisposition::Retry;
    }

    if let Some(code) = err.code()
        && is_retryable_pg_code(code)
    {
        return RetryDisposition::Retry;
    }

    RetryDisposition::Stop
}

fn is_retryable_pg_code(code: &SqlState) -> bool {
    matches!(
        *code,
        SqlState::T_R_SERIALIZATION_FAILURE
            | SqlState::T_R_DEADLOCK_DETECTED
            | SqlState::LOCK_NOT_AVAILABLE
            | SqlState::TOO_MANY_CONNECTIONS
            | SqlState::ADMIN_SHUTDOWN
            | SqlState::CRASH_SHUTDOWN
            | SqlState::CANNOT_CONNECT_NOW
            | SqlState::CONNECTION_FAILURE
            | SqlState::CONNECTION_DOES_NOT_EXIST
            | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
            | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
            | SqlState::CONNECTION_EXCEPTION
            | SqlState::QUERY_CANCELED
            | SqlState::OPERATOR_INTERVENTION
            | SqlState::FDW_UNABLE_TO_ESTABLISH_CONNECTION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::offset::OffsetError;
    use model::core::identifiers::TableId;

    #[test]
    fn transient_database_errors_are_retried() {
        assert_eq!(
            classify_db_error(&DbError::Connection("reset".into())),
            RetryDisposition::Retry
        );
        assert_eq!(
            classify_db_error(&DbError::Timeout("statement timeout".into())),
            RetryDisposition::Retry
        );
        assert_eq!(
            classify_db_error(&DbError::PermissionDenied("TEST".into())),
            RetryDisposition::Stop
        );
        assert_eq!(
            classify_db_error(&DbError::QueryBuildError("out of range".into())),
            RetryDisposition::Stop
        );
    }

    #[test]
    fn source_errors_follow_the_database_error() {
        let read = SourceError::Read {
            table: TableId::new("TEST", "T"),
            source: DbError::Connection("reset".into()),
        };
        assert!(read.is_retryable());

        let offset = SourceError::Offset(OffsetError::Malformed("x".into()));
        assert!(!offset.is_retryable());

        let config = SourceError::InvalidConfig(Vec::new());
        assert_eq!(classify_source_error(&config), RetryDisposition::Stop);
    }
}
