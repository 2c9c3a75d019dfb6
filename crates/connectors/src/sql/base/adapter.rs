use crate::sql::base::{
    error::DbError, metadata::table::TableMetadata, requests::FetchRowsRequest,
};
use async_trait::async_trait;
use model::{core::identifiers::TableId, records::row::RowData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseKind {
    Postgres,
    Memory,
    Other(String),
}

#[async_trait]
pub trait SqlAdapter: Send + Sync {
    fn kind(&self) -> DatabaseKind;

    async fn ping(&self) -> Result<(), DbError>;

    // Introspection

    /// Names of the tables in `schema` matching the `LIKE` pattern, ascending.
    async fn list_tables(&self, schema: &str, pattern: &str) -> Result<Vec<String>, DbError>;
    async fn table_metadata(&self, table: &TableId) -> Result<TableMetadata, DbError>;

    // Reads

    /// Opens a forward-only cursor over the rows selected by `request`.
    /// The caller owns the cursor and must close it.
    async fn open_cursor(&self, request: FetchRowsRequest)
    -> Result<Box<dyn RowCursor>, DbError>;
}

/// Forward-only row cursor held open on the database side.
#[async_trait]
pub trait RowCursor: Send + Sync {
    /// Returns up to `max_rows` rows. Fewer rows than requested means the
    /// cursor has nothing left.
    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<RowData>, DbError>;

    /// Releases the cursor. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), DbError>;
}
