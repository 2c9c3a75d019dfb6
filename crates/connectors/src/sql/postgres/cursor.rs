use crate::sql::{
    base::{adapter::RowCursor, error::DbError},
    postgres::row::to_row_data,
};
use async_trait::async_trait;
use model::{core::identifiers::TableId, records::row::RowData};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::Client;
use tracing::{debug, warn};

/// Server-side cursor declared `WITH HOLD`, so it survives the implicit
/// transaction of the DECLARE statement. The database materializes the
/// remaining result when that transaction commits, so an unbounded query
/// costs server memory or temp space proportional to the table's backlog.
pub struct PgCursor {
    client: Arc<RwLock<Client>>,
    name: String,
    table: TableId,
    closed: bool,
}

impl PgCursor {
    pub(crate) fn new(client: Arc<RwLock<Client>>, name: String, table: TableId) -> Self {
        Self {
            client,
            name,
            table,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl RowCursor for PgCursor {
    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<RowData>, DbError> {
        if self.closed {
            return Err(DbError::CursorClosed(self.name.clone()));
        }

        let sql = format!(r#"FETCH FORWARD {max_rows} FROM "{}""#, self.name);
        let client = self.client.read().await;
        let rows = client.query(&sql, &[]).await?;

        rows.iter()
            .map(|row| to_row_data(row, self.table.name()))
            .collect()
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if self.closed {
            return Ok(());
        }
        // Marked closed first: a failed CLOSE leaves nothing usable behind.
        self.closed = true;

        let client = self.client.read().await;
        client
            .batch_execute(&format!(r#"CLOSE "{}""#, self.name))
            .await?;
        debug!(cursor = %self.name, table = %self.table, "Closed cursor");
        Ok(())
    }
}

impl Drop for PgCursor {
    fn drop(&mut self) {
        if !self.closed {
            warn!(cursor = %self.name, table = %self.table, "Cursor dropped without being closed");
        }
    }
}
