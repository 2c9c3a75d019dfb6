//! Per-table state kept for the lifetime of one engine run.

use crate::discovery::DiscoveredTable;
use connectors::sql::base::{
    adapter::RowCursor, error::DbError, metadata::table::TableMetadata,
};
use model::{
    core::{identifiers::TableId, value::Value},
    pagination::position::{OffsetColumn, TablePosition},
    records::row::RowData,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLifecycle {
    /// Not read yet in this run.
    Fresh,
    Active,
    /// The last read found nothing beyond the current position.
    Exhausted,
}

/// An open database cursor plus the row read past the end of the previous
/// batch, which decides exhaustion without losing that row.
pub struct TableCursor {
    inner: Box<dyn RowCursor>,
    peeked: Option<RowData>,
    drained: bool,
    /// Skipped rows of the position this cursor was opened at that it has
    /// not come across yet.
    unseen_skips: Vec<Vec<Value>>,
}

impl TableCursor {
    pub fn new(inner: Box<dyn RowCursor>) -> Self {
        Self {
            inner,
            peeked: None,
            drained: false,
            unseen_skips: Vec::new(),
        }
    }

    pub fn with_skips(mut self, skipped: &[Vec<Value>]) -> Self {
        self.unseen_skips = skipped.to_vec();
        self
    }

    /// True when `tuple` belongs to a row skipped before this cursor was
    /// opened. Each skipped row is matched once.
    pub fn passes_skipped(&mut self, tuple: &[Value]) -> bool {
        match self.unseen_skips.iter().position(|t| t.as_slice() == tuple) {
            Some(idx) => {
                self.unseen_skips.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns up to `max_rows` rows and whether the cursor has nothing
    /// left after them. One extra row is fetched and held back to answer
    /// the second question.
    pub async fn next_batch(
        &mut self,
        max_rows: usize,
        fetch_size: usize,
    ) -> Result<(Vec<RowData>, bool), DbError> {
        let wanted = max_rows + 1;
        let mut rows: Vec<RowData> = self.peeked.take().into_iter().collect();

        while rows.len() < wanted && !self.drained {
            let request = fetch_size.max(1).min(wanted - rows.len());
            let fetched = self.inner.fetch(request).await?;
            if fetched.len() < request {
                self.drained = true;
            }
            rows.extend(fetched);
        }

        if rows.len() > max_rows {
            self.peeked = rows.pop();
            Ok((rows, false))
        } else {
            Ok((rows, true))
        }
    }

    pub async fn close(&mut self) -> Result<(), DbError> {
        self.peeked = None;
        self.inner.close().await
    }
}

pub struct TableContext {
    pub id: TableId,
    pub metadata: TableMetadata,
    pub offset_columns: Vec<OffsetColumn>,
    initial_position: TablePosition,
    position: TablePosition,
    cursor: Option<TableCursor>,
    lifecycle: TableLifecycle,
}

impl TableContext {
    pub fn new(table: DiscoveredTable) -> Self {
        Self {
            id: table.id,
            metadata: table.metadata,
            offset_columns: table.offset_columns,
            position: table.initial_position.clone(),
            initial_position: table.initial_position,
            cursor: None,
            lifecycle: TableLifecycle::Fresh,
        }
    }

    pub fn position(&self) -> &TablePosition {
        &self.position
    }

    pub fn offset_column_names(&self) -> Vec<String> {
        self.offset_columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.metadata.column_names()
    }

    /// Aligns the in-memory position with the one the caller supplied, or
    /// with the configured start when the caller has nothing for this table.
    /// Returns `true` when the position moved; the open cursor, if any, no
    /// longer matches and must be closed.
    pub fn sync_position(&mut self, persisted: Option<&TablePosition>) -> bool {
        let target = persisted.unwrap_or(&self.initial_position);
        if *target == self.position {
            return false;
        }

        debug!(
            table = %self.id,
            from = %self.position,
            to = %target,
            "Resynchronising table position"
        );
        self.position = target.clone();
        true
    }

    pub fn advance(&mut self, tuple: Vec<Value>) {
        self.position.advance(tuple);
    }

    pub fn skip(&mut self, tuple: Vec<Value>) {
        self.position.skip(tuple);
    }

    pub fn has_cursor(&self) -> bool {
        self.cursor.is_some()
    }

    /// Hands the open cursor to a reader, which attaches it again if it
    /// stays open.
    pub fn take_cursor(&mut self) -> Option<TableCursor> {
        self.cursor.take()
    }

    pub fn attach_cursor(&mut self, cursor: TableCursor) {
        self.cursor = Some(cursor);
    }

    /// Releases the cursor if one is open. The context forgets the cursor
    /// even when closing fails.
    pub async fn close_cursor(&mut self) -> Result<(), DbError> {
        match self.cursor.take() {
            Some(mut cursor) => {
                debug!(table = %self.id, "Closing cursor");
                cursor.close().await
            }
            None => Ok(()),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.lifecycle == TableLifecycle::Exhausted
    }

    pub fn mark_read(&mut self, exhausted: bool) {
        self.lifecycle = if exhausted {
            TableLifecycle::Exhausted
        } else {
            TableLifecycle::Active
        };
    }

    /// Starts a new scheduling round for a table found exhausted earlier.
    pub fn reactivate(&mut self) {
        if self.lifecycle == TableLifecycle::Exhausted {
            self.lifecycle = TableLifecycle::Active;
        }
    }
}
