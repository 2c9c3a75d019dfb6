use crate::{
    memory::adapter::{FailurePoint, Shared},
    sql::base::{adapter::RowCursor, error::DbError},
};
use async_trait::async_trait;
use model::records::row::RowData;
use std::{
    collections::VecDeque,
    sync::{Arc, atomic::Ordering},
};

pub struct MemoryCursor {
    shared: Arc<Shared>,
    name: String,
    rows: VecDeque<RowData>,
    closed: bool,
}

impl MemoryCursor {
    pub(crate) fn new(shared: Arc<Shared>, name: String, rows: VecDeque<RowData>) -> Self {
        Self {
            shared,
            name,
            rows,
            closed: false,
        }
    }
}

#[async_trait]
impl RowCursor for MemoryCursor {
    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<RowData>, DbError> {
        if self.closed {
            return Err(DbError::CursorClosed(self.name.clone()));
        }
        if let Some(err) = self.shared.take_failure(FailurePoint::Fetch).await {
            return Err(err);
        }

        let n = max_rows.min(self.rows.len());
        Ok(self.rows.drain(..n).collect())
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if !self.closed {
            self.closed = true;
            self.rows.clear();
            self.shared.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
