use model::{
    core::identifiers::TableId,
    pagination::position::{OffsetColumn, TablePosition},
};

/// Keyset read of one table: rows strictly after `position`, ascending by
/// the offset columns, optionally bounded by `limit`.
#[derive(Debug, Clone)]
pub struct FetchRowsRequest {
    pub table: TableId,
    pub columns: Vec<String>,
    pub offset_columns: Vec<OffsetColumn>,
    pub position: TablePosition,
    pub limit: Option<usize>,
    pub fetch_size: usize,
}

pub struct FetchRowsRequestBuilder {
    table: TableId,
    columns: Vec<String>,
    offset_columns: Vec<OffsetColumn>,
    position: Option<TablePosition>,
    limit: Option<usize>,
    fetch_size: usize,
}

impl FetchRowsRequestBuilder {
    pub fn new(table: TableId) -> Self {
        FetchRowsRequestBuilder {
            table,
            columns: Vec::new(),
            offset_columns: Vec::new(),
            position: None,
            limit: None,
            fetch_size: 1000,
        }
    }

    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn offset_columns(mut self, offset_columns: Vec<OffsetColumn>) -> Self {
        self.offset_columns = offset_columns;
        self
    }

    pub fn position(mut self, position: TablePosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    pub fn build(self) -> FetchRowsRequest {
        let position = self
            .position
            .unwrap_or_else(|| TablePosition::unbounded(&self.offset_columns));

        FetchRowsRequest {
            table: self.table,
            columns: self.columns,
            offset_columns: self.offset_columns,
            position,
            limit: self.limit,
            fetch_size: self.fetch_size,
        }
    }
}
