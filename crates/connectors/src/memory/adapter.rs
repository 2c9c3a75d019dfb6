//! In-process implementation of the database contract. Tables live in
//! memory, cursors read a snapshot taken when they are opened, and failures
//! can be injected to exercise error paths.

use crate::{
    memory::cursor::MemoryCursor,
    sql::base::{
        adapter::{DatabaseKind, RowCursor, SqlAdapter},
        error::DbError,
        metadata::{column::ColumnMetadata, table::TableMetadata},
        pattern::like_matches,
        requests::FetchRowsRequest,
    },
};
use async_trait::async_trait;
use model::{
    core::{
        identifiers::TableId,
        value::{FieldValue, Value},
    },
    records::row::RowData,
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    },
};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// Table listing and metadata lookups.
    Catalog,
    Open,
    Fetch,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    metadata: TableMetadata,
    rows: Vec<Vec<Value>>,
}

#[derive(Default)]
pub(crate) struct Shared {
    tables: RwLock<BTreeMap<TableId, MemoryTable>>,
    failures: Mutex<VecDeque<(FailurePoint, DbError)>>,
    pub(crate) open_cursors: AtomicUsize,
    cursors_opened: AtomicUsize,
}

impl Shared {
    pub(crate) async fn take_failure(&self, point: FailurePoint) -> Option<DbError> {
        let mut failures = self.failures.lock().await;
        let idx = failures.iter().position(|(p, _)| *p == point)?;
        failures.remove(idx).map(|(_, err)| err)
    }
}

#[derive(Clone, Default)]
pub struct MemoryAdapter {
    shared: Arc<Shared>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_table(
        &self,
        table: TableId,
        columns: Vec<ColumnMetadata>,
        primary_keys: &[&str],
    ) -> Result<(), DbError> {
        let mut tables = self.shared.tables.write().await;
        if tables.contains_key(&table) {
            return Err(DbError::Query(format!("relation {table} already exists")));
        }

        for pk in primary_keys {
            if !columns.iter().any(|c| c.name == *pk) {
                return Err(DbError::Query(format!(
                    "primary key column {pk} does not exist in {table}"
                )));
            }
        }

        let metadata = TableMetadata::new(
            table.clone(),
            columns,
            primary_keys.iter().map(|s| s.to_string()).collect(),
        );
        tables.insert(
            table,
            MemoryTable {
                metadata,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Appends a row, values in column order.
    pub async fn insert(&self, table: &TableId, values: Vec<Value>) -> Result<(), DbError> {
        let mut tables = self.shared.tables.write().await;
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| DbError::Query(format!("relation {table} does not exist")))?;

        if values.len() != entry.metadata.columns.len() {
            return Err(DbError::Query(format!(
                "{table} has {} columns, got {} values",
                entry.metadata.columns.len(),
                values.len()
            )));
        }

        entry.rows.push(values);
        Ok(())
    }

    /// The next operation at `point` fails with `error`.
    pub async fn fail_next(&self, point: FailurePoint, error: DbError) {
        self.shared.failures.lock().await.push_back((point, error));
    }

    /// Cursors opened and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.shared.open_cursors.load(AtomicOrdering::SeqCst)
    }

    /// Cursors opened since the adapter was created.
    pub fn cursors_opened(&self) -> usize {
        self.shared.cursors_opened.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl SqlAdapter for MemoryAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Memory
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn list_tables(&self, schema: &str, pattern: &str) -> Result<Vec<String>, DbError> {
        if let Some(err) = self.shared.take_failure(FailurePoint::Catalog).await {
            return Err(err);
        }

        let tables = self.shared.tables.read().await;
        // BTreeMap order is ascending by (schema, name).
        Ok(tables
            .keys()
            .filter(|id| id.schema() == schema && like_matches(pattern, id.name()))
            .map(|id| id.name().to_string())
            .collect())
    }

    async fn table_metadata(&self, table: &TableId) -> Result<TableMetadata, DbError> {
        if let Some(err) = self.shared.take_failure(FailurePoint::Catalog).await {
            return Err(err);
        }

        let tables = self.shared.tables.read().await;
        tables
            .get(table)
            .map(|t| t.metadata.clone())
            .ok_or_else(|| DbError::Query(format!("relation {table} does not exist")))
    }

    async fn open_cursor(
        &self,
        request: FetchRowsRequest,
    ) -> Result<Box<dyn RowCursor>, DbError> {
        if let Some(err) = self.shared.take_failure(FailurePoint::Open).await {
            return Err(err);
        }

        let rows = {
            let tables = self.shared.tables.read().await;
            let table = tables.get(&request.table).ok_or_else(|| {
                DbError::Query(format!("relation {} does not exist", request.table))
            })?;
            select(table, &request)?
        };

        self.shared.open_cursors.fetch_add(1, AtomicOrdering::SeqCst);
        let seq = self.shared.cursors_opened.fetch_add(1, AtomicOrdering::SeqCst);
        debug!(table = %request.table, rows = rows.len(), cursor = seq, "Opened memory cursor");

        Ok(Box::new(MemoryCursor::new(
            Arc::clone(&self.shared),
            format!("memory_c{seq}"),
            rows,
        )))
    }
}

/// Evaluates the keyset query against a table snapshot.
fn select(table: &MemoryTable, request: &FetchRowsRequest) -> Result<VecDeque<RowData>, DbError> {
    let meta = &table.metadata;
    let index_of = |name: &str| {
        meta.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| DbError::Query(format!("column {name} does not exist in {}", meta.id)))
    };

    let key_idx = request
        .offset_columns
        .iter()
        .map(|c| index_of(&c.name))
        .collect::<Result<Vec<_>, _>>()?;
    let projection = if request.columns.is_empty() {
        (0..meta.columns.len()).collect::<Vec<_>>()
    } else {
        request
            .columns
            .iter()
            .map(|c| index_of(c))
            .collect::<Result<Vec<_>, _>>()?
    };

    let key_of = |row: &Vec<Value>| key_idx.iter().map(|&i| row[i].clone()).collect::<Vec<_>>();

    let mut matching: Vec<&Vec<Value>> = table
        .rows
        .iter()
        .filter(|row| request.position.admits(&key_of(row)))
        .collect();

    matching.sort_by(|a, b| {
        key_idx
            .iter()
            .map(|&i| nulls_last(&a[i], &b[i]))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    let limit = request.limit.unwrap_or(usize::MAX);
    Ok(matching
        .into_iter()
        .take(limit)
        .map(|row| {
            let fields = projection
                .iter()
                .map(|&i| {
                    let column = &meta.columns[i];
                    let value = match &row[i] {
                        Value::Null => None,
                        v => Some(v.clone()),
                    };
                    FieldValue::new(column.name.clone(), value, column.data_type.clone())
                })
                .collect();
            RowData::new(meta.id.name(), fields)
        })
        .collect())
}

fn nulls_last(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}
