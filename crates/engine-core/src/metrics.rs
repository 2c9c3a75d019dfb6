use serde::Serialize;
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    table_count: AtomicU64,
    current_table: RwLock<Option<String>>,
    records_produced: AtomicU64,
    error_records: AtomicU64,
    batches_produced: AtomicU64,
    failure_count: AtomicU64,
}

/// Live view of a table source. Clones share the same counters, so a handle
/// can be read from any thread while the source is producing.
#[derive(Debug, Clone, Default)]
pub struct SourceMetrics {
    inner: Arc<InnerMetrics>,
}

/// Which tables the source knows about and which one it read last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableGauge {
    pub table_count: usize,
    pub current_table: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub gauge: TableGauge,
    pub records_produced: u64,
    pub error_records: u64,
    pub batches_produced: u64,
    pub failure_count: u64,
}

impl SourceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table_count(&self, count: usize) {
        self.inner
            .table_count
            .store(count as u64, Ordering::Relaxed);
    }

    pub fn set_current_table(&self, table: impl Into<String>) {
        let mut current = self
            .inner
            .current_table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(table.into());
    }

    pub fn increment_records(&self, count: u64) {
        self.inner
            .records_produced
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_error_records(&self, count: u64) {
        self.inner.error_records.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner
            .batches_produced
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn gauge(&self) -> TableGauge {
        let current_table = self
            .inner
            .current_table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        TableGauge {
            table_count: self.inner.table_count.load(Ordering::Relaxed) as usize,
            current_table,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            gauge: self.gauge(),
            records_produced: self.inner.records_produced.load(Ordering::Relaxed),
            error_records: self.inner.error_records.load(Ordering::Relaxed),
            batches_produced: self.inner.batches_produced.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}
