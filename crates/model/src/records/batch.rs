use crate::{
    core::identifiers::{BatchId, TableId},
    records::{error_record::ErrorRecord, record::Record},
};
use serde::Serialize;

/// Output of one produce call, ready to be handed to a sink together with
/// the offset token that becomes durable once the sink accepts it.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: BatchId,
    pub table: Option<TableId>,
    pub records: Vec<Record>,
    pub error_records: Vec<ErrorRecord>,
    pub offset: String,
    pub manifest: Manifest,
    pub ts: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub record_count: usize,
    pub error_count: usize,
    pub size_bytes: usize,
}

pub fn manifest_for(records: &[Record], error_records: &[ErrorRecord]) -> Manifest {
    Manifest {
        record_count: records.len(),
        error_count: error_records.len(),
        size_bytes: records.iter().map(Record::size_bytes).sum(),
    }
}

impl Batch {
    pub fn new(
        id: BatchId,
        table: Option<TableId>,
        records: Vec<Record>,
        error_records: Vec<ErrorRecord>,
        offset: String,
    ) -> Self {
        let manifest = manifest_for(&records, &error_records);
        Self {
            id,
            table,
            records,
            error_records,
            offset,
            manifest,
            ts: chrono::Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.error_records.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.manifest.size_bytes
    }
}
