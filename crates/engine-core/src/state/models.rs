use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last offset token a sink has accepted for a source.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub source: String,
    pub offset: String,
    pub batch_id: String,
    /// Incremented once per committed batch. A save carrying a lower
    /// sequence than the stored one is ignored.
    pub sequence: u64,
    pub records_done: u64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        source: impl Into<String>,
        offset: impl Into<String>,
        batch_id: impl Into<String>,
        sequence: u64,
        records_done: u64,
    ) -> Self {
        Self {
            source: source.into(),
            offset: offset.into(),
            batch_id: batch_id.into(),
            sequence,
            records_done,
            updated_at: Utc::now(),
        }
    }
}
