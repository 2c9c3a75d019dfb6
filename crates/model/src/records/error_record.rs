use crate::records::record::Record;
use serde::Serialize;

/// A row that could not be emitted normally and was routed to the error
/// output instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub record: Record,
    pub code: String,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(record: Record, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            record,
            code: code.into(),
            message: message.into(),
        }
    }
}
