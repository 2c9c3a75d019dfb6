use model::core::data_type::DataType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub ordinal: usize,
    pub name: String,
    pub data_type: DataType,
    /// Type name as reported by the catalog (`int4`, `varchar`, ...).
    pub type_name: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            ordinal: 0,
            name: name.into(),
            type_name: data_type.to_string().to_lowercase(),
            data_type,
            is_nullable: true,
            is_primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }
}
