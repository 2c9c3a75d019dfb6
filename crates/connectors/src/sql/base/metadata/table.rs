use crate::sql::base::metadata::column::ColumnMetadata;
use model::core::identifiers::TableId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub id: TableId,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnMetadata>,
    /// Primary key columns in key order. Empty when the table has no key.
    pub primary_keys: Vec<String>,
}

impl TableMetadata {
    pub fn new(id: TableId, columns: Vec<ColumnMetadata>, primary_keys: Vec<String>) -> Self {
        let mut columns = columns;
        for (ordinal, column) in columns.iter_mut().enumerate() {
            column.ordinal = ordinal + 1;
            column.is_primary_key = primary_keys.iter().any(|pk| pk == &column.name);
        }

        Self {
            id,
            columns,
            primary_keys,
        }
    }

    /// Case-insensitive lookup, as catalogs fold unquoted identifiers.
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::data_type::DataType;

    #[test]
    fn assigns_ordinals_and_key_flags() {
        let meta = TableMetadata::new(
            TableId::new("TEST", "CRICKET_STARS"),
            vec![
                ColumnMetadata::new("p_id", DataType::Int).not_null(),
                ColumnMetadata::new("first_name", DataType::String),
            ],
            vec!["p_id".into()],
        );

        assert_eq!(meta.columns[1].ordinal, 2);
        assert!(meta.columns[0].is_primary_key);
        assert!(!meta.columns[1].is_primary_key);
        assert_eq!(meta.column("P_ID").map(|c| c.name.as_str()), Some("p_id"));
        assert!(meta.column("missing").is_none());
    }
}
