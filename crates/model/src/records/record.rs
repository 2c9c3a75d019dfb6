use crate::{
    core::{identifiers::TableId, value::Value},
    records::row::RowData,
};
use serde::{Serialize, Serializer, ser::SerializeMap};

/// Where a record came from: the table and the offset tuple that identifies
/// the row, rendered as `<schema>.<table>::<col>=<val>,...`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordHeader {
    pub table: TableId,
    pub source_id: String,
}

impl RecordHeader {
    pub fn new(table: TableId, offset: &[(String, Value)]) -> Self {
        let tuple = offset
            .iter()
            .map(|(column, value)| format!("{column}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            source_id: format!("{table}::{tuple}"),
            table,
        }
    }
}

/// An emitted row: ordered field name to value mapping plus its header.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub header: RecordHeader,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn from_row(header: RecordHeader, row: RowData) -> Self {
        let fields = row
            .field_values
            .into_iter()
            .map(|f| (f.name, f.value.unwrap_or(Value::Null)))
            .collect();
        Self { header, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn size_bytes(&self) -> usize {
        self.fields
            .iter()
            .map(|(name, value)| name.len() + value.size_bytes())
            .sum()
    }
}

struct OrderedFields<'a>(&'a [(String, Value)]);

impl Serialize for OrderedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, &value.to_json())?;
        }
        map.end()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("header", &self.header)?;
        map.serialize_entry("fields", &OrderedFields(&self.fields))?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{data_type::DataType, value::FieldValue};

    fn sample() -> Record {
        let row = RowData::new(
            "CRICKET_STARS",
            vec![
                FieldValue::new("p_id", Some(Value::Int(1)), DataType::Int),
                FieldValue::new("first_name", Some(Value::String("Sachin".into())), DataType::String),
                FieldValue::new("last_name", None, DataType::String),
            ],
        );
        let header = RecordHeader::new(
            TableId::new("TEST", "CRICKET_STARS"),
            &[("p_id".to_string(), Value::Int(1))],
        );
        Record::from_row(header, row)
    }

    #[test]
    fn builds_source_id_from_offset_tuple() {
        let record = sample();
        assert_eq!(record.header.source_id, "TEST.CRICKET_STARS::p_id=1");
        assert_eq!(record.field_names(), vec!["p_id", "first_name", "last_name"]);
        assert_eq!(record.get("LAST_NAME"), Some(&Value::Null));
    }

    #[test]
    fn serializes_fields_in_column_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        let fields_at = json.find("\"fields\"").unwrap();
        let p_id = json[fields_at..].find("p_id").unwrap();
        let first = json[fields_at..].find("first_name").unwrap();
        let last = json[fields_at..].find("last_name").unwrap();
        assert!(p_id < first && first < last);
        assert!(json.contains("\"table\":\"TEST.CRICKET_STARS\""));
    }
}
