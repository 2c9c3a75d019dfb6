use crate::core::data_type::DataType;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt, hash::Hash};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Boolean(bool),
    Json(serde_json::Value),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    TimestampNaive(NaiveDateTime),
    List(Vec<Value>),
    ListMap(Vec<(String, Value)>),
    Map(BTreeMap<String, Value>),
    Null,
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use Value::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Int(v) => v.hash(state),
            Uint(v) => v.hash(state),
            // Hash the bits of the float to handle NaN and -0.0 consistently
            Float(v) => v.to_bits().hash(state),
            Decimal(v) => v.normalized().to_string().hash(state),
            String(v) => v.hash(state),
            Boolean(v) => v.hash(state),
            Json(v) => v.to_string().hash(state),
            Uuid(v) => v.hash(state),
            Bytes(v) => v.hash(state),
            Date(v) => v.hash(state),
            Timestamp(v) => v.hash(state),
            TimestampNaive(v) => v.hash(state),
            List(items) => items.hash(state),
            ListMap(entries) => entries.hash(state),
            Map(entries) => entries.hash(state),
            Null => {}
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Total order between two values of compatible types. Numeric variants
    /// compare across each other; anything else only compares within its own
    /// variant. Nested values and nulls are never comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Uint(a), Uint(b)) => Some(a.cmp(b)),
            (Int(a), Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Uint(a), Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Decimal(a), Decimal(b)) => Some(a.cmp(b)),
            (Decimal(a), Int(b)) => Some(a.cmp(&BigDecimal::from(*b))),
            (Int(a), Decimal(b)) => Some(BigDecimal::from(*a).cmp(b)),
            (Decimal(a), Float(b)) => a.to_f64().and_then(|a| a.partial_cmp(b)),
            (Float(a), Decimal(b)) => b.to_f64().and_then(|b| a.partial_cmp(&b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (TimestampNaive(a), TimestampNaive(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Whether the value can take part in a keyset comparison at all.
    pub fn is_orderable(&self) -> bool {
        match self {
            Value::Float(v) => !v.is_nan(),
            Value::Json(_) | Value::List(_) | Value::ListMap(_) | Value::Map(_) | Value::Null => {
                false
            }
            _ => true,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Value::Int(_) => std::mem::size_of::<i64>(),
            Value::Uint(_) => std::mem::size_of::<u64>(),
            Value::Float(_) => std::mem::size_of::<f64>(),
            Value::Decimal(v) => v.to_string().len(),
            Value::String(s) => s.len(),
            Value::Boolean(_) => std::mem::size_of::<bool>(),
            Value::Json(v) => v.to_string().len(),
            Value::Uuid(_) => 16,
            Value::Bytes(b) => b.len(),
            Value::Date(_) => std::mem::size_of::<NaiveDate>(),
            Value::Timestamp(_) => std::mem::size_of::<DateTime<Utc>>(),
            Value::TimestampNaive(_) => std::mem::size_of::<NaiveDateTime>(),
            Value::List(items) => items.iter().map(Value::size_bytes).sum(),
            Value::ListMap(entries) => entries.iter().map(|(k, v)| k.len() + v.size_bytes()).sum(),
            Value::Map(entries) => entries.iter().map(|(k, v)| k.len() + v.size_bytes()).sum(),
            Value::Null => 0,
        }
    }

    /// Plain JSON rendering used for record output. Ordered maps keep their
    /// order only when the writer preserves it, so they are emitted as objects
    /// built in field order.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Int(v) => Json::from(*v),
            Value::Uint(v) => Json::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::Decimal(v) => Json::String(v.to_string()),
            Value::String(v) => Json::String(v.clone()),
            Value::Boolean(v) => Json::Bool(*v),
            Value::Json(v) => v.clone(),
            Value::Uuid(v) => Json::String(v.to_string()),
            Value::Bytes(v) => Json::Array(v.iter().map(|b| Json::from(*b)).collect()),
            Value::Date(v) => Json::String(v.to_string()),
            Value::Timestamp(v) => Json::String(v.to_rfc3339()),
            Value::TimestampNaive(v) => Json::String(v.to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::ListMap(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Null => Json::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Option<Value>,
    pub data_type: DataType,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: Option<Value>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            value,
            data_type,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Json(v) => write!(f, "{v}"),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Bytes(v) => {
                f.write_str("\\x")?;
                v.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
            }
            Value::Date(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::TimestampNaive(v) => write!(f, "{v}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::ListMap(entries) => write_entries(f, entries.iter().map(|(k, v)| (k, v))),
            Value::Map(entries) => write_entries(f, entries.iter()),
            Value::Null => f.write_str("NULL"),
        }
    }
}

fn write_entries<'a>(
    f: &mut fmt::Formatter<'_>,
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
) -> fmt::Result {
    f.write_str("{")?;
    for (i, (k, v)) in entries.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{k}: {v}")?;
    }
    f.write_str("}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn compares_numeric_variants_across_each_other() {
        assert_eq!(Value::Int(3).compare(&Value::Uint(4)), Some(Ordering::Less));
        assert_eq!(
            Value::Decimal(BigDecimal::from_str("2.50").unwrap()).compare(&Value::Int(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Float(1.5).compare(&Value::Int(1)), Some(Ordering::Greater));
    }

    #[test]
    fn nulls_and_nested_values_are_incomparable() {
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Int(1).compare(&Value::String("1".into())), None);
        assert!(!Value::List(vec![]).is_orderable());
        assert!(!Value::Float(f64::NAN).is_orderable());
        assert!(Value::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()).is_orderable());
    }

    #[test]
    fn serde_keeps_every_variant_lossless() {
        let values = vec![
            Value::Float(0.1 + 0.2),
            Value::Decimal(BigDecimal::from_str("12345678901234567890.000001").unwrap()),
            Value::Timestamp(
                DateTime::parse_from_rfc3339("2024-05-01T10:11:12.123456Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            Value::ListMap(vec![
                ("b".into(), Value::Int(1)),
                ("a".into(), Value::Null),
            ]),
        ];

        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn json_rendering_keeps_list_map_fields() {
        let value = Value::ListMap(vec![
            ("p_id".into(), Value::Int(1)),
            ("first_name".into(), Value::String("Sachin".into())),
        ]);
        let json = value.to_json();
        assert_eq!(json["p_id"], 1);
        assert_eq!(json["first_name"], "Sachin");
        assert_eq!(value.to_string(), "{p_id: 1, first_name: Sachin}");
    }
}
