//! Encoding of the per-table read positions into the opaque offset token
//! handed back to the caller after every produce call.
//!
//! Layout (version 1):
//!
//! ```json
//! {"v":1,"tables":{"TEST.CRICKET_STARS":[{"c":"p_id","v":{"Int":5}}]}}
//! ```
//!
//! Column entries keep the offset-column order. A `null` value means the
//! column has no lower bound yet. Infinite floats are written as strings
//! (`{"Float":"inf"}`) since JSON numbers cannot hold them.

use model::{
    core::{identifiers::TableId, value::Value},
    pagination::position::{ColumnPosition, TablePosition},
};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer, de::Error as _, ser::SerializeMap,
};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const OFFSET_VERSION: u64 = 1;

pub const CODE_OFFSET_MALFORMED: &str = "OFFSET_MALFORMED";
pub const CODE_OFFSET_UNSUPPORTED_VERSION: &str = "OFFSET_UNSUPPORTED_VERSION";
pub const CODE_OFFSET_COLUMNS_CHANGED: &str = "OFFSET_COLUMNS_CHANGED";

#[derive(Debug, Error)]
pub enum OffsetError {
    #[error("Malformed offset: {0}")]
    Malformed(String),

    #[error("Unsupported offset version: {0}")]
    UnsupportedVersion(String),

    /// The persisted offset of a table was written for a different list of
    /// offset columns than the one configured now.
    #[error(
        "Offset columns of {table} changed ({}): persisted {persisted:?}, configured {configured:?}",
        describe_change(persisted, configured)
    )]
    ColumnsChanged {
        table: TableId,
        persisted: Vec<String>,
        configured: Vec<String>,
    },

    #[error("Failed to encode offset: {0}")]
    Encode(#[from] serde_json::Error),
}

impl OffsetError {
    pub fn code(&self) -> &'static str {
        match self {
            OffsetError::Malformed(_) | OffsetError::Encode(_) => CODE_OFFSET_MALFORMED,
            OffsetError::UnsupportedVersion(_) => CODE_OFFSET_UNSUPPORTED_VERSION,
            OffsetError::ColumnsChanged { .. } => CODE_OFFSET_COLUMNS_CHANGED,
        }
    }
}

/// Human readable summary of how two column lists differ.
fn describe_change(persisted: &[String], configured: &[String]) -> String {
    let added: Vec<&str> = configured
        .iter()
        .filter(|c| !persisted.contains(c))
        .map(String::as_str)
        .collect();
    let removed: Vec<&str> = persisted
        .iter()
        .filter(|c| !configured.contains(c))
        .map(String::as_str)
        .collect();

    let mut parts = Vec::new();
    if !added.is_empty() && !removed.is_empty() && added.len() == removed.len() {
        parts.push(format!("renamed {removed:?} to {added:?}"));
    } else {
        if !added.is_empty() {
            parts.push(format!("added {added:?}"));
        }
        if !removed.is_empty() {
            parts.push(format!("removed {removed:?}"));
        }
    }
    if parts.is_empty() {
        parts.push("reordered".to_string());
    }
    parts.join(", ")
}

#[derive(Serialize, Deserialize)]
struct OffsetDocument {
    v: u64,
    tables: BTreeMap<String, Vec<ColumnEntry>>,
    /// Rows already handed to the record error policy, per table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    skipped: BTreeMap<String, Vec<Vec<TokenValue>>>,
}

#[derive(Serialize, Deserialize)]
struct ColumnEntry {
    c: String,
    v: Option<TokenValue>,
}

/// A value as written in the token. Same shape as [`Value`] except for
/// infinite floats, which JSON numbers cannot hold.
struct TokenValue(Value);

const FLOAT: &str = "Float";

impl Serialize for TokenValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Value::Float(f) if !f.is_finite() => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(FLOAT, &f.to_string())?;
                map.end()
            }
            other => other.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TokenValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if let Some(serde_json::Value::String(text)) = raw.get(FLOAT) {
            return match text.parse::<f64>() {
                Ok(f) if f.is_infinite() => Ok(TokenValue(Value::Float(f))),
                _ => Err(D::Error::custom(format!("invalid float {text:?}"))),
            };
        }
        serde_json::from_value(raw)
            .map(TokenValue)
            .map_err(D::Error::custom)
    }
}

fn to_token(values: &[Value]) -> Vec<TokenValue> {
    values.iter().cloned().map(TokenValue).collect()
}

/// Positions keyed by table, ordered by qualified name.
pub type OffsetMap = BTreeMap<TableId, TablePosition>;

pub struct OffsetCodec;

impl OffsetCodec {
    /// Serialises every position that carries state. Tables still at their
    /// unbounded start are left out; they decode to the same start anyway.
    pub fn encode(positions: &OffsetMap) -> Result<String, OffsetError> {
        let mut tables = BTreeMap::new();
        let mut skipped = BTreeMap::new();

        for (table, position) in positions.iter().filter(|(_, p)| p.has_state()) {
            let entries = position
                .columns()
                .iter()
                .map(|c| ColumnEntry {
                    c: c.column.clone(),
                    v: c.value.clone().map(TokenValue),
                })
                .collect();
            tables.insert(table.to_string(), entries);

            if !position.skipped().is_empty() {
                let rows = position.skipped().iter().map(|t| to_token(t)).collect();
                skipped.insert(table.to_string(), rows);
            }
        }

        Ok(serde_json::to_string(&OffsetDocument {
            v: OFFSET_VERSION,
            tables,
            skipped,
        })?)
    }

    /// Parses a token. `configured` maps each discovered table to its offset
    /// column names; entries for those tables must list exactly the same
    /// columns in the same order. Entries for other tables are returned
    /// untouched.
    pub fn decode(
        token: &str,
        configured: &HashMap<TableId, Vec<String>>,
    ) -> Result<OffsetMap, OffsetError> {
        if token.trim().is_empty() {
            return Ok(OffsetMap::new());
        }

        let raw: serde_json::Value =
            serde_json::from_str(token).map_err(|e| OffsetError::Malformed(e.to_string()))?;
        match raw.get("v") {
            Some(v) if v.as_u64() == Some(OFFSET_VERSION) => {}
            Some(other) => return Err(OffsetError::UnsupportedVersion(other.to_string())),
            None => return Err(OffsetError::UnsupportedVersion("missing".to_string())),
        }

        let mut doc: OffsetDocument =
            serde_json::from_value(raw).map_err(|e| OffsetError::Malformed(e.to_string()))?;
        if let Some(orphan) = doc.skipped.keys().find(|k| !doc.tables.contains_key(*k)) {
            return Err(OffsetError::Malformed(format!(
                "skipped rows listed for {orphan} without a position"
            )));
        }

        let mut positions = OffsetMap::new();
        for (key, entries) in doc.tables {
            let table: TableId = key
                .parse()
                .map_err(|e| OffsetError::Malformed(format!("{e}")))?;

            if let Some(expected) = configured.get(&table) {
                let persisted: Vec<String> = entries.iter().map(|e| e.c.clone()).collect();
                if &persisted != expected {
                    return Err(OffsetError::ColumnsChanged {
                        table,
                        persisted,
                        configured: expected.clone(),
                    });
                }
            }

            let width = entries.len();
            let skipped: Vec<Vec<Value>> = doc
                .skipped
                .remove(&key)
                .unwrap_or_default()
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.0).collect())
                .collect();
            if skipped.iter().any(|row: &Vec<Value>| row.len() != width) {
                return Err(OffsetError::Malformed(format!(
                    "skipped row of {table} does not have {width} values"
                )));
            }

            let position = TablePosition::from_parts(
                entries
                    .into_iter()
                    .map(|e| ColumnPosition {
                        column: e.c,
                        value: e.v.map(|v| v.0),
                    })
                    .collect(),
            )
            .with_skipped(skipped);
            positions.insert(table, position);
        }

        Ok(positions)
    }
}
