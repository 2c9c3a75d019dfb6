use crate::core::{data_type::DataType, value::Value};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};

/// A column used as part of a table's ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetColumn {
    pub name: String,
    pub data_type: DataType,
}

impl OffsetColumn {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Lower bound for one offset column. `None` means the column has no lower
/// bound yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPosition {
    pub column: String,
    pub value: Option<Value>,
}

/// Read position of a table: an ordered tuple of per-column lower bounds.
/// Rows strictly greater than the tuple (lexicographically) are still unread.
///
/// `skipped` holds the offset tuples of rows that could not be ordered and
/// were already handed to the record error policy. They stay listed while
/// the bounds still admit them, one entry per row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TablePosition {
    columns: Vec<ColumnPosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<Vec<Value>>,
}

impl TablePosition {
    pub fn from_parts(columns: Vec<ColumnPosition>) -> Self {
        Self {
            columns,
            skipped: Vec::new(),
        }
    }

    pub fn with_skipped(mut self, skipped: Vec<Vec<Value>>) -> Self {
        self.skipped = skipped;
        self
    }

    /// Position with no lower bound on any column.
    pub fn unbounded(columns: &[OffsetColumn]) -> Self {
        Self::start(columns, &BTreeMap::new())
    }

    /// Starting position built from configured initial values, keyed by
    /// column name. Columns without an initial value stay unbounded.
    pub fn start(columns: &[OffsetColumn], initial: &BTreeMap<String, Value>) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|c| ColumnPosition {
                    column: c.name.clone(),
                    value: initial.get(&c.name).cloned(),
                })
                .collect(),
            skipped: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[ColumnPosition] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }

    /// True once any column carries a bound or a row was skipped.
    pub fn has_state(&self) -> bool {
        self.columns.iter().any(|c| c.value.is_some()) || !self.skipped.is_empty()
    }

    pub fn skipped(&self) -> &[Vec<Value>] {
        &self.skipped
    }

    /// Remembers a row that was reported or dropped instead of emitted.
    pub fn skip(&mut self, tuple: Vec<Value>) {
        self.skipped.push(tuple);
    }

    pub fn values(&self) -> impl Iterator<Item = Option<&Value>> {
        self.columns.iter().map(|c| c.value.as_ref())
    }

    /// Moves the position to the offset tuple of the last emitted row.
    /// Skipped rows the new bounds no longer admit are forgotten.
    pub fn advance(&mut self, tuple: Vec<Value>) {
        for (column, value) in self.columns.iter_mut().zip(tuple) {
            column.value = Some(value);
        }

        let skipped = std::mem::take(&mut self.skipped);
        self.skipped = skipped.into_iter().filter(|t| self.admits(t)).collect();
    }

    /// Whether a row with the given offset tuple lies strictly after this
    /// position. Mirrors the keyset predicate the query generator emits.
    pub fn admits(&self, tuple: &[Value]) -> bool {
        for (bound, value) in self.columns.iter().zip(tuple) {
            let Some(bound) = bound.value.as_ref() else {
                return true;
            };
            match value.compare(bound) {
                Some(Ordering::Greater) => return true,
                Some(Ordering::Equal) => continue,
                Some(Ordering::Less) | None => return false,
            }
        }
        false
    }
}

impl fmt::Display for TablePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match &c.value {
                Some(v) => write!(f, "{}={}", c.column, v)?,
                None => write!(f, "{}=<unbounded>", c.column)?,
            }
        }
        if !self.skipped.is_empty() {
            write!(f, " (+{} skipped)", self.skipped.len())?;
        }
        Ok(())
    }
}
