use crate::core::value::Value;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
    Json,
    Uuid,
    Bytes,
    Date,
    Timestamp,
    TimestampTz,
    Array(Option<String>),
    Custom(String),
}

/// Raised when a textual literal cannot be turned into a [`Value`] of the
/// requested type (for example an initial offset typed by a user).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot parse '{literal}' as {data_type}: {reason}")]
pub struct ParseValueError {
    pub literal: String,
    pub data_type: DataType,
    pub reason: String,
}

impl DataType {
    pub fn from_postgres_type(type_name: &str) -> Self {
        if let Some(element) = type_name.strip_prefix('_') {
            return DataType::Array(Some(element.to_string()));
        }

        match type_name.trim().to_lowercase().as_str() {
            "int2" | "smallint" | "smallserial" => DataType::Short,
            "int4" | "integer" | "int" | "serial" => DataType::Int,
            "int8" | "bigint" | "bigserial" => DataType::Long,
            "float4" | "real" => DataType::Float,
            "float8" | "double precision" => DataType::Double,
            "numeric" | "decimal" => DataType::Decimal,
            "bool" | "boolean" => DataType::Boolean,
            "text" | "varchar" | "character varying" | "bpchar" | "char" | "character"
            | "name" | "citext" => DataType::String,
            "json" | "jsonb" => DataType::Json,
            "uuid" => DataType::Uuid,
            "bytea" => DataType::Bytes,
            "date" => DataType::Date,
            "timestamp" | "timestamp without time zone" => DataType::Timestamp,
            "timestamptz" | "timestamp with time zone" => DataType::TimestampTz,
            "array" => DataType::Array(None),
            other => DataType::Custom(other.to_string()),
        }
    }

    /// Whether values of this type have a total order usable as an offset key.
    pub fn is_orderable(&self) -> bool {
        !matches!(
            self,
            DataType::Json | DataType::Array(_) | DataType::Custom(_) | DataType::Bytes
        )
    }

    pub fn parse_literal(&self, literal: &str) -> Result<Value, ParseValueError> {
        let trimmed = literal.trim();
        let fail = |reason: String| ParseValueError {
            literal: literal.to_string(),
            data_type: self.clone(),
            reason,
        };

        match self {
            DataType::Short | DataType::Int | DataType::Long => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| fail(e.to_string())),
            DataType::Float | DataType::Double => trimmed
                .parse::<f64>()
                .map_err(|e| fail(e.to_string()))
                .and_then(|f| {
                    if f.is_finite() {
                        Ok(Value::Float(f))
                    } else {
                        Err(fail("value is not finite".into()))
                    }
                }),
            DataType::Decimal => BigDecimal::from_str(trimmed)
                .map(Value::Decimal)
                .map_err(|e| fail(e.to_string())),
            DataType::Boolean => match trimmed.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(fail("expected true or false".into())),
            },
            DataType::String => Ok(Value::String(literal.to_string())),
            DataType::Uuid => Uuid::parse_str(trimmed)
                .map(Value::Uuid)
                .map_err(|e| fail(e.to_string())),
            DataType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| fail(e.to_string())),
            DataType::Timestamp => parse_naive_timestamp(trimmed)
                .map(Value::TimestampNaive)
                .ok_or_else(|| fail("expected YYYY-MM-DD HH:MM:SS[.fff]".into())),
            DataType::TimestampTz => DateTime::parse_from_rfc3339(trimmed)
                .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| fail(e.to_string())),
            DataType::Json | DataType::Bytes | DataType::Array(_) | DataType::Custom(_) => {
                Err(fail("type cannot be used as an offset".into()))
            }
        }
    }
}

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Short => f.write_str("SMALLINT"),
            DataType::Int => f.write_str("INTEGER"),
            DataType::Long => f.write_str("BIGINT"),
            DataType::Float => f.write_str("REAL"),
            DataType::Double => f.write_str("DOUBLE PRECISION"),
            DataType::Decimal => f.write_str("NUMERIC"),
            DataType::Boolean => f.write_str("BOOLEAN"),
            DataType::String => f.write_str("TEXT"),
            DataType::Json => f.write_str("JSONB"),
            DataType::Uuid => f.write_str("UUID"),
            DataType::Bytes => f.write_str("BYTEA"),
            DataType::Date => f.write_str("DATE"),
            DataType::Timestamp => f.write_str("TIMESTAMP"),
            DataType::TimestampTz => f.write_str("TIMESTAMPTZ"),
            DataType::Array(Some(name)) => write!(f, "{}[]", name.to_uppercase()),
            DataType::Array(None) => f.write_str("ARRAY"),
            DataType::Custom(name) => f.write_str(name),
        }
    }
}
