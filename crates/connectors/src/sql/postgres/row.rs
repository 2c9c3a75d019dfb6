use crate::sql::base::error::DbError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use model::{
    core::{
        data_type::DataType,
        value::{FieldValue, Value},
    },
    records::row::RowData,
};
use rust_decimal::Decimal as RustDecimal;
use std::str::FromStr;
use tokio_postgres::{
    Row as PgRow,
    types::{FromSql, Json as PgJson},
};
use tracing::warn;
use uuid::Uuid;

pub(crate) fn to_row_data(row: &PgRow, entity: &str) -> Result<RowData, DbError> {
    let field_values = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let type_name = column.type_().name();
            let data_type = DataType::from_postgres_type(type_name);
            let value = get_value(row, idx, type_name)?;
            Ok(FieldValue::new(column.name(), value, data_type))
        })
        .collect::<Result<Vec<_>, DbError>>()?;

    Ok(RowData::new(entity, field_values))
}

fn get_value(row: &PgRow, idx: usize, type_name: &str) -> Result<Option<Value>, DbError> {
    let value = match type_name {
        "int2" => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
        "int4" => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
        "int8" => get::<i64>(row, idx)?.map(Value::Int),
        "oid" => get::<u32>(row, idx)?.map(|v| Value::Uint(v.into())),
        "float4" => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
        "float8" => get::<f64>(row, idx)?.map(Value::Float),
        "numeric" => match get::<RustDecimal>(row, idx)? {
            Some(v) => Some(Value::Decimal(
                BigDecimal::from_str(&v.to_string()).map_err(|e| DbError::Decode(e.to_string()))?,
            )),
            None => None,
        },
        "bool" => get::<bool>(row, idx)?.map(Value::Boolean),
        "text" | "varchar" | "bpchar" | "name" | "citext" | "char" => {
            get::<String>(row, idx)?.map(Value::String)
        }
        "json" | "jsonb" => get::<PgJson<serde_json::Value>>(row, idx)?.map(|j| Value::Json(j.0)),
        "uuid" => get::<Uuid>(row, idx)?.map(Value::Uuid),
        "bytea" => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        "date" => get::<NaiveDate>(row, idx)?.map(Value::Date),
        "timestamp" => get::<NaiveDateTime>(row, idx)?.map(Value::TimestampNaive),
        "timestamptz" => get::<DateTime<Utc>>(row, idx)?.map(Value::Timestamp),
        "_int2" => get::<Vec<Option<i16>>>(row, idx)?.map(|items| list(items, |v| Value::Int(v.into()))),
        "_int4" => get::<Vec<Option<i32>>>(row, idx)?.map(|items| list(items, |v| Value::Int(v.into()))),
        "_int8" => get::<Vec<Option<i64>>>(row, idx)?.map(|items| list(items, Value::Int)),
        "_text" | "_varchar" => {
            get::<Vec<Option<String>>>(row, idx)?.map(|items| list(items, Value::String))
        }
        "_bool" => get::<Vec<Option<bool>>>(row, idx)?.map(|items| list(items, Value::Boolean)),
        "_float8" => get::<Vec<Option<f64>>>(row, idx)?.map(|items| list(items, Value::Float)),
        other => match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(Value::String),
            Err(error) => {
                warn!(column_type = other, %error, "Unsupported Postgres column type, emitting null");
                None
            }
        },
    };

    Ok(value)
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Result<Option<T>, DbError> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| DbError::Decode(format!("column {idx}: {e}")))
}

fn list<T>(items: Vec<Option<T>>, wrap: impl Fn(T) -> Value) -> Value {
    Value::List(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, &wrap))
            .collect(),
    )
}
