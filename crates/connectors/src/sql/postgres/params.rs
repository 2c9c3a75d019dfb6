use crate::sql::base::error::DbError;
use model::core::value::Value;
use rust_decimal::Decimal as RustDecimal;
use std::str::FromStr;
use tokio_postgres::types::{Json as PgJson, ToSql};

pub struct PgParam(Box<dyn ToSql + Sync + Send>);

impl PgParam {
    /// Binds `value` as-is. Values Postgres would compare against a
    /// different number than the one stored are refused.
    pub fn from_value(value: Value) -> Result<Self, DbError> {
        let param = match value {
            Value::Int(v) => PgParam(Box::new(v)),
            Value::Uint(v) => {
                let v = i64::try_from(v).map_err(|_| {
                    DbError::QueryBuildError(format!("unsigned value {v} does not fit in BIGINT"))
                })?;
                PgParam(Box::new(v))
            }
            Value::Float(v) => PgParam(Box::new(v)),
            Value::Decimal(v) => {
                let decimal = RustDecimal::from_str(&v.to_string()).map_err(|e| {
                    DbError::QueryBuildError(format!("decimal {v} cannot be bound: {e}"))
                })?;
                PgParam(Box::new(decimal))
            }
            Value::String(v) => PgParam(Box::new(v)),
            Value::Boolean(v) => PgParam(Box::new(v)),
            Value::Json(v) => PgParam(Box::new(PgJson(v))),
            Value::Uuid(v) => PgParam(Box::new(v)),
            Value::Bytes(v) => PgParam(Box::new(v)),
            Value::Date(v) => PgParam(Box::new(v)),
            Value::Timestamp(v) => PgParam(Box::new(v)),
            Value::TimestampNaive(v) => PgParam(Box::new(v)),
            nested @ (Value::List(_) | Value::ListMap(_) | Value::Map(_)) => {
                PgParam(Box::new(PgJson(nested.to_json())))
            }
            Value::Null => PgParam(Box::new(Option::<String>::None)),
        };
        Ok(param)
    }
}

impl AsRef<dyn ToSql + Sync> for PgParam {
    fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
        &*self.0
    }
}

pub struct PgParamStore {
    pub params: Vec<PgParam>,
}

impl PgParamStore {
    pub fn from_values(values: Vec<Value>) -> Result<Self, DbError> {
        Ok(Self {
            params: values
                .into_iter()
                .map(PgParam::from_value)
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|param| param.as_ref())
            .collect::<Vec<_>>()
    }
}
