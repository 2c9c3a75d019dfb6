use crate::{
    error::AdapterError,
    memory::adapter::MemoryAdapter,
    sql::{base::adapter::SqlAdapter, postgres::adapter::PgAdapter},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Postgres,
    Memory,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Postgres => f.write_str("postgres"),
            DataFormat::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for DataFormat {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DataFormat::Postgres),
            "memory" => Ok(DataFormat::Memory),
            other => Err(AdapterError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Clone)]
pub enum Adapter {
    Postgres(PgAdapter),
    Memory(MemoryAdapter),
}

impl Adapter {
    pub async fn connect(format: DataFormat, conn_str: &str) -> Result<Self, AdapterError> {
        match format {
            DataFormat::Postgres => {
                if conn_str.trim().is_empty() {
                    return Err(AdapterError::MissingProperty("connection.url".into()));
                }
                let adapter = PgAdapter::connect(conn_str).await?;
                Ok(Adapter::Postgres(adapter))
            }
            DataFormat::Memory => Ok(Adapter::Memory(MemoryAdapter::new())),
        }
    }

    pub fn sql(&self) -> Arc<dyn SqlAdapter> {
        match self {
            Adapter::Postgres(adapter) => Arc::new(adapter.clone()),
            Adapter::Memory(adapter) => Arc::new(adapter.clone()),
        }
    }

    pub fn format(&self) -> DataFormat {
        match self {
            Adapter::Postgres(_) => DataFormat::Postgres,
            Adapter::Memory(_) => DataFormat::Memory,
        }
    }
}
