#![allow(dead_code)]

use crate::pg_client;
use connectors::{
    adapter::DataFormat, memory::adapter::MemoryAdapter,
    sql::base::metadata::column::ColumnMetadata,
};
use engine_config::settings::{BatchTableStrategy, OnRecordError, SourceSettings, TableConfig};
use engine_processing::source::TableSource;
use model::{
    core::{data_type::DataType, identifiers::TableId, value::Value},
    records::record::Record,
};

pub const SCHEMA: &str = "TEST";
pub const CRICKET: &str = "CRICKET_STARS";
pub const TENNIS: &str = "TENNIS_STARS";
pub const TRANSACTIONS: &str = "TRANSACTION_TABLE";
pub const STREAMING: &str = "STREAMING_TABLE";
pub const READINGS: &str = "READINGS";
pub const PAIRS: &str = "PAIRS";

pub const CRICKET_ROWS: i64 = 10;
pub const TENNIS_ROWS: i64 = 15;
pub const TRANSACTION_ROWS: i64 = 20;

/// DDL for the player tables in Postgres. `{table}` is replaced by the name.
pub const STARS_TABLE_DDL: &str = r#"
    CREATE TABLE "TEST"."{table}" (
        p_id INT PRIMARY KEY,
        first_name VARCHAR(45) NOT NULL,
        last_name VARCHAR(45) NOT NULL
    );
"#;

/// No primary key: the offset column has to be configured.
pub const TRANSACTION_TABLE_DDL: &str = r#"
    CREATE TABLE "TEST"."TRANSACTION_TABLE" (
        unique_int INT NOT NULL,
        t_date BIGINT NOT NULL,
        random_string VARCHAR(32)
    );
"#;

pub fn table(name: &str) -> TableId {
    TableId::new(SCHEMA, name)
}

/// CRICKET_STARS (10 rows), TENNIS_STARS (15 rows) and TRANSACTION_TABLE
/// (20 rows, no primary key).
pub async fn sports_adapter() -> MemoryAdapter {
    let adapter = MemoryAdapter::new();
    stars_table(&adapter, CRICKET, CRICKET_ROWS).await;
    stars_table(&adapter, TENNIS, TENNIS_ROWS).await;
    transaction_table(&adapter).await;
    adapter
}

async fn stars_table(adapter: &MemoryAdapter, name: &str, rows: i64) {
    adapter
        .create_table(
            table(name),
            vec![
                ColumnMetadata::new("p_id", DataType::Int).not_null(),
                ColumnMetadata::new("first_name", DataType::String),
                ColumnMetadata::new("last_name", DataType::String),
            ],
            &["p_id"],
        )
        .await
        .expect("create stars table");

    for p_id in 1..=rows {
        adapter
            .insert(
                &table(name),
                vec![
                    Value::Int(p_id),
                    Value::String(format!("first_{p_id}")),
                    Value::String(format!("last_{p_id}")),
                ],
            )
            .await
            .expect("insert star");
    }
}

/// `t_date` steps by 1000 so initial offsets can land between rows.
async fn transaction_table(adapter: &MemoryAdapter) {
    adapter
        .create_table(
            table(TRANSACTIONS),
            vec![
                ColumnMetadata::new("unique_int", DataType::Int).not_null(),
                ColumnMetadata::new("t_date", DataType::Long).not_null(),
                ColumnMetadata::new("random_string", DataType::String),
            ],
            &[],
        )
        .await
        .expect("create transaction table");

    for i in 1..=TRANSACTION_ROWS {
        adapter
            .insert(
                &table(TRANSACTIONS),
                vec![
                    Value::Int(i),
                    Value::Int(i * 1000),
                    Value::String(format!("tx-{i:03}")),
                ],
            )
            .await
            .expect("insert transaction");
    }
}

pub async fn streaming_table(adapter: &MemoryAdapter) {
    adapter
        .create_table(
            table(STREAMING),
            vec![
                ColumnMetadata::new("id", DataType::Long).not_null(),
                ColumnMetadata::new("payload", DataType::String),
            ],
            &["id"],
        )
        .await
        .expect("create streaming table");
}

/// Sensor readings ordered by a double precision column; the last one is
/// `Infinity`.
pub async fn readings_table(adapter: &MemoryAdapter, readings: &[f64]) {
    adapter
        .create_table(
            table(READINGS),
            vec![
                ColumnMetadata::new("reading", DataType::Double).not_null(),
                ColumnMetadata::new("sensor", DataType::String),
            ],
            &[],
        )
        .await
        .expect("create readings table");

    for (i, reading) in readings.iter().enumerate() {
        adapter
            .insert(
                &table(READINGS),
                vec![Value::Float(*reading), Value::String(format!("s-{i}"))],
            )
            .await
            .expect("insert reading");
    }
}

/// Two-column key `(a, b)` where `b` may be NULL.
pub async fn pairs_table(adapter: &MemoryAdapter, rows: &[(i64, Option<i64>)]) {
    adapter
        .create_table(
            table(PAIRS),
            vec![
                ColumnMetadata::new("a", DataType::Long).not_null(),
                ColumnMetadata::new("b", DataType::Long),
            ],
            &[],
        )
        .await
        .expect("create pairs table");

    for (a, b) in rows {
        adapter
            .insert(
                &table(PAIRS),
                vec![Value::Int(*a), b.map(Value::Int).unwrap_or(Value::Null)],
            )
            .await
            .expect("insert pair");
    }
}

pub fn pairs_settings(policy: OnRecordError) -> SourceSettings {
    SourceSettings::new("pairs", DataFormat::Memory, "")
        .with_table(
            TableConfig::builder(SCHEMA, PAIRS)
                .offset_columns(["a", "b"])
                .build(),
        )
        .with_on_record_error(policy)
}

/// Source over every `%_STARS` table.
pub fn stars_settings(strategy: BatchTableStrategy) -> SourceSettings {
    SourceSettings::new("sports", DataFormat::Memory, "")
        .with_table(TableConfig::builder(SCHEMA, "%_STARS").build())
        .with_strategy(strategy)
}

pub fn transaction_settings(offset_columns: &[&str]) -> SourceSettings {
    SourceSettings::new("transactions", DataFormat::Memory, "").with_table(
        TableConfig::builder(SCHEMA, TRANSACTIONS)
            .offset_columns(offset_columns.iter().copied())
            .build(),
    )
}

pub fn int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Int(v)) => *v,
        other => panic!("expected an integer, got {other:?}"),
    }
}

pub fn column(records: &[Record], name: &str) -> Vec<i64> {
    records.iter().map(|r| int(r.get(name))).collect()
}

/// What one produce call returned, reduced to the table and key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced {
    pub table: String,
    pub keys: Vec<i64>,
}

pub struct Drained {
    pub batches: Vec<Produced>,
    pub offset: String,
}

impl Drained {
    pub fn keys_of(&self, table_name: &str) -> Vec<i64> {
        let id = table(table_name).to_string();
        self.batches
            .iter()
            .filter(|b| b.table == id)
            .flat_map(|b| b.keys.iter().copied())
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.batches.iter().map(|b| b.keys.len()).sum()
    }
}

/// Produces until every table came back empty in a row, threading the
/// offset token through each call.
pub async fn drain(source: &mut TableSource, offset: &str, max: usize, key: &str) -> Drained {
    let idle_limit = source.table_ids().len().max(1) + 1;
    let mut idle = 0;
    let mut drained = Drained {
        batches: Vec::new(),
        offset: offset.to_string(),
    };

    for _ in 0..10_000 {
        let output = source
            .produce(&drained.offset, max)
            .await
            .expect("produce succeeds");
        drained.offset = output.offset;

        if output.records.is_empty() {
            idle += 1;
            if idle >= idle_limit {
                return drained;
            }
            continue;
        }

        idle = 0;
        drained.batches.push(Produced {
            table: output
                .table
                .map(|t| t.to_string())
                .unwrap_or_default(),
            keys: column(&output.records, key),
        });
    }
    panic!("source never ran dry");
}

/// Creates and fills the player tables in a real Postgres.
pub async fn seed_postgres_stars() {
    let client = pg_client().await;
    for (name, rows) in [(CRICKET, CRICKET_ROWS), (TENNIS, TENNIS_ROWS)] {
        client
            .batch_execute(&STARS_TABLE_DDL.replace("{table}", name))
            .await
            .expect("create stars table");
        for p_id in 1..=rows as i32 {
            client
                .execute(
                    &format!(
                        r#"INSERT INTO "TEST"."{name}" (p_id, first_name, last_name) VALUES ($1, $2, $3)"#
                    ),
                    &[&p_id, &format!("first_{p_id}"), &format!("last_{p_id}")],
                )
                .await
                .expect("insert star");
        }
    }
}
