use crate::sql::{
    base::{
        adapter::{DatabaseKind, RowCursor, SqlAdapter},
        error::{ConnectorError, DbError},
        metadata::{column::ColumnMetadata, table::TableMetadata},
        query::{dialect, generator::QueryGenerator},
        requests::FetchRowsRequest,
    },
    postgres::{cursor::PgCursor, params::PgParamStore, utils::connect_client},
};
use async_trait::async_trait;
use model::core::{data_type::DataType, identifiers::TableId};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::RwLock;
use tokio_postgres::Client;
use tracing::debug;

#[derive(Clone)]
pub struct PgAdapter {
    client: Arc<RwLock<Client>>,
    dialect: dialect::Postgres,
    cursor_seq: Arc<AtomicU64>,
}

const QUERY_LIST_TABLES_SQL: &str = include_str!("sql/list_tables.sql");
const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");
const QUERY_PRIMARY_KEYS_SQL: &str = include_str!("sql/primary_keys.sql");

impl PgAdapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let client = Arc::new(RwLock::new(connect_client(url).await?));
        Ok(PgAdapter {
            client,
            dialect: dialect::Postgres,
            cursor_seq: Arc::new(AtomicU64::new(0)),
        })
    }

    fn next_cursor_name(&self) -> String {
        let seq = self.cursor_seq.fetch_add(1, Ordering::Relaxed);
        format!("tableflow_c{seq}")
    }
}

#[async_trait]
impl SqlAdapter for PgAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }

    async fn ping(&self) -> Result<(), DbError> {
        let client = self.client.read().await;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn list_tables(&self, schema: &str, pattern: &str) -> Result<Vec<String>, DbError> {
        let client = self.client.read().await;
        let rows = client
            .query(QUERY_LIST_TABLES_SQL, &[&schema, &pattern])
            .await?;

        let tables = rows
            .iter()
            .map(|row| row.try_get::<_, String>("table_name"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    async fn table_metadata(&self, table: &TableId) -> Result<TableMetadata, DbError> {
        let client = self.client.read().await;
        let params: [&(dyn tokio_postgres::types::ToSql + Sync); 2] =
            [&table.schema(), &table.name()];

        let rows = client.query(QUERY_TABLE_COLUMNS_SQL, &params).await?;
        if rows.is_empty() {
            return Err(DbError::Query(format!("relation {table} does not exist")));
        }

        let columns = rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("column_name")?;
                let udt_name: String = row.try_get("udt_name")?;
                let nullable: String = row.try_get("is_nullable")?;

                let mut column = ColumnMetadata::new(name, DataType::from_postgres_type(&udt_name));
                column.type_name = udt_name;
                column.is_nullable = nullable.eq_ignore_ascii_case("YES");
                Ok(column)
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

        let primary_keys = client
            .query(QUERY_PRIMARY_KEYS_SQL, &params)
            .await?
            .iter()
            .map(|row| row.try_get::<_, String>("column_name"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableMetadata::new(table.clone(), columns, primary_keys))
    }

    async fn open_cursor(
        &self,
        request: FetchRowsRequest,
    ) -> Result<Box<dyn RowCursor>, DbError> {
        let generator = QueryGenerator::new(&self.dialect);
        let (select, values) = generator.select(&request)?;

        let name = self.next_cursor_name();
        let statement = format!(r#"DECLARE "{name}" NO SCROLL CURSOR WITH HOLD FOR {select}"#);
        debug!(cursor = %name, table = %request.table, sql = %statement, "Declaring cursor");

        let bindings = PgParamStore::from_values(values)?;
        {
            let client = self.client.read().await;
            client.execute(statement.as_str(), &bindings.as_refs()).await?;
        }

        Ok(Box::new(PgCursor::new(
            Arc::clone(&self.client),
            name,
            request.table,
        )))
    }
}
