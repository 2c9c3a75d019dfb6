//! Turns table configurations into the ordered list of tables a source
//! reads, resolving offset columns and initial offsets against the catalog.

use connectors::sql::base::{
    adapter::SqlAdapter, error::DbError, metadata::table::TableMetadata,
};
use engine_config::{report::issue::ConfigIssue, settings::TableConfig};
use model::{
    core::identifiers::TableId,
    pagination::position::{OffsetColumn, TablePosition},
};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The catalog could not be read at all. Unlike a bad configuration this
    /// can go away on its own.
    #[error("Failed to read catalog of schema '{schema}': {source}")]
    Catalog {
        schema: String,
        #[source]
        source: DbError,
    },
}

impl DiscoveryError {
    pub fn db_error(&self) -> &DbError {
        match self {
            DiscoveryError::Catalog { source, .. } => source,
        }
    }

    pub fn to_issue(&self) -> ConfigIssue {
        match self {
            DiscoveryError::Catalog { schema, source } => {
                ConfigIssue::new_catalog_unavailable(schema, &source.to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveredTable {
    pub id: TableId,
    pub metadata: TableMetadata,
    /// Catalog spelling, in key order.
    pub offset_columns: Vec<OffsetColumn>,
    pub initial_position: TablePosition,
}

#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub tables: Vec<DiscoveredTable>,
    pub issues: Vec<ConfigIssue>,
}

pub struct TableDiscovery<'a> {
    adapter: &'a dyn SqlAdapter,
}

impl<'a> TableDiscovery<'a> {
    pub fn new(adapter: &'a dyn SqlAdapter) -> Self {
        Self { adapter }
    }

    /// Tables come out in configuration order, then in catalog order within
    /// a pattern. A table matched by several patterns is read with the
    /// settings of the first one.
    pub async fn discover(&self, configs: &[TableConfig]) -> Result<DiscoveryReport, DiscoveryError> {
        let mut report = DiscoveryReport::default();
        let mut seen = HashSet::new();

        for config in configs {
            let names = self
                .adapter
                .list_tables(&config.schema, &config.pattern)
                .await
                .map_err(|source| DiscoveryError::Catalog {
                    schema: config.schema.clone(),
                    source,
                })?;

            if names.is_empty() {
                report
                    .issues
                    .push(ConfigIssue::new_pattern_no_match(&config.schema, &config.pattern));
                continue;
            }

            for name in names {
                let id = TableId::new(config.schema.as_str(), name);
                if !seen.insert(id.clone()) {
                    debug!(table = %id, pattern = %config.pattern, "Table already matched by an earlier pattern");
                    continue;
                }

                let metadata = self.adapter.table_metadata(&id).await.map_err(|source| {
                    DiscoveryError::Catalog {
                        schema: config.schema.clone(),
                        source,
                    }
                })?;

                match resolve_table(config, metadata) {
                    Ok(table) => report.tables.push(table),
                    Err(issues) => report.issues.extend(issues),
                }
            }
        }

        info!(
            tables = report.tables.len(),
            issues = report.issues.len(),
            "Table discovery finished"
        );
        Ok(report)
    }
}

fn resolve_table(
    config: &TableConfig,
    metadata: TableMetadata,
) -> Result<DiscoveredTable, Vec<ConfigIssue>> {
    let table = metadata.id.to_string();
    let offset_columns = resolve_offset_columns(config, &metadata, &table)?;

    let mut issues = Vec::new();
    let mut initial = BTreeMap::new();
    for (column, literal) in &config.initial_offsets {
        let Some(offset_column) = offset_columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
        else {
            issues.push(ConfigIssue::new_initial_offset_unknown_column(&table, column));
            continue;
        };

        match offset_column.data_type.parse_literal(literal) {
            Ok(value) => {
                initial.insert(offset_column.name.clone(), value);
            }
            Err(e) => issues.push(ConfigIssue::new_initial_offset_invalid(
                &table,
                &offset_column.name,
                &e.to_string(),
            )),
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    let initial_position = TablePosition::start(&offset_columns, &initial);
    debug!(
        table = %table,
        offset_columns = ?offset_columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        start = %initial_position,
        "Resolved table"
    );

    Ok(DiscoveredTable {
        id: metadata.id.clone(),
        metadata,
        offset_columns,
        initial_position,
    })
}

fn resolve_offset_columns(
    config: &TableConfig,
    metadata: &TableMetadata,
    table: &str,
) -> Result<Vec<OffsetColumn>, Vec<ConfigIssue>> {
    let requested: Vec<String> = match &config.offset_columns {
        Some(columns) => columns.clone(),
        None if metadata.primary_keys.is_empty() => {
            return Err(vec![ConfigIssue::new_no_offset_columns(table)]);
        }
        None => metadata.primary_keys.clone(),
    };

    let mut issues = Vec::new();
    let mut columns = Vec::with_capacity(requested.len());
    for name in &requested {
        match metadata.column(name) {
            None => issues.push(ConfigIssue::new_offset_column_unknown(table, name)),
            Some(column) if !column.data_type.is_orderable() => {
                issues.push(ConfigIssue::new_offset_column_unorderable(
                    table,
                    &column.name,
                    &column.data_type.to_string(),
                ))
            }
            Some(column) => {
                columns.push(OffsetColumn::new(column.name.clone(), column.data_type.clone()))
            }
        }
    }

    if issues.is_empty() {
        Ok(columns)
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::{
        memory::adapter::{FailurePoint, MemoryAdapter},
        sql::base::metadata::column::ColumnMetadata,
    };
    use engine_config::report::issue::{
        CODE_CATALOG_UNAVAILABLE, CODE_INITIAL_OFFSET_INVALID, CODE_INITIAL_OFFSET_UNKNOWN_COLUMN,
        CODE_NO_OFFSET_COLUMNS, CODE_OFFSET_COLUMN_UNKNOWN, CODE_OFFSET_COLUMN_UNORDERABLE,
        CODE_TABLE_PATTERN_NO_MATCH,
    };
    use model::core::{data_type::DataType, value::Value};

    async fn catalog() -> MemoryAdapter {
        let adapter = MemoryAdapter::new();
        for name in ["TENNIS_STARS", "CRICKET_STARS"] {
            adapter
                .create_table(
                    TableId::new("TEST", name),
                    vec![
                        ColumnMetadata::new("p_id", DataType::Int).not_null(),
                        ColumnMetadata::new("first_name", DataType::String),
                    ],
                    &["p_id"],
                )
                .await
                .unwrap();
        }
        adapter
            .create_table(
                TableId::new("TEST", "TRANSACTION_TABLE"),
                vec![
                    ColumnMetadata::new("unique_int", DataType::Int),
                    ColumnMetadata::new("t_date", DataType::Long),
                    ColumnMetadata::new("payload", DataType::Json),
                ],
                &[],
            )
            .await
            .unwrap();
        adapter
    }

    fn codes(report: &DiscoveryReport) -> Vec<&str> {
        report.issues.iter().map(|i| i.code.as_str()).collect()
    }

    fn names(report: &DiscoveryReport) -> Vec<String> {
        report.tables.iter().map(|t| t.id.to_string()).collect()
    }

    #[tokio::test]
    async fn orders_by_config_then_catalog_and_dedups() {
        let adapter = catalog().await;
        let report = TableDiscovery::new(&adapter)
            .discover(&[
                TableConfig::builder("TEST", "TENNIS%").build(),
                TableConfig::builder("TEST", "%_STARS").build(),
            ])
            .await
            .unwrap();

        assert!(report.issues.is_empty());
        assert_eq!(names(&report), vec!["TEST.TENNIS_STARS", "TEST.CRICKET_STARS"]);
        assert_eq!(report.tables[0].offset_columns[0].name, "p_id");
        assert!(!report.tables[0].initial_position.has_state());
    }

    #[tokio::test]
    async fn each_unmatched_pattern_yields_one_issue() {
        let adapter = catalog().await;
        let report = TableDiscovery::new(&adapter)
            .discover(&[TableConfig::builder("TEST", "NO_TABLE%").build()])
            .await
            .unwrap();

        assert!(report.tables.is_empty());
        assert_eq!(codes(&report), vec![CODE_TABLE_PATTERN_NO_MATCH]);
    }

    #[tokio::test]
    async fn override_columns_resolve_case_insensitively() {
        let adapter = catalog().await;
        let report = TableDiscovery::new(&adapter)
            .discover(&[TableConfig::builder("TEST", "TRANSACTION_TABLE")
                .offset_columns(["T_DATE"])
                .initial_offset("T_DATE", "5000")
                .build()])
            .await
            .unwrap();

        let table = &report.tables[0];
        assert_eq!(table.offset_columns, vec![OffsetColumn::new("t_date", DataType::Long)]);
        assert_eq!(
            table.initial_position.values().collect::<Vec<_>>(),
            vec![Some(&Value::Int(5000))]
        );
    }

    #[tokio::test]
    async fn reports_column_problems() {
        let adapter = catalog().await;
        let report = TableDiscovery::new(&adapter)
            .discover(&[
                TableConfig::builder("TEST", "TRANSACTION_TABLE").build(),
                TableConfig::builder("TEST", "CRICKET_STARS")
                    .offset_columns(["nope"])
                    .build(),
            ])
            .await
            .unwrap();

        assert!(report.tables.is_empty());
        assert_eq!(
            codes(&report),
            vec![CODE_NO_OFFSET_COLUMNS, CODE_OFFSET_COLUMN_UNKNOWN]
        );

        let adapter = catalog().await;
        let report = TableDiscovery::new(&adapter)
            .discover(&[TableConfig::builder("TEST", "TRANSACTION_TABLE")
                .offset_columns(["payload"])
                .build()])
            .await
            .unwrap();
        assert_eq!(codes(&report), vec![CODE_OFFSET_COLUMN_UNORDERABLE]);
    }

    #[tokio::test]
    async fn reports_initial_offset_problems() {
        let adapter = catalog().await;
        let report = TableDiscovery::new(&adapter)
            .discover(&[
                TableConfig::builder("TEST", "TRANSACTION_TABLE")
                    .offset_columns(["t_date"])
                    .initial_offset("t_date", "yesterday")
                    .build(),
                TableConfig::builder("TEST", "CRICKET_STARS")
                    .initial_offset("first_name", "A")
                    .build(),
            ])
            .await
            .unwrap();

        assert_eq!(names(&report), Vec::<String>::new());
        assert_eq!(
            codes(&report),
            vec![CODE_INITIAL_OFFSET_INVALID, CODE_INITIAL_OFFSET_UNKNOWN_COLUMN]
        );
    }

    #[tokio::test]
    async fn catalog_failures_are_errors() {
        let adapter = catalog().await;
        adapter
            .fail_next(FailurePoint::Catalog, DbError::Connection("reset by peer".into()))
            .await;

        let err = TableDiscovery::new(&adapter)
            .discover(&[TableConfig::builder("TEST", "%").build()])
            .await
            .unwrap_err();
        assert_eq!(err.to_issue().code, CODE_CATALOG_UNAVAILABLE);
    }
}
