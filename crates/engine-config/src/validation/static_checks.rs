//! Checks that need nothing but the settings themselves. Anything that
//! depends on the catalog is checked during table discovery.

use crate::{
    report::issue::ConfigIssue,
    settings::{SourceSettings, TableConfig},
};
use connectors::adapter::DataFormat;
use std::collections::HashSet;

pub fn check_settings(settings: &SourceSettings) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if settings.connection.format == DataFormat::Postgres
        && settings.connection.url.trim().is_empty()
    {
        issues.push(ConfigIssue::new_missing_connection_url(
            &settings.connection.format.to_string(),
        ));
    }

    if settings.max_batch_size == 0 {
        issues.push(ConfigIssue::new_invalid_batch_size(
            "max_batch_size",
            settings.max_batch_size,
        ));
    }
    if settings.fetch_size == 0 {
        issues.push(ConfigIssue::new_invalid_batch_size(
            "fetch_size",
            settings.fetch_size,
        ));
    }

    if settings.tables.is_empty() {
        issues.push(ConfigIssue::new_no_tables_configured());
    }

    for (index, table) in settings.tables.iter().enumerate() {
        issues.extend(check_table(index, table));
    }

    issues
}

fn check_table(index: usize, table: &TableConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if table.pattern.trim().is_empty() {
        issues.push(ConfigIssue::new_empty_table_pattern(index));
    }

    if let Some(columns) = &table.offset_columns {
        if columns.is_empty() {
            issues.push(ConfigIssue::new_empty_offset_columns(&table.pattern));
        }

        let mut seen = HashSet::new();
        for column in columns {
            if !seen.insert(column.to_lowercase()) {
                issues.push(ConfigIssue::new_duplicate_offset_column(
                    &table.pattern,
                    column,
                ));
            }
        }
    }

    issues
}
