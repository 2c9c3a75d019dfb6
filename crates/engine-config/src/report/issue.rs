use serde::Serialize;
use std::fmt;

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    Configuration, // settings that are wrong on their own
    SourceSchema,  // settings that disagree with the catalog
    Offset,        // initial or persisted offsets
    Connectivity,  // catalog could not be reached
}

/// A problem found while validating a source before it starts.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigIssue {
    pub code: String,    // stable programmatic id
    pub message: String, // human-readable
    pub severity: Severity,
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>, // how to fix
}

pub const CODE_NO_TABLES_CONFIGURED: &str = "NO_TABLES_CONFIGURED";
pub const CODE_INVALID_BATCH_SIZE: &str = "INVALID_BATCH_SIZE";
pub const CODE_EMPTY_TABLE_PATTERN: &str = "EMPTY_TABLE_PATTERN";
pub const CODE_EMPTY_OFFSET_COLUMNS: &str = "EMPTY_OFFSET_COLUMNS";
pub const CODE_DUPLICATE_OFFSET_COLUMN: &str = "DUPLICATE_OFFSET_COLUMN";
pub const CODE_MISSING_CONNECTION_URL: &str = "MISSING_CONNECTION_URL";
pub const CODE_TABLE_PATTERN_NO_MATCH: &str = "TABLE_PATTERN_NO_MATCH";
pub const CODE_OFFSET_COLUMN_UNKNOWN: &str = "OFFSET_COLUMN_UNKNOWN";
pub const CODE_OFFSET_COLUMN_UNORDERABLE: &str = "OFFSET_COLUMN_UNORDERABLE";
pub const CODE_NO_OFFSET_COLUMNS: &str = "NO_OFFSET_COLUMNS";
pub const CODE_INITIAL_OFFSET_INVALID: &str = "INITIAL_OFFSET_INVALID";
pub const CODE_INITIAL_OFFSET_UNKNOWN_COLUMN: &str = "INITIAL_OFFSET_UNKNOWN_COLUMN";
pub const CODE_CATALOG_UNAVAILABLE: &str = "CATALOG_UNAVAILABLE";

impl ConfigIssue {
    pub fn new(
        code: &str,
        message: String,
        severity: Severity,
        kind: IssueKind,
        suggestion: Option<String>,
    ) -> Self {
        ConfigIssue {
            code: code.to_string(),
            message,
            severity,
            kind,
            table: None,
            suggestion,
        }
    }

    /// Creates a standardized error issue.
    pub fn error(code: &str, message: &str, kind: IssueKind) -> Self {
        ConfigIssue::new(code, message.to_string(), Severity::Error, kind, None)
    }

    /// Creates a standardized warning issue.
    pub fn warning(code: &str, message: &str, kind: IssueKind) -> Self {
        ConfigIssue::new(code, message.to_string(), Severity::Warning, kind, None)
    }

    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn new_no_tables_configured() -> Self {
        Self::new(
            CODE_NO_TABLES_CONFIGURED,
            "No table configurations were given".into(),
            Severity::Error,
            IssueKind::Configuration,
            Some("Add at least one entry to `tables`.".into()),
        )
    }

    pub fn new_invalid_batch_size(field: &str, value: usize) -> Self {
        Self::new(
            CODE_INVALID_BATCH_SIZE,
            format!("`{field}` must be greater than zero, got {value}"),
            Severity::Error,
            IssueKind::Configuration,
            None,
        )
    }

    pub fn new_empty_table_pattern(index: usize) -> Self {
        Self::new(
            CODE_EMPTY_TABLE_PATTERN,
            format!("Table configuration #{index} has an empty table pattern"),
            Severity::Error,
            IssueKind::Configuration,
            Some("Use `%` to match every table in the schema.".into()),
        )
    }

    pub fn new_empty_offset_columns(pattern: &str) -> Self {
        Self::new(
            CODE_EMPTY_OFFSET_COLUMNS,
            format!("Table pattern `{pattern}` overrides the offset columns with an empty list"),
            Severity::Error,
            IssueKind::Configuration,
            Some("Remove `offset_columns` to use the primary key, or list at least one column.".into()),
        )
    }

    pub fn new_duplicate_offset_column(pattern: &str, column: &str) -> Self {
        Self::new(
            CODE_DUPLICATE_OFFSET_COLUMN,
            format!("Offset column `{column}` is listed more than once for pattern `{pattern}`"),
            Severity::Error,
            IssueKind::Configuration,
            None,
        )
    }

    pub fn new_missing_connection_url(format: &str) -> Self {
        Self::new(
            CODE_MISSING_CONNECTION_URL,
            format!("A `{format}` connection requires `connection.url`"),
            Severity::Error,
            IssueKind::Connectivity,
            None,
        )
    }

    pub fn new_pattern_no_match(schema: &str, pattern: &str) -> Self {
        Self::new(
            CODE_TABLE_PATTERN_NO_MATCH,
            format!("Table pattern `{pattern}` matches no table in schema `{schema}`"),
            Severity::Error,
            IssueKind::SourceSchema,
            Some("Check the schema name and the pattern; matching is case sensitive.".into()),
        )
    }

    pub fn new_offset_column_unknown(table: &str, column: &str) -> Self {
        Self::new(
            CODE_OFFSET_COLUMN_UNKNOWN,
            format!("Offset column `{column}` does not exist in table `{table}`"),
            Severity::Error,
            IssueKind::SourceSchema,
            None,
        )
        .for_table(table)
    }

    pub fn new_offset_column_unorderable(table: &str, column: &str, data_type: &str) -> Self {
        Self::new(
            CODE_OFFSET_COLUMN_UNORDERABLE,
            format!("Offset column `{column}` of table `{table}` has type {data_type} which has no usable order"),
            Severity::Error,
            IssueKind::SourceSchema,
            Some("Pick a numeric, textual or temporal column.".into()),
        )
        .for_table(table)
    }

    pub fn new_no_offset_columns(table: &str) -> Self {
        Self::new(
            CODE_NO_OFFSET_COLUMNS,
            format!("Table `{table}` has no primary key and no offset columns are configured"),
            Severity::Error,
            IssueKind::SourceSchema,
            Some("Configure `offset_columns` for this table pattern.".into()),
        )
        .for_table(table)
    }

    pub fn new_initial_offset_invalid(table: &str, column: &str, reason: &str) -> Self {
        Self::new(
            CODE_INITIAL_OFFSET_INVALID,
            format!("Initial offset for `{table}`.`{column}` is invalid: {reason}"),
            Severity::Error,
            IssueKind::Offset,
            None,
        )
        .for_table(table)
    }

    pub fn new_initial_offset_unknown_column(table: &str, column: &str) -> Self {
        Self::new(
            CODE_INITIAL_OFFSET_UNKNOWN_COLUMN,
            format!("Initial offset names `{column}`, which is not an offset column of `{table}`"),
            Severity::Error,
            IssueKind::Offset,
            None,
        )
        .for_table(table)
    }

    pub fn new_catalog_unavailable(schema: &str, error: &str) -> Self {
        Self::new(
            CODE_CATALOG_UNAVAILABLE,
            format!("Could not read the catalog of schema `{schema}`: {error}"),
            Severity::Error,
            IssueKind::Connectivity,
            Some("Check source connectivity and permissions.".into()),
        )
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
