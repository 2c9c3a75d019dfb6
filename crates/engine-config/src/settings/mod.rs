use crate::settings::{env::EnvContext, error::SettingsError};
use connectors::adapter::DataFormat;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::Path};
use tracing::debug;

pub mod env;
pub mod error;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_FETCH_SIZE: usize = 1000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// How a produce call picks the table it reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchTableStrategy {
    /// One bounded slice per table per call, round robin.
    #[default]
    SwitchTables,
    /// Stay on a table until it has no rows left, then move on. A table that
    /// keeps receiving rows can delay the others indefinitely.
    ProcessAllAvailableRowsFromTable,
}

/// What happens to a row whose offset value cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnRecordError {
    Discard,
    #[default]
    ToError,
    StopPipeline,
}

impl fmt::Display for BatchTableStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchTableStrategy::SwitchTables => f.write_str("SWITCH_TABLES"),
            BatchTableStrategy::ProcessAllAvailableRowsFromTable => {
                f.write_str("PROCESS_ALL_AVAILABLE_ROWS_FROM_TABLE")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub format: DataFormat,
    #[serde(default)]
    pub url: String,
}

/// One table-name pattern within a schema plus how its tables are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub schema: String,
    pub pattern: String,
    /// Explicit offset columns. `None` uses the primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_columns: Option<Vec<String>>,
    /// Literal starting value per offset column, used only while a table has
    /// no persisted offset.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub initial_offsets: BTreeMap<String, String>,
}

impl TableConfig {
    pub fn builder(schema: impl Into<String>, pattern: impl Into<String>) -> TableConfigBuilder {
        TableConfigBuilder {
            config: TableConfig {
                schema: schema.into(),
                pattern: pattern.into(),
                offset_columns: None,
                initial_offsets: BTreeMap::new(),
            },
        }
    }
}

pub struct TableConfigBuilder {
    config: TableConfig,
}

impl TableConfigBuilder {
    pub fn offset_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.config.offset_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn initial_offset(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.initial_offsets.insert(column.into(), value.into());
        self
    }

    pub fn build(self) -> TableConfig {
        self.config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Identifies the source in checkpoints and logs.
    pub name: String,
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub batch_strategy: BatchTableStrategy,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
    #[serde(default)]
    pub on_record_error: OnRecordError,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_fetch_size() -> usize {
    DEFAULT_FETCH_SIZE
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl SourceSettings {
    pub fn new(name: impl Into<String>, format: DataFormat, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: ConnectionSettings {
                format,
                url: url.into(),
            },
            tables: Vec::new(),
            batch_strategy: BatchTableStrategy::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            fetch_size: DEFAULT_FETCH_SIZE,
            on_record_error: OnRecordError::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    pub fn with_table(mut self, table: TableConfig) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_strategy(mut self, strategy: BatchTableStrategy) -> Self {
        self.batch_strategy = strategy;
        self
    }

    pub fn with_on_record_error(mut self, policy: OnRecordError) -> Self {
        self.on_record_error = policy;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Parses a JSON settings document, expanding `${VAR}` references in
    /// string values first.
    pub fn from_json(raw: &str, env: &EnvContext) -> Result<Self, SettingsError> {
        let mut doc: serde_json::Value = serde_json::from_str(raw)?;
        env.expand_json(&mut doc)?;
        Ok(serde_json::from_value(doc)?)
    }

    pub async fn from_file(path: impl AsRef<Path>, env: &EnvContext) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let settings = Self::from_json(&raw, env)?;
        debug!(
            source = %settings.name,
            tables = settings.tables.len(),
            strategy = %settings.batch_strategy,
            "Loaded source settings"
        );
        Ok(settings)
    }
}
