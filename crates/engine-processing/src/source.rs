//! The table source: validates its settings, discovers its tables and then
//! produces one batch per call, always from the offset token the caller
//! hands in.

use crate::{
    error::SourceError,
    reader::{CursorMode, RowReader},
    scheduler::BatchScheduler,
};
use connectors::sql::base::adapter::SqlAdapter;
use engine_config::{
    report::issue::ConfigIssue,
    settings::SourceSettings,
    validation::static_checks::check_settings,
};
use engine_core::{
    context::TableContext,
    discovery::{DiscoveryReport, TableDiscovery},
    metrics::SourceMetrics,
    offset::{OffsetCodec, OffsetMap},
};
use model::{
    core::identifiers::TableId,
    records::{error_record::ErrorRecord, record::Record},
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, error, info, warn};

/// Result of one produce call.
#[derive(Debug, Clone, Serialize)]
pub struct ProduceOutput {
    pub records: Vec<Record>,
    pub error_records: Vec<ErrorRecord>,
    /// Token to pass to the next call once the records are safely stored.
    pub offset: String,
    /// The table that was read, if any.
    pub table: Option<TableId>,
}

impl ProduceOutput {
    fn empty(offset: &str) -> Self {
        Self {
            records: Vec::new(),
            error_records: Vec::new(),
            offset: offset.to_string(),
            table: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.error_records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Destroyed,
}

pub struct TableSource {
    settings: SourceSettings,
    adapter: Arc<dyn SqlAdapter>,
    tables: Vec<TableContext>,
    scheduler: BatchScheduler,
    reader: RowReader,
    metrics: SourceMetrics,
    /// Token entries of tables this run does not read.
    carried: OffsetMap,
    lifecycle: Lifecycle,
}

impl TableSource {
    pub fn new(settings: SourceSettings, adapter: Arc<dyn SqlAdapter>) -> Self {
        let reader = RowReader::new(
            Arc::clone(&adapter),
            CursorMode::from(settings.batch_strategy),
            settings.fetch_size,
            settings.on_record_error,
        );

        Self {
            scheduler: BatchScheduler::new(settings.batch_strategy),
            settings,
            adapter,
            tables: Vec::new(),
            reader,
            metrics: SourceMetrics::new(),
            carried: OffsetMap::new(),
            lifecycle: Lifecycle::Created,
        }
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    /// Shared handle; stays valid after the source is destroyed.
    pub fn metrics(&self) -> SourceMetrics {
        self.metrics.clone()
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.iter().map(|t| t.id.clone()).collect()
    }

    /// Every problem that would keep the source from starting. Reads the
    /// catalog but opens no cursor.
    pub async fn validate(&self) -> Vec<ConfigIssue> {
        match self.check().await {
            Ok((issues, _)) => issues,
            Err(issues) => issues,
        }
    }

    /// Validates, discovers the tables and makes the source ready to
    /// produce. Refuses to start on any validation error.
    pub async fn init(&mut self) -> Result<(), SourceError> {
        match self.lifecycle {
            Lifecycle::Destroyed => return Err(SourceError::Destroyed),
            Lifecycle::Running => return Ok(()),
            Lifecycle::Created => {}
        }

        let (issues, report) = match self.check().await {
            Ok(checked) => checked,
            Err(issues) => return Err(SourceError::InvalidConfig(issues)),
        };
        let report = match report {
            Some(report) if !issues.iter().any(ConfigIssue::is_error) => report,
            _ => return Err(SourceError::InvalidConfig(issues)),
        };
        for issue in issues.iter().filter(|i| !i.is_error()) {
            warn!(source = %self.settings.name, %issue, "Configuration warning");
        }

        self.tables = report.tables.into_iter().map(TableContext::new).collect();
        self.metrics.set_table_count(self.tables.len());
        self.lifecycle = Lifecycle::Running;

        info!(
            source = %self.settings.name,
            tables = self.tables.len(),
            strategy = %self.settings.batch_strategy,
            max_batch_size = self.settings.max_batch_size,
            "Table source initialised"
        );
        Ok(())
    }

    /// Static checks followed by discovery. `Err` carries the issues when
    /// discovery could not run at all.
    async fn check(&self) -> Result<(Vec<ConfigIssue>, Option<DiscoveryReport>), Vec<ConfigIssue>> {
        let mut issues = check_settings(&self.settings);
        if issues.iter().any(ConfigIssue::is_error) {
            return Ok((issues, None));
        }

        match TableDiscovery::new(self.adapter.as_ref())
            .discover(&self.settings.tables)
            .await
        {
            Ok(mut report) => {
                issues.append(&mut report.issues);
                Ok((issues, Some(report)))
            }
            Err(e) => {
                error!(source = %self.settings.name, error = %e, "Table discovery failed");
                issues.push(e.to_issue());
                Err(issues)
            }
        }
    }

    /// Reads at most `max_batch_size` rows from one table, starting from the
    /// positions in `offset`. On error no position moves and the caller may
    /// repeat the call with the same token.
    pub async fn produce(
        &mut self,
        offset: &str,
        max_batch_size: usize,
    ) -> Result<ProduceOutput, SourceError> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(SourceError::Destroyed);
        }
        if self.tables.is_empty() || max_batch_size == 0 {
            debug!(source = %self.settings.name, "Nothing to produce");
            return Ok(ProduceOutput::empty(offset));
        }

        match self.produce_batch(offset, max_batch_size).await {
            Ok(output) => {
                self.metrics.increment_records(output.records.len() as u64);
                self.metrics
                    .increment_error_records(output.error_records.len() as u64);
                self.metrics.increment_batches(1);
                Ok(output)
            }
            Err(e) => {
                self.metrics.increment_failures(1);
                error!(source = %self.settings.name, error = %e, "Produce failed");
                Err(e)
            }
        }
    }

    async fn produce_batch(
        &mut self,
        offset: &str,
        max_batch_size: usize,
    ) -> Result<ProduceOutput, SourceError> {
        let configured: HashMap<TableId, Vec<String>> = self
            .tables
            .iter()
            .map(|t| (t.id.clone(), t.offset_column_names()))
            .collect();
        let mut persisted = OffsetCodec::decode(offset, &configured)?;

        for ctx in &mut self.tables {
            let position = persisted.remove(&ctx.id);
            if ctx.sync_position(position.as_ref())
                && let Err(e) = ctx.close_cursor().await
            {
                warn!(table = %ctx.id, error = %e, "Failed to close cursor after resync");
            }
        }
        self.carried = persisted;

        let Some(idx) = self.scheduler.select(&mut self.tables) else {
            return Ok(ProduceOutput::empty(offset));
        };
        let table = self.tables[idx].id.clone();
        self.metrics.set_current_table(table.to_string());

        let outcome = self.reader.read(&mut self.tables[idx], max_batch_size).await?;
        self.scheduler
            .complete(idx, outcome.exhausted, self.tables.len());

        Ok(ProduceOutput {
            records: outcome.records,
            error_records: outcome.error_records,
            offset: self.encode_offset()?,
            table: Some(table),
        })
    }

    fn encode_offset(&self) -> Result<String, SourceError> {
        let mut positions = self.carried.clone();
        for ctx in &self.tables {
            positions.insert(ctx.id.clone(), ctx.position().clone());
        }
        Ok(OffsetCodec::encode(&positions)?)
    }

    /// Releases every cursor. The source cannot produce afterwards.
    pub async fn destroy(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }

        for ctx in &mut self.tables {
            if let Err(e) = ctx.close_cursor().await {
                warn!(table = %ctx.id, error = %e, "Failed to close cursor on shutdown");
            }
        }
        self.lifecycle = Lifecycle::Destroyed;
        info!(source = %self.settings.name, "Table source destroyed");
    }
}
