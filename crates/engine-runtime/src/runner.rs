//! Drives a table source: produce, hand the batch to a sink, checkpoint the
//! offset, repeat. Transient produce failures are retried here since the
//! source itself never retries.

use crate::{error::RunnerError, sink::RecordSink};
use engine_config::settings::SourceSettings;
use engine_core::{
    retry::RetryPolicy,
    state::{Checkpoint, StateStore},
};
use engine_processing::source::{ProduceOutput, TableSource};
use model::{core::identifiers::BatchId, records::batch::Batch};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub max_batch_size: usize,
    /// Pause after an empty batch.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    /// Stop after this many delivered batches.
    pub max_batches: Option<u64>,
    /// Stop once a full round over the tables came back empty instead of
    /// polling.
    pub stop_when_idle: bool,
}

impl RunnerOptions {
    pub fn from_settings(settings: &SourceSettings) -> Self {
        Self {
            max_batch_size: settings.max_batch_size,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            retry: RetryPolicy::for_database(),
            max_batches: None,
            stop_when_idle: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub batches: u64,
    pub records: u64,
    pub error_records: u64,
    /// Last checkpointed token.
    pub offset: String,
}

pub struct SourceRunner<S> {
    source: TableSource,
    store: Arc<dyn StateStore>,
    sink: S,
    options: RunnerOptions,
    cancel: CancellationToken,
}

impl<S: RecordSink> SourceRunner<S> {
    pub fn new(
        source: TableSource,
        store: Arc<dyn StateStore>,
        sink: S,
        options: RunnerOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            options,
            cancel,
        }
    }

    /// Runs until cancelled, a batch limit is reached, or a fatal error.
    /// The source is destroyed on every exit path.
    pub async fn run(mut self) -> Result<RunSummary, RunnerError> {
        if let Err(e) = self.source.init().await {
            self.source.destroy().await;
            return Err(e.into());
        }

        let result = self.drive().await;
        self.source.destroy().await;

        match &result {
            Ok(summary) => info!(
                source = %self.source.settings().name,
                batches = summary.batches,
                records = summary.records,
                "Runner stopped"
            ),
            Err(e) => warn!(source = %self.source.settings().name, error = %e, "Runner failed"),
        }
        result
    }

    async fn drive(&mut self) -> Result<RunSummary, RunnerError> {
        let name = self.source.settings().name.clone();
        let checkpoint = self.store.load_checkpoint(&name).await?;

        let mut sequence = checkpoint.as_ref().map_or(0, |cp| cp.sequence);
        let mut records_done = checkpoint.as_ref().map_or(0, |cp| cp.records_done);
        let mut summary = RunSummary {
            offset: checkpoint.map(|cp| cp.offset).unwrap_or_default(),
            ..RunSummary::default()
        };
        info!(source = %name, sequence, offset = %summary.offset, "Resuming from checkpoint");

        // One empty batch only says the scheduled table had nothing. Every
        // table has been looked at once `tables + 1` empty batches came back.
        let idle_round = self.source.table_ids().len() + 1;
        let mut empty_streak = 0;

        while !self.cancel.is_cancelled() {
            let output = self.produce_with_retry(&summary.offset).await?;

            if output.is_empty() {
                summary.offset = output.offset;
                empty_streak += 1;
                if empty_streak < idle_round {
                    continue;
                }
                if self.options.stop_when_idle {
                    debug!(source = %name, "No rows left, stopping");
                    break;
                }
                empty_streak = 0;
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.options.poll_interval) => continue,
                }
            }
            empty_streak = 0;

            let batch = Batch::new(
                batch_id(&name, &output.offset),
                output.table,
                output.records,
                output.error_records,
                output.offset,
            );
            self.sink.write(&batch).await?;

            sequence += 1;
            records_done += batch.manifest.record_count as u64;
            self.store
                .save_checkpoint(&Checkpoint::new(
                    name.as_str(),
                    batch.offset.as_str(),
                    batch.id.as_str(),
                    sequence,
                    records_done,
                ))
                .await?;

            debug!(
                source = %name,
                batch = %batch.id,
                table = ?batch.table.as_ref().map(ToString::to_string),
                records = batch.manifest.record_count,
                errors = batch.manifest.error_count,
                "Batch committed"
            );

            summary.batches += 1;
            summary.records += batch.manifest.record_count as u64;
            summary.error_records += batch.manifest.error_count as u64;
            summary.offset = batch.offset;

            if self
                .options
                .max_batches
                .is_some_and(|max| summary.batches >= max)
            {
                break;
            }
        }

        Ok(summary)
    }

    async fn produce_with_retry(&mut self, offset: &str) -> Result<ProduceOutput, RunnerError> {
        let mut attempt = 0;
        loop {
            let err = match self.source.produce(offset, self.options.max_batch_size).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e.into()),
            };

            let Some(delay) = self.options.retry.delay_for(attempt) else {
                return Err(RunnerError::RetriesExhausted {
                    attempts: attempt + 1,
                    source: err,
                });
            };
            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Produce failed, retrying"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(err.into()),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

/// Stable id for the batch that ends at `offset`.
pub fn batch_id(source: &str, offset: &str) -> BatchId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(offset.as_bytes());
    let hex = hasher.finalize().to_hex();
    BatchId::new(&hex.as_str()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use connectors::{
        adapter::DataFormat,
        memory::adapter::{FailurePoint, MemoryAdapter},
        sql::base::{error::DbError, metadata::column::ColumnMetadata},
    };
    use engine_config::settings::TableConfig;
    use engine_core::state::sled_store::SledStateStore;
    use model::core::{data_type::DataType, identifiers::TableId, value::Value};

    async fn adapter_with(rows: i64) -> MemoryAdapter {
        let adapter = MemoryAdapter::new();
        let id = TableId::new("TEST", "EVENTS");
        adapter
            .create_table(id.clone(), vec![ColumnMetadata::new("id", DataType::Int)], &["id"])
            .await
            .unwrap();
        for i in 1..=rows {
            adapter.insert(&id, vec![Value::Int(i)]).await.unwrap();
        }
        adapter
    }

    fn settings() -> SourceSettings {
        SourceSettings::new("events", DataFormat::Memory, "")
            .with_table(TableConfig::builder("TEST", "EVENTS").build())
    }

    fn options() -> RunnerOptions {
        RunnerOptions {
            max_batch_size: 2,
            poll_interval: Duration::from_millis(10),
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
            max_batches: None,
            stop_when_idle: true,
        }
    }

    async fn run_once(
        adapter: &MemoryAdapter,
        store: Arc<dyn StateStore>,
        options: RunnerOptions,
    ) -> (Result<RunSummary, RunnerError>, Vec<Batch>) {
        let (sink, mut rx) = ChannelSink::channel(64);
        let source = TableSource::new(settings(), Arc::new(adapter.clone()));
        let runner = SourceRunner::new(source, store, sink, options, CancellationToken::new());

        let result = runner.run().await;
        let mut batches = Vec::new();
        while let Ok(batch) = rx.try_recv() {
            batches.push(batch);
        }
        (result, batches)
    }

    #[tokio::test]
    async fn checkpoints_every_batch_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = adapter_with(5).await;

        let (summary, batches) = run_once(&adapter, Arc::clone(&store), options()).await;
        let summary = summary.unwrap();
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.records, 5);
        assert_eq!(batches.len(), 3);
        assert_eq!(adapter.open_cursors(), 0);

        let checkpoint = store.load_checkpoint("events").await.unwrap().unwrap();
        assert_eq!(checkpoint.sequence, 3);
        assert_eq!(checkpoint.records_done, 5);
        assert_eq!(checkpoint.offset, summary.offset);
        assert_eq!(checkpoint.batch_id, batches[2].id.as_str());

        adapter
            .insert(&TableId::new("TEST", "EVENTS"), vec![Value::Int(6)])
            .await
            .unwrap();
        let (summary, batches) = run_once(&adapter, Arc::clone(&store), options()).await;
        assert_eq!(summary.unwrap().records, 1);
        assert_eq!(batches[0].records[0].get("id"), Some(&Value::Int(6)));
        assert_eq!(store.load_checkpoint("events").await.unwrap().unwrap().sequence, 4);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = adapter_with(3).await;
        adapter
            .fail_next(FailurePoint::Fetch, DbError::Connection("reset".into()))
            .await;

        let (summary, batches) = run_once(&adapter, store, options()).await;
        assert_eq!(summary.unwrap().records, 3);
        let ids: Vec<_> = batches
            .iter()
            .flat_map(|b| b.records.iter().map(|r| r.get("id").cloned().unwrap()))
            .collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[tokio::test]
    async fn gives_up_on_fatal_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = adapter_with(3).await;
        adapter
            .fail_next(FailurePoint::Fetch, DbError::Query("permission denied".into()))
            .await;

        let (result, batches) = run_once(&adapter, Arc::clone(&store), options()).await;
        assert!(matches!(result, Err(RunnerError::Source(_))));
        assert!(batches.is_empty());
        assert!(store.load_checkpoint("events").await.unwrap().is_none());
        assert_eq!(adapter.open_cursors(), 0);
    }

    #[tokio::test]
    async fn stops_after_the_batch_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = adapter_with(10).await;

        let (summary, batches) = run_once(
            &adapter,
            store,
            RunnerOptions {
                max_batches: Some(2),
                ..options()
            },
        )
        .await;
        assert_eq!(summary.unwrap().records, 4);
        assert_eq!(batches.len(), 2);
    }

    #[tokio::test]
    async fn an_empty_first_table_does_not_end_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = MemoryAdapter::new();
        for name in ["A_EMPTY", "B_FULL"] {
            adapter
                .create_table(
                    TableId::new("TEST", name),
                    vec![ColumnMetadata::new("id", DataType::Int)],
                    &["id"],
                )
                .await
                .unwrap();
        }
        for i in 1..=3 {
            adapter
                .insert(&TableId::new("TEST", "B_FULL"), vec![Value::Int(i)])
                .await
                .unwrap();
        }

        let settings = SourceSettings::new("events", DataFormat::Memory, "")
            .with_table(TableConfig::builder("TEST", "%").build());
        let (sink, mut rx) = ChannelSink::channel(8);
        let runner = SourceRunner::new(
            TableSource::new(settings, Arc::new(adapter.clone())),
            store,
            sink,
            options(),
            CancellationToken::new(),
        );

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.batches, 2);
        assert_eq!(
            rx.recv().await.unwrap().table,
            Some(TableId::new("TEST", "B_FULL"))
        );
    }

    #[tokio::test]
    async fn cancellation_stops_an_idle_runner() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = adapter_with(1).await;
        let (sink, _rx) = ChannelSink::channel(8);
        let cancel = CancellationToken::new();
        let runner = SourceRunner::new(
            TableSource::new(settings(), Arc::new(adapter.clone())),
            store,
            sink,
            RunnerOptions {
                poll_interval: Duration::from_secs(60),
                stop_when_idle: false,
                ..options()
            },
            cancel.clone(),
        );

        let handle = tokio::spawn(runner.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(adapter.open_cursors(), 0);
    }

    #[tokio::test]
    async fn run_future_can_move_between_threads() {
        fn assert_send<T: Send + 'static>(_: &T) {}

        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = adapter_with(1).await;
        let (sink, _rx) = ChannelSink::channel(8);
        let runner = SourceRunner::new(
            TableSource::new(settings(), Arc::new(adapter)),
            store,
            sink,
            options(),
            CancellationToken::new(),
        );

        let run = runner.run();
        assert_send(&run);
        assert_eq!(run.await.unwrap().records, 1);
    }

    #[test]
    fn batch_ids_depend_on_source_and_offset() {
        let a = batch_id("sports", r#"{"v":1,"tables":{}}"#);
        assert_eq!(a, batch_id("sports", r#"{"v":1,"tables":{}}"#));
        assert_ne!(a, batch_id("other", r#"{"v":1,"tables":{}}"#));
        assert_eq!(a.as_str().len(), 16);
    }
}
