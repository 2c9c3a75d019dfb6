#[cfg(test)]
mod tests {
    use crate::{
        TEST_PG_URL, reset_postgres_schema, started_source,
        utils::{
            CRICKET, CRICKET_ROWS, Produced, SCHEMA, TENNIS, TENNIS_ROWS, column, drain,
            pairs_settings, pairs_table, seed_postgres_stars, sports_adapter, table,
        },
    };
    use connectors::{
        adapter::{Adapter, DataFormat},
        memory::adapter::{FailurePoint, MemoryAdapter},
        sql::base::error::DbError,
    };
    use engine_config::settings::{BatchTableStrategy, OnRecordError, SourceSettings, TableConfig};
    use engine_core::{
        retry::RetryPolicy,
        state::{StateStore, sled_store::SledStateStore},
    };
    use engine_processing::source::TableSource;
    use engine_runtime::{
        error::RunnerError,
        runner::{RunSummary, RunnerOptions, SourceRunner},
        sink::ChannelSink,
    };
    use model::{core::value::Value, records::batch::Batch};
    use std::{sync::Arc, time::Duration};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    fn settings() -> SourceSettings {
        SourceSettings::new("sports", DataFormat::Memory, "")
            .with_table(TableConfig::builder(SCHEMA, "%_STARS").build())
            .with_max_batch_size(4)
    }

    fn options() -> RunnerOptions {
        RunnerOptions {
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
            stop_when_idle: true,
            ..RunnerOptions::from_settings(&settings())
        }
    }

    async fn run(
        adapter: &MemoryAdapter,
        store: Arc<dyn StateStore>,
        options: RunnerOptions,
    ) -> (Result<RunSummary, RunnerError>, Vec<Batch>) {
        let (sink, mut rx) = ChannelSink::channel(128);
        let source = TableSource::new(settings(), Arc::new(adapter.clone()));
        let result = SourceRunner::new(source, store, sink, options, CancellationToken::new())
            .run()
            .await;

        let mut batches = Vec::new();
        while let Ok(batch) = rx.try_recv() {
            batches.push(batch);
        }
        (result, batches)
    }

    fn p_ids(batches: &[Batch], table_name: &str) -> Vec<i64> {
        let id = table(table_name);
        batches
            .iter()
            .filter(|b| b.table.as_ref() == Some(&id))
            .flat_map(|b| column(&b.records, "p_id"))
            .collect()
    }

    // Scenario: The runner stops after two batches, then a second runner
    // picks up from the stored checkpoint.
    // Expected Outcome: Together they deliver every row exactly once and the
    // checkpoint sequence counts every committed batch.
    #[traced_test]
    #[tokio::test]
    async fn runner_resumes_from_checkpoint() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = sports_adapter().await;

        let (first, mut batches) = run(
            &adapter,
            Arc::clone(&store),
            RunnerOptions {
                max_batches: Some(2),
                ..options()
            },
        )
        .await;
        assert_eq!(first.unwrap().batches, 2);
        assert_eq!(adapter.open_cursors(), 0);

        let (second, rest) = run(&adapter, Arc::clone(&store), options()).await;
        let second = second.unwrap();
        batches.extend(rest);

        assert_eq!(p_ids(&batches, CRICKET), (1..=CRICKET_ROWS).collect::<Vec<_>>());
        assert_eq!(p_ids(&batches, TENNIS), (1..=TENNIS_ROWS).collect::<Vec<_>>());

        let checkpoint = store.load_checkpoint("sports").await.unwrap().unwrap();
        assert_eq!(checkpoint.sequence, batches.len() as u64);
        assert_eq!(checkpoint.records_done, (CRICKET_ROWS + TENNIS_ROWS) as u64);
        assert_eq!(checkpoint.offset, second.offset);
        assert_eq!(adapter.open_cursors(), 0);
    }

    // Scenario: The first fetch after a cursor is opened fails with a
    // connection error.
    // Expected Outcome: The runner retries with the same token and nothing
    // is duplicated.
    #[traced_test]
    #[tokio::test]
    async fn runner_retries_transient_errors_without_duplicates() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = sports_adapter().await;
        adapter
            .fail_next(FailurePoint::Fetch, DbError::Connection("reset by peer".into()))
            .await;
        adapter
            .fail_next(FailurePoint::Open, DbError::Timeout("statement timeout".into()))
            .await;

        let (summary, batches) = run(&adapter, store, options()).await;
        assert_eq!(summary.unwrap().records, (CRICKET_ROWS + TENNIS_ROWS) as u64);
        assert_eq!(p_ids(&batches, CRICKET), (1..=CRICKET_ROWS).collect::<Vec<_>>());
        assert_eq!(p_ids(&batches, TENNIS), (1..=TENNIS_ROWS).collect::<Vec<_>>());
    }

    // Scenario: Every attempt fails with a transient error.
    // Expected Outcome: The runner gives up, nothing is checkpointed and no
    // cursor is left open.
    #[traced_test]
    #[tokio::test]
    async fn runner_gives_up_after_the_retry_budget() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = sports_adapter().await;
        for _ in 0..3 {
            adapter
                .fail_next(FailurePoint::Open, DbError::Connection("refused".into()))
                .await;
        }

        let (result, batches) = run(&adapter, Arc::clone(&store), options()).await;
        assert!(matches!(
            result,
            Err(RunnerError::RetriesExhausted { attempts: 3, .. })
        ));
        assert!(batches.is_empty());
        assert!(store.load_checkpoint("sports").await.unwrap().is_none());
        assert_eq!(adapter.open_cursors(), 0);
    }

    // Scenario: New rows arrive while the runner is polling.
    // Expected Outcome: They are delivered without restarting the runner.
    #[traced_test]
    #[tokio::test]
    async fn polling_runner_sees_new_rows() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = sports_adapter().await;
        let (sink, mut rx) = ChannelSink::channel(128);
        let cancel = CancellationToken::new();

        let runner = SourceRunner::new(
            TableSource::new(settings(), Arc::new(adapter.clone())),
            store,
            sink,
            RunnerOptions {
                poll_interval: Duration::from_millis(5),
                stop_when_idle: false,
                ..options()
            },
            cancel.clone(),
        );
        let handle = tokio::spawn(runner.run());

        let mut delivered = 0;
        while delivered < (CRICKET_ROWS + TENNIS_ROWS) as usize {
            delivered += rx.recv().await.unwrap().records.len();
        }

        adapter
            .insert(
                &table(CRICKET),
                vec![
                    Value::Int(11),
                    Value::String("first_11".into()),
                    Value::String("last_11".into()),
                ],
            )
            .await
            .unwrap();
        let late = rx.recv().await.unwrap();
        assert_eq!(column(&late.records, "p_id"), vec![11]);

        cancel.cancel();
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.records, (CRICKET_ROWS + TENNIS_ROWS + 1) as u64);
        assert_eq!(adapter.open_cursors(), 0);
    }

    // Scenario: A row with a NULL offset value sits after the last good row
    // and the runner is told to stop once idle.
    // Expected Outcome: The error record is committed once and the runner
    // goes idle instead of checkpointing the same batch forever.
    #[traced_test]
    #[tokio::test]
    async fn error_rows_do_not_keep_the_runner_busy() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let adapter = MemoryAdapter::new();
        pairs_table(&adapter, &[(1, Some(1)), (2, None)]).await;

        let (sink, mut rx) = ChannelSink::channel(16);
        let source = TableSource::new(
            pairs_settings(OnRecordError::ToError),
            Arc::new(adapter.clone()),
        );
        let runner = SourceRunner::new(
            source,
            Arc::clone(&store),
            sink,
            options(),
            CancellationToken::new(),
        );
        let summary = runner.run().await.unwrap();

        assert_eq!((summary.batches, summary.records, summary.error_records), (1, 1, 1));
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.error_records.len(), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(store.load_checkpoint("pairs").await.unwrap().unwrap().sequence, 1);
    }

    // Test Settings: SWITCH_TABLES against a real Postgres.
    // Expected Outcome: Same interleaving as in memory, C, T, C, T, T.
    #[traced_test]
    #[tokio::test]
    #[ignore = "Needs a local Postgres at TEST_PG_URL."]
    async fn postgres_switch_tables_order() {
        reset_postgres_schema().await;
        seed_postgres_stars().await;

        let adapter = Adapter::connect(DataFormat::Postgres, TEST_PG_URL)
            .await
            .unwrap();
        let settings = SourceSettings::new("sports", DataFormat::Postgres, TEST_PG_URL)
            .with_table(TableConfig::builder(SCHEMA, "%_STARS").build());
        let mut source = started_source(settings, adapter.sql()).await;

        let drained = drain(&mut source, "", 5, "p_id").await;
        let order: Vec<_> = drained.batches.iter().map(|b| b.table.clone()).collect();
        assert_eq!(
            order,
            [CRICKET, TENNIS, CRICKET, TENNIS, TENNIS]
                .map(|name| table(name).to_string())
                .to_vec()
        );
        source.destroy().await;
    }

    // Test Settings: PROCESS_ALL_AVAILABLE_ROWS_FROM_TABLE against a real
    // Postgres, so rows come through a server-side cursor.
    #[traced_test]
    #[tokio::test]
    #[ignore = "Needs a local Postgres at TEST_PG_URL."]
    async fn postgres_process_all_drains_through_one_cursor() {
        reset_postgres_schema().await;
        seed_postgres_stars().await;

        let adapter = Adapter::connect(DataFormat::Postgres, TEST_PG_URL)
            .await
            .unwrap();
        let settings = SourceSettings::new("sports", DataFormat::Postgres, TEST_PG_URL)
            .with_table(TableConfig::builder(SCHEMA, TENNIS).build())
            .with_strategy(BatchTableStrategy::ProcessAllAvailableRowsFromTable)
            .with_fetch_size(2);
        let mut source = started_source(settings, adapter.sql()).await;

        let drained = drain(&mut source, "", 5, "p_id").await;
        assert_eq!(
            drained.batches,
            vec![
                Produced {
                    table: table(TENNIS).to_string(),
                    keys: (1..=5).collect()
                },
                Produced {
                    table: table(TENNIS).to_string(),
                    keys: (6..=10).collect()
                },
                Produced {
                    table: table(TENNIS).to_string(),
                    keys: (11..=15).collect()
                },
            ]
        );
        source.destroy().await;
    }
}
