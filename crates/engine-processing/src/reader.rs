use crate::error::{CODE_OFFSET_VALUE_INVALID, SourceError};
use connectors::sql::base::{adapter::SqlAdapter, requests::FetchRowsRequestBuilder};
use engine_config::settings::{BatchTableStrategy, OnRecordError};
use engine_core::context::{TableContext, TableCursor};
use model::{
    core::{identifiers::TableId, value::Value},
    records::{
        error_record::ErrorRecord,
        record::{Record, RecordHeader},
        row::RowData,
    },
};
use std::sync::Arc;
use tracing::{debug, warn};

/// How long a table cursor lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// `LIMIT max + 1` query, closed after every read.
    Bounded,
    /// Unbounded query kept open until the table is drained.
    Streaming,
}

impl From<BatchTableStrategy> for CursorMode {
    fn from(strategy: BatchTableStrategy) -> Self {
        match strategy {
            BatchTableStrategy::SwitchTables => CursorMode::Bounded,
            BatchTableStrategy::ProcessAllAvailableRowsFromTable => CursorMode::Streaming,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub records: Vec<Record>,
    pub error_records: Vec<ErrorRecord>,
    /// Nothing remained on the cursor after this batch.
    pub exhausted: bool,
}

#[derive(Default)]
struct Converted {
    records: Vec<Record>,
    error_records: Vec<ErrorRecord>,
    last_tuple: Option<Vec<Value>>,
    /// Unorderable rows handed to the record error policy in this read.
    skipped: Vec<Vec<Value>>,
    /// Rows that count against the batch size.
    counted: usize,
}

pub struct RowReader {
    adapter: Arc<dyn SqlAdapter>,
    mode: CursorMode,
    fetch_size: usize,
    on_record_error: OnRecordError,
}

impl RowReader {
    pub fn new(
        adapter: Arc<dyn SqlAdapter>,
        mode: CursorMode,
        fetch_size: usize,
        on_record_error: OnRecordError,
    ) -> Self {
        Self {
            adapter,
            mode,
            fetch_size: fetch_size.max(1),
            on_record_error,
        }
    }

    /// Reads up to `max_rows` rows past the table's position. The position
    /// only moves when the whole read succeeds; on failure the cursor is
    /// released and the table is left as it was. Rows skipped by an earlier
    /// read are passed over and do not count against `max_rows`.
    pub async fn read(
        &self,
        ctx: &mut TableContext,
        max_rows: usize,
    ) -> Result<ReadOutcome, SourceError> {
        let mut cursor = match ctx.take_cursor() {
            Some(cursor) => cursor,
            None => self.open(ctx, max_rows).await?,
        };

        let mut converted = Converted::default();
        let exhausted = loop {
            let wanted = max_rows.saturating_sub(converted.counted).max(1);
            let (rows, exhausted) = match cursor.next_batch(wanted, self.fetch_size).await {
                Ok(batch) => batch,
                Err(source) => {
                    release(&ctx.id, &mut cursor).await;
                    return Err(SourceError::Read {
                        table: ctx.id.clone(),
                        source,
                    });
                }
            };

            if let Err(e) = self.convert(ctx, &mut cursor, rows, &mut converted) {
                release(&ctx.id, &mut cursor).await;
                return Err(e);
            }
            if exhausted || converted.counted >= max_rows {
                break exhausted;
            }
        };

        if exhausted || self.mode == CursorMode::Bounded {
            release(&ctx.id, &mut cursor).await;
        } else {
            ctx.attach_cursor(cursor);
        }

        for tuple in converted.skipped {
            ctx.skip(tuple);
        }
        if let Some(tuple) = converted.last_tuple {
            ctx.advance(tuple);
        }
        ctx.mark_read(exhausted);

        debug!(
            table = %ctx.id,
            rows = converted.records.len(),
            errors = converted.error_records.len(),
            exhausted,
            position = %ctx.position(),
            "Read batch"
        );

        Ok(ReadOutcome {
            records: converted.records,
            error_records: converted.error_records,
            exhausted,
        })
    }

    async fn open(&self, ctx: &TableContext, max_rows: usize) -> Result<TableCursor, SourceError> {
        // Rows skipped earlier come back from the query and are passed over.
        let limit = match self.mode {
            CursorMode::Bounded => Some(max_rows + 1 + ctx.position().skipped().len()),
            CursorMode::Streaming => None,
        };
        let request = FetchRowsRequestBuilder::new(ctx.id.clone())
            .columns(ctx.column_names())
            .offset_columns(ctx.offset_columns.clone())
            .position(ctx.position().clone())
            .limit(limit)
            .fetch_size(self.fetch_size)
            .build();

        debug!(table = %ctx.id, position = %ctx.position(), ?limit, "Opening cursor");
        let inner = self
            .adapter
            .open_cursor(request)
            .await
            .map_err(|source| SourceError::Read {
                table: ctx.id.clone(),
                source,
            })?;
        Ok(TableCursor::new(inner).with_skips(ctx.position().skipped()))
    }

    fn convert(
        &self,
        ctx: &TableContext,
        cursor: &mut TableCursor,
        rows: Vec<RowData>,
        out: &mut Converted,
    ) -> Result<(), SourceError> {
        for row in rows {
            let offset: Vec<(String, Value)> = ctx
                .offset_columns
                .iter()
                .map(|c| {
                    let value = row
                        .get(&c.name)
                        .and_then(|f| f.value.clone())
                        .unwrap_or(Value::Null);
                    (c.name.clone(), value)
                })
                .collect();

            let problem = offset
                .iter()
                .find(|(_, value)| !value.is_orderable())
                .map(|(column, value)| format!("offset column '{column}' has unusable value {value}"));
            let header = RecordHeader::new(ctx.id.clone(), &offset);
            let tuple: Vec<Value> = offset.into_iter().map(|(_, v)| v).collect();

            let Some(message) = problem else {
                out.last_tuple = Some(tuple);
                out.records.push(Record::from_row(header, row));
                out.counted += 1;
                continue;
            };

            if cursor.passes_skipped(&tuple) {
                debug!(table = %ctx.id, record = %header.source_id, "Passing over row handled earlier");
                continue;
            }

            match self.on_record_error {
                OnRecordError::Discard => {
                    debug!(table = %ctx.id, record = %header.source_id, %message, "Discarding row");
                }
                OnRecordError::ToError => {
                    warn!(table = %ctx.id, record = %header.source_id, %message, "Routing row to error output");
                    out.error_records.push(ErrorRecord::new(
                        Record::from_row(header, row),
                        CODE_OFFSET_VALUE_INVALID,
                        message,
                    ));
                }
                OnRecordError::StopPipeline => {
                    return Err(SourceError::DataError {
                        table: ctx.id.clone(),
                        record: header.source_id,
                        message,
                    });
                }
            }
            out.skipped.push(tuple);
            out.counted += 1;
        }

        Ok(())
    }
}

/// Closes a cursor whose read is over. A failing close leaves nothing to
/// recover, so it is only reported.
async fn release(table: &TableId, cursor: &mut TableCursor) {
    if let Err(e) = cursor.close().await {
        warn!(table = %table, error = %e, "Failed to close cursor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::{
        memory::adapter::{FailurePoint, MemoryAdapter},
        sql::base::{error::DbError, metadata::column::ColumnMetadata},
    };
    use engine_config::settings::TableConfig;
    use engine_core::discovery::TableDiscovery;
    use model::core::data_type::DataType;

    async fn scores(rows: &[Option<i64>]) -> (MemoryAdapter, TableContext) {
        let adapter = MemoryAdapter::new();
        let id = TableId::new("TEST", "SCORES");
        adapter
            .create_table(
                id.clone(),
                vec![
                    ColumnMetadata::new("seq", DataType::Long),
                    ColumnMetadata::new("label", DataType::String),
                ],
                &[],
            )
            .await
            .unwrap();
        for (i, seq) in rows.iter().enumerate() {
            adapter
                .insert(
                    &id,
                    vec![
                        seq.map(Value::Int).unwrap_or(Value::Null),
                        Value::String(format!("row-{i}")),
                    ],
                )
                .await
                .unwrap();
        }

        let report = TableDiscovery::new(&adapter)
            .discover(&[TableConfig::builder("TEST", "SCORES")
                .offset_columns(["seq"])
                .build()])
            .await
            .unwrap();
        let table = report.tables.into_iter().next().unwrap();
        (adapter, TableContext::new(table))
    }

    /// Table ordered by `(a, b)`.
    async fn pairs(rows: &[(i64, Option<i64>)]) -> (MemoryAdapter, TableContext) {
        let adapter = MemoryAdapter::new();
        let id = TableId::new("TEST", "PAIRS");
        adapter
            .create_table(
                id.clone(),
                vec![
                    ColumnMetadata::new("a", DataType::Long),
                    ColumnMetadata::new("b", DataType::Long),
                ],
                &[],
            )
            .await
            .unwrap();
        for (a, b) in rows {
            adapter
                .insert(&id, vec![Value::Int(*a), b.map(Value::Int).unwrap_or(Value::Null)])
                .await
                .unwrap();
        }

        let report = TableDiscovery::new(&adapter)
            .discover(&[TableConfig::builder("TEST", "PAIRS")
                .offset_columns(["a", "b"])
                .build()])
            .await
            .unwrap();
        let table = report.tables.into_iter().next().unwrap();
        (adapter, TableContext::new(table))
    }

    fn reader(adapter: &MemoryAdapter, mode: CursorMode, policy: OnRecordError) -> RowReader {
        RowReader::new(Arc::new(adapter.clone()), mode, 2, policy)
    }

    fn seqs(outcome: &ReadOutcome) -> Vec<Value> {
        outcome
            .records
            .iter()
            .map(|r| r.get("seq").cloned().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn bounded_reads_close_their_cursor() {
        let (adapter, mut ctx) = scores(&[Some(1), Some(2), Some(3)]).await;
        let reader = reader(&adapter, CursorMode::Bounded, OnRecordError::ToError);

        let first = reader.read(&mut ctx, 2).await.unwrap();
        assert_eq!(seqs(&first), vec![Value::Int(1), Value::Int(2)]);
        assert!(!first.exhausted);
        assert!(!ctx.has_cursor());
        assert_eq!(adapter.open_cursors(), 0);

        let second = reader.read(&mut ctx, 2).await.unwrap();
        assert_eq!(seqs(&second), vec![Value::Int(3)]);
        assert!(second.exhausted);
        assert_eq!(adapter.cursors_opened(), 2);
    }

    #[tokio::test]
    async fn streaming_reads_keep_the_cursor_until_drained() {
        let (adapter, mut ctx) = scores(&[Some(1), Some(2), Some(3)]).await;
        let reader = reader(&adapter, CursorMode::Streaming, OnRecordError::ToError);

        let first = reader.read(&mut ctx, 2).await.unwrap();
        assert!(!first.exhausted);
        assert!(ctx.has_cursor());
        assert_eq!(adapter.open_cursors(), 1);

        let second = reader.read(&mut ctx, 2).await.unwrap();
        assert_eq!(seqs(&second), vec![Value::Int(3)]);
        assert!(second.exhausted);
        assert!(!ctx.has_cursor());
        assert_eq!(adapter.open_cursors(), 0);
        assert_eq!(adapter.cursors_opened(), 1);
    }

    #[tokio::test]
    async fn null_offsets_follow_the_record_error_policy() {
        let (adapter, mut ctx) = scores(&[Some(1), None]).await;

        let outcome = reader(&adapter, CursorMode::Bounded, OnRecordError::ToError)
            .read(&mut ctx, 10)
            .await
            .unwrap();
        assert_eq!(seqs(&outcome), vec![Value::Int(1)]);
        assert_eq!(outcome.error_records.len(), 1);
        assert_eq!(outcome.error_records[0].code, CODE_OFFSET_VALUE_INVALID);
        assert_eq!(ctx.position().to_string(), "seq=1");

        let (adapter, mut ctx) = scores(&[Some(1), None]).await;
        let outcome = reader(&adapter, CursorMode::Bounded, OnRecordError::Discard)
            .read(&mut ctx, 10)
            .await
            .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.error_records.is_empty());

        let (adapter, mut ctx) = scores(&[Some(1), None]).await;
        let err = reader(&adapter, CursorMode::Streaming, OnRecordError::StopPipeline)
            .read(&mut ctx, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::DataError { .. }));
        assert!(!ctx.position().has_state());
        assert_eq!(adapter.open_cursors(), 0);
    }

    #[tokio::test]
    async fn fetch_failures_release_the_cursor() {
        let (adapter, mut ctx) = scores(&[Some(1), Some(2)]).await;
        adapter
            .fail_next(FailurePoint::Fetch, DbError::Connection("reset".into()))
            .await;

        let err = reader(&adapter, CursorMode::Streaming, OnRecordError::ToError)
            .read(&mut ctx, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Read { .. }));
        assert!(err.is_retryable());
        assert!(!ctx.has_cursor());
        assert_eq!(adapter.open_cursors(), 0);
        assert!(!ctx.position().has_state());
    }

    #[tokio::test]
    async fn error_rows_are_reported_once() {
        for mode in [CursorMode::Bounded, CursorMode::Streaming] {
            let (adapter, mut ctx) = pairs(&[(1, Some(1)), (2, None)]).await;
            let reader = reader(&adapter, mode, OnRecordError::ToError);

            let mut records = 0;
            let mut errors = 0;
            for _ in 0..4 {
                let outcome = reader.read(&mut ctx, 10).await.unwrap();
                records += outcome.records.len();
                errors += outcome.error_records.len();
                assert!(outcome.exhausted);
            }

            assert_eq!((records, errors), (1, 1), "{mode:?}");
            assert_eq!(ctx.position().to_string(), "a=1,b=1 (+1 skipped)");
            assert_eq!(adapter.open_cursors(), 0);
        }
    }

    #[tokio::test]
    async fn skipped_rows_do_not_hold_back_later_rows() {
        let (adapter, mut ctx) =
            pairs(&[(1, Some(1)), (2, None), (2, None), (2, None), (3, Some(1))]).await;
        let reader = reader(&adapter, CursorMode::Bounded, OnRecordError::ToError);

        let mut keys = Vec::new();
        let mut errors = 0;
        for _ in 0..5 {
            let outcome = reader.read(&mut ctx, 2).await.unwrap();
            assert!(outcome.records.len() + outcome.error_records.len() <= 2);
            keys.extend(outcome.records.iter().map(|r| r.get("a").cloned().unwrap()));
            errors += outcome.error_records.len();
        }

        assert_eq!(keys, vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(errors, 3);
        assert_eq!(ctx.position().to_string(), "a=3,b=1");
        assert!(ctx.is_exhausted());
    }

    #[tokio::test]
    async fn discarded_rows_are_not_read_again() {
        let (adapter, mut ctx) = scores(&[None, None]).await;
        let reader = reader(&adapter, CursorMode::Bounded, OnRecordError::Discard);

        let first = reader.read(&mut ctx, 1).await.unwrap();
        assert!(first.records.is_empty());
        assert_eq!(ctx.position().skipped().len(), 1);

        reader.read(&mut ctx, 1).await.unwrap();
        assert_eq!(ctx.position().skipped().len(), 2);

        let third = reader.read(&mut ctx, 1).await.unwrap();
        assert!(third.exhausted);
        assert_eq!(ctx.position().skipped().len(), 2);

        adapter
            .insert(&ctx.id, vec![Value::Int(7), Value::String("late".into())])
            .await
            .unwrap();
        let late = reader.read(&mut ctx, 1).await.unwrap();
        assert_eq!(seqs(&late), vec![Value::Int(7)]);
        assert!(ctx.position().skipped().is_empty());
    }
}
