use async_trait::async_trait;
use model::records::{batch::Batch, error_record::ErrorRecord, record::Record};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Sink closed")]
    Closed,
}

/// Where produced batches go. A batch counts as delivered once `write`
/// returns; only then is its offset checkpointed.
#[async_trait]
pub trait RecordSink: Send {
    async fn write(&mut self, batch: &Batch) -> Result<(), SinkError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Line<'a> {
    Record(&'a Record),
    ErrorRecord(&'a ErrorRecord),
}

/// Writes one JSON document per record, error records tagged as such.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordSink for JsonLinesSink<W> {
    async fn write(&mut self, batch: &Batch) -> Result<(), SinkError> {
        let mut buf = Vec::with_capacity(batch.size_bytes() * 2);
        for record in &batch.records {
            serde_json::to_writer(&mut buf, &Line::Record(record))?;
            buf.push(b'\n');
        }
        for error_record in &batch.error_records {
            serde_json::to_writer(&mut buf, &Line::ErrorRecord(error_record))?;
            buf.push(b'\n');
        }

        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Hands batches to another task.
pub struct ChannelSink {
    tx: mpsc::Sender<Batch>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Batch>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Batch>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn write(&mut self, batch: &Batch) -> Result<(), SinkError> {
        self.tx
            .send(batch.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }
}
