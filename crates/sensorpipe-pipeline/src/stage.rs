use std::fmt;
use std::io::ErrorKind;

use async_trait::async_trait;
use sensorpipe_decode::{Input, StructuredRecord};
use sensorpipe_frame::{RawChunk, DEFAULT_CHUNK_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::error::StageError;

/// Position of a worker in the pipeline, in data-flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Acquire,
    Decode,
    Process,
    Analyze,
    Emit,
    Persist,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Acquire,
        Stage::Decode,
        Stage::Process,
        Stage::Analyze,
        Stage::Emit,
        Stage::Persist,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Acquire => "acquire",
            Stage::Decode => "decode",
            Stage::Process => "process",
            Stage::Analyze => "analyze",
            Stage::Emit => "emit",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The Acquire stage collaborator: a transport producing decoder input.
#[async_trait]
pub trait Source: Send {
    /// Next payload, or `Ok(None)` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Input>, StageError>;
}

/// Collaborator for the Process, Analyze, Emit and Persist stages.
#[async_trait]
pub trait RecordStage: Send {
    fn name(&self) -> &str {
        "record-stage"
    }

    /// Handle one record. `Ok(None)` consumes it without passing it on.
    async fn handle(
        &mut self,
        record: StructuredRecord,
    ) -> Result<Option<StructuredRecord>, StageError>;
}

/// Reads an async byte stream in chunks of at most `chunk_size` bytes.
///
/// EOF ends the stream. Any read error other than `Interrupted` is fatal:
/// retrying a broken transport belongs to the transport itself.
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; chunk_size.max(1)],
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Source for ReaderSource<R> {
    async fn next_chunk(&mut self) -> Result<Option<Input>, StageError> {
        loop {
            match self.reader.read(&mut self.buf).await {
                Ok(0) => return Ok(None),
                Ok(n) => return Ok(Some(RawChunk::now(self.buf[..n].to_vec()).into())),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(StageError::fatal(format!("read failed: {err}"))),
            }
        }
    }
}

/// Feeds the pipeline from a channel. Closing every sender ends the stream.
pub struct ChannelSource {
    rx: mpsc::Receiver<Input>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Input>) -> Self {
        Self { rx }
    }

    /// A source plus the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Input>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl Source for ChannelSource {
    async fn next_chunk(&mut self) -> Result<Option<Input>, StageError> {
        Ok(self.rx.recv().await)
    }
}

/// A [`RecordStage`] backed by a synchronous closure.
pub struct FnStage<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a [`RecordStage`].
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnStage<F>
where
    F: FnMut(StructuredRecord) -> Result<Option<StructuredRecord>, StageError> + Send,
{
    FnStage {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F> RecordStage for FnStage<F>
where
    F: FnMut(StructuredRecord) -> Result<Option<StructuredRecord>, StageError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &mut self,
        record: StructuredRecord,
    ) -> Result<Option<StructuredRecord>, StageError> {
        (self.f)(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_source_chunks_until_eof() {
        let data: &[u8] = &[1, 2, 3, 4, 5];
        let mut source = ReaderSource::with_chunk_size(data, 2);

        let mut sizes = Vec::new();
        while let Some(input) = source.next_chunk().await.unwrap() {
            sizes.push(input.byte_len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send("a,b".into()).await.unwrap();
        drop(tx);

        assert!(source.next_chunk().await.unwrap().is_some());
        assert!(source.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fn_stage_passes_and_filters() {
        let mut stage = from_fn("filter", |record: StructuredRecord| {
            Ok(record.timestamp.map(|_| record))
        });
        assert_eq!(stage.name(), "filter");

        assert!(stage.handle(StructuredRecord::new()).await.unwrap().is_none());

        let mut stamped = StructuredRecord::new();
        stamped.timestamp = Some(1.0);
        assert!(stage.handle(stamped).await.unwrap().is_some());
    }

    #[test]
    fn test_stage_order() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::Analyze.to_string(), "analyze");
    }
}
