use bytes::Bytes;
use sensorpipe_frame::RawChunk;
use serde_json::{Map, Value};

/// One payload handed to a decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Raw bytes from a byte stream.
    Chunk(RawChunk),
    /// A complete text payload (one JSON document or one or more CSV lines).
    Text(String),
    /// An already-parsed key/value map.
    Object(Map<String, Value>),
}

impl Input {
    /// Payload size counted in decoder statistics. Objects count as zero.
    pub fn byte_len(&self) -> usize {
        match self {
            Input::Chunk(chunk) => chunk.len(),
            Input::Text(text) => text.len(),
            Input::Object(_) => 0,
        }
    }
}

impl From<RawChunk> for Input {
    fn from(chunk: RawChunk) -> Self {
        Input::Chunk(chunk)
    }
}

impl From<Bytes> for Input {
    fn from(data: Bytes) -> Self {
        Input::Chunk(RawChunk::now(data))
    }
}

impl From<Vec<u8>> for Input {
    fn from(data: Vec<u8>) -> Self {
        Input::Chunk(RawChunk::now(data))
    }
}

impl From<&[u8]> for Input {
    fn from(data: &[u8]) -> Self {
        Input::Chunk(RawChunk::now(Bytes::copy_from_slice(data)))
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_string())
    }
}

impl From<Map<String, Value>> for Input {
    fn from(map: Map<String, Value>) -> Self {
        Input::Object(map)
    }
}
