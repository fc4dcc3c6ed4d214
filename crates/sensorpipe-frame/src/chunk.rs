use std::time::SystemTime;

use bytes::Bytes;

/// An immutable run of bytes as delivered by one transport read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// The bytes exactly as the transport produced them.
    pub data: Bytes,
    /// When the chunk arrived.
    pub received_at: SystemTime,
}

impl RawChunk {
    /// Create a chunk with an explicit arrival time.
    pub fn new(data: impl Into<Bytes>, received_at: SystemTime) -> Self {
        Self {
            data: data.into(),
            received_at,
        }
    }

    /// Create a chunk stamped with the current time.
    pub fn now(data: impl Into<Bytes>) -> Self {
        Self::new(data, SystemTime::now())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_keeps_bytes_and_time() {
        let at = SystemTime::UNIX_EPOCH;
        let chunk = RawChunk::new(Bytes::from_static(b"\x55\x51"), at);
        assert_eq!(chunk.len(), 2);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.received_at, at);
        assert_eq!(chunk.data.as_ref(), b"\x55\x51");
    }
}
