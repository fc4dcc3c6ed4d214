use bytes::{Buf, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Default cap on buffered bytes: 64 KiB.
pub const DEFAULT_MAX_BUFFER: usize = 64 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Append-only byte accumulator owned by a single decoder.
///
/// Bytes enter at the tail and leave only from the head, so the stream order
/// is never changed. Growth is capped at `max_len`.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_len: usize,
}

impl FrameBuffer {
    /// Create an empty buffer capped at [`DEFAULT_MAX_BUFFER`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_BUFFER)
    }

    /// Create an empty buffer with an explicit cap (at least one byte).
    pub fn with_max_len(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY.min(max_len)),
            max_len,
        }
    }

    /// Append bytes at the tail.
    ///
    /// If the result would exceed the cap, everything already buffered is
    /// dropped and only the newest `max_len` bytes of `data` are kept. The
    /// buffer is usable afterwards; the returned [`FrameError::Overflow`]
    /// reports how much was lost.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if self.buf.len() + data.len() <= self.max_len {
            self.buf.extend_from_slice(data);
            return Ok(());
        }

        let keep_from = data.len().saturating_sub(self.max_len);
        let discarded = self.buf.len() + keep_from;
        self.buf.clear();
        self.buf.extend_from_slice(&data[keep_from..]);

        tracing::error!(discarded, max = self.max_len, "frame buffer overflow");
        Err(FrameError::Overflow {
            discarded,
            max: self.max_len,
        })
    }

    /// Offset of the first occurrence of `marker`, if any.
    pub fn scan_for(&self, marker: u8) -> Option<usize> {
        self.buf.iter().position(|&b| b == marker)
    }

    /// Remove and return the first `n` bytes (fewer if the buffer is shorter).
    pub fn drain_prefix(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buf.len());
        self.buf.split_to(n).freeze()
    }

    /// Drop the first `n` bytes without handing them out. Returns how many
    /// bytes were actually dropped.
    pub fn discard(&mut self, n: usize) -> usize {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
        n
    }

    /// Byte at `index`, if buffered.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.buf.get(index).copied()
    }

    /// View of everything currently buffered.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_len() {
        let mut buf = FrameBuffer::new();
        assert!(buf.is_empty());

        buf.append(b"abc").unwrap();
        buf.append(b"de").unwrap();

        assert_eq!(buf.len(), 5);
        assert_eq!(buf.as_slice(), b"abcde");
    }

    #[test]
    fn test_scan_for_marker() {
        let mut buf = FrameBuffer::new();
        buf.append(&[0x00, 0x01, 0x55, 0x02, 0x55]).unwrap();

        assert_eq!(buf.scan_for(0x55), Some(2));
        assert_eq!(buf.scan_for(0xAA), None);
    }

    #[test]
    fn test_drain_prefix_preserves_order() {
        let mut buf = FrameBuffer::new();
        buf.append(b"hello world").unwrap();

        let head = buf.drain_prefix(6);
        assert_eq!(head.as_ref(), b"hello ");
        assert_eq!(buf.as_slice(), b"world");

        let rest = buf.drain_prefix(100);
        assert_eq!(rest.as_ref(), b"world");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_discard_clamps_to_len() {
        let mut buf = FrameBuffer::new();
        buf.append(b"xyz").unwrap();

        assert_eq!(buf.discard(1), 1);
        assert_eq!(buf.get(0), Some(b'y'));
        assert_eq!(buf.discard(10), 2);
        assert!(buf.is_empty());
        assert_eq!(buf.get(0), None);
    }

    #[test]
    fn test_overflow_drops_old_bytes() {
        let mut buf = FrameBuffer::with_max_len(8);
        buf.append(b"12345").unwrap();

        let err = buf.append(b"6789").unwrap_err();
        assert!(matches!(err, FrameError::Overflow { discarded: 5, max: 8 }));
        assert_eq!(buf.as_slice(), b"6789");
    }

    #[test]
    fn test_overflow_with_oversized_chunk_keeps_tail() {
        let mut buf = FrameBuffer::with_max_len(4);
        buf.append(b"ab").unwrap();

        let err = buf.append(b"0123456789").unwrap_err();
        assert!(matches!(err, FrameError::Overflow { discarded: 8, max: 4 }));
        assert_eq!(buf.as_slice(), b"6789");
        assert!(buf.len() <= buf.max_len());
    }

    #[test]
    fn test_append_exactly_to_cap_is_not_overflow() {
        let mut buf = FrameBuffer::with_max_len(4);
        buf.append(b"ab").unwrap();
        buf.append(b"cd").unwrap();
        assert_eq!(buf.len(), 4);
    }
}
