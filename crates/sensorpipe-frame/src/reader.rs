use std::io::{ErrorKind, Read};

use crate::chunk::RawChunk;
use crate::error::{FrameError, Result};

/// Default read size per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Turns any blocking `Read` stream into timestamped [`RawChunk`]s.
///
/// Chunk boundaries follow whatever the stream returns per read, capped at
/// `chunk_size`; they carry no framing meaning.
pub struct ChunkReader<T> {
    inner: T,
    chunk: Vec<u8>,
}

impl<T: Read> ChunkReader<T> {
    /// Create a chunk reader with [`DEFAULT_CHUNK_SIZE`].
    pub fn new(inner: T) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// Create a chunk reader with an explicit maximum chunk size.
    pub fn with_chunk_size(inner: T, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk: vec![0u8; chunk_size.max(1)],
        }
    }

    /// Read the next chunk (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_chunk(&mut self) -> Result<RawChunk> {
        loop {
            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            return Ok(RawChunk::now(self.chunk[..read].to_vec()));
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk.len()
    }
}

/// Yields chunks until EOF.
impl<T: Read> Iterator for ChunkReader<T> {
    type Item = Result<RawChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_chunk() {
            Ok(chunk) => Some(Ok(chunk)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_read_chunks_respect_size() {
        let data: Vec<u8> = (0u8..10).collect();
        let mut reader = ChunkReader::with_chunk_size(Cursor::new(data), 4);

        let a = reader.read_chunk().unwrap();
        let b = reader.read_chunk().unwrap();
        let c = reader.read_chunk().unwrap();

        assert_eq!(a.data.as_ref(), &[0, 1, 2, 3]);
        assert_eq!(b.data.as_ref(), &[4, 5, 6, 7]);
        assert_eq!(c.data.as_ref(), &[8, 9]);
        assert!(matches!(
            reader.read_chunk(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_iterator_stops_at_eof() {
        let reader = ChunkReader::with_chunk_size(Cursor::new(vec![1u8; 9]), 3);
        let chunks: Vec<RawChunk> = reader.map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let reader = ChunkReader::with_chunk_size(Cursor::new(Vec::<u8>::new()), 0);
        assert_eq!(reader.chunk_size(), 1);
    }

    #[test]
    fn test_interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: b"ok".to_vec(),
            pos: 0,
        };
        let mut chunks = ChunkReader::new(reader);
        let chunk = chunks.read_chunk().unwrap();
        assert_eq!(chunk.data.as_ref(), b"ok");
    }

    #[test]
    fn test_io_error_propagates() {
        let mut chunks = ChunkReader::new(AlwaysFails);
        let err = chunks.read_chunk().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct AlwaysFails;

    impl Read for AlwaysFails {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
