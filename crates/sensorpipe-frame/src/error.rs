/// Errors that can occur while accumulating or reading frame data.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer would grow past its cap; in-flight bytes were dropped.
    #[error("frame buffer overflow ({discarded} bytes discarded, max {max})")]
    Overflow { discarded: usize, max: usize },

    /// An I/O error occurred while reading from the transport.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport reached end of stream.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
