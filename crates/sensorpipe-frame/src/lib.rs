//! Byte-stream framing for sensor telemetry.
//!
//! This is the lowest layer of sensorpipe. Transports hand over raw chunks in
//! arbitrary sizes; this crate accumulates them and locates fixed-size binary
//! frames of the form:
//! - 1 sync byte (`0x55`)
//! - 1 type byte (acceleration, angular velocity, orientation, magnetometer)
//! - 8 payload bytes (three little-endian `i16` values + 2 reserved)
//! - 1 checksum byte (sum of the previous ten bytes, modulo 256)
//!
//! Partial frames stay buffered; corrupted input is skipped one byte at a time.

pub mod buffer;
pub mod chunk;
pub mod codec;
pub mod error;
pub mod reader;

pub use buffer::{FrameBuffer, DEFAULT_MAX_BUFFER};
pub use chunk::RawChunk;
pub use codec::{
    checksum, encode_frame, next_frame, Frame, FrameStep, FrameType, Resync, FRAME_LEN,
    PAYLOAD_LEN, SYNC_BYTE,
};
pub use error::{FrameError, Result};
pub use reader::{ChunkReader, DEFAULT_CHUNK_SIZE};
