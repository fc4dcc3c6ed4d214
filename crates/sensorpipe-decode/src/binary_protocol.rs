use bytes::Bytes;
use sensorpipe_frame::{next_frame, Frame, FrameBuffer, FrameStep, FrameType, Resync};

use crate::config::{BinaryProtocolConfig, Format};
use crate::error::{ConfigError, DecodeError, Result};
use crate::input::Input;
use crate::record::{Axes, Orientation, StructuredRecord};
use crate::stats::DecoderStats;

/// Raw readings are signed 16-bit; full scale maps to the configured range.
const FULL_SCALE: f64 = 32768.0;

/// Decoder for the 11-byte IMU frame protocol.
///
/// Each valid frame yields one record with exactly one group populated:
/// acceleration, angular velocity, orientation or magnetometer. Corrupt
/// bytes are skipped and counted, never returned as errors.
#[derive(Debug)]
pub struct BinaryProtocolDecoder {
    config: BinaryProtocolConfig,
    buffer: FrameBuffer,
    stats: DecoderStats,
}

impl BinaryProtocolDecoder {
    pub fn new(config: BinaryProtocolConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            buffer: FrameBuffer::with_max_len(config.limits.max_buffer_size),
            stats: DecoderStats::new(config.limits.max_error_log),
            config,
        })
    }

    pub fn config(&self) -> &BinaryProtocolConfig {
        &self.config
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Bytes held while waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn decode(&mut self, input: Input) -> Result<Vec<StructuredRecord>> {
        self.stats.record_input(input.byte_len());

        let data = match input {
            Input::Chunk(chunk) => chunk.data,
            Input::Text(text) => Bytes::from(text.into_bytes()),
            Input::Object(_) => {
                let err = DecodeError::UnsupportedInput {
                    format: Format::Binary,
                    input: "object",
                };
                tracing::warn!(error = %err, "binary protocol decode rejected input");
                self.stats.record_error(err.to_string());
                return Err(err);
            }
        };

        // Frames in the kept tail still decode; the loss is logged, not returned.
        if let Err(err) = self.buffer.append(&data) {
            self.stats.record_overflow(&err);
        }

        let mut records = Vec::new();
        loop {
            match next_frame(&mut self.buffer) {
                FrameStep::Incomplete => break,
                FrameStep::Resync(resync) => self.note_resync(resync),
                FrameStep::Frame(frame) => records.push(self.to_record(&frame)),
            }
        }

        self.stats.record_decoded(records.len());
        if !records.is_empty() {
            tracing::trace!(records = records.len(), "decoded frames");
        }
        Ok(records)
    }

    /// Drop buffered bytes. Statistics carry over; see [`reconfigure`](Self::reconfigure).
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Replace the configuration, starting a fresh session.
    pub fn reconfigure(
        &mut self,
        config: BinaryProtocolConfig,
    ) -> std::result::Result<(), ConfigError> {
        *self = Self::new(config)?;
        Ok(())
    }

    pub fn clear_errors(&mut self) {
        self.stats.clear_errors();
    }

    fn note_resync(&mut self, resync: Resync) {
        match resync {
            Resync::Skipped { bytes } => {
                tracing::debug!(bytes, "skipped bytes before sync marker");
            }
            Resync::UnknownType { type_byte } => {
                tracing::debug!(type_byte, "unknown frame type, advancing one byte");
            }
            Resync::ChecksumMismatch { expected, actual } => {
                tracing::warn!(expected, actual, "frame checksum mismatch, advancing one byte");
            }
        }
        self.stats.record_resync(&resync);
    }

    fn to_record(&self, frame: &Frame) -> StructuredRecord {
        let [a, b, c] = frame.values.map(f64::from);
        let mut record = StructuredRecord::new();
        match frame.frame_type {
            FrameType::Acceleration => {
                let k = self.config.acc_range / FULL_SCALE;
                record.acceleration = Axes::new(a * k, b * k, c * k);
            }
            FrameType::AngularVelocity => {
                let k = self.config.gyro_range / FULL_SCALE;
                record.angular_velocity = Axes::new(a * k, b * k, c * k);
            }
            FrameType::Orientation => {
                let k = self.config.angle_range / FULL_SCALE;
                record.orientation = Orientation::new(a * k, b * k, c * k);
            }
            FrameType::Magnetometer => {
                record.magnetometer = Axes::new(a, b, c);
            }
        }
        record
    }
}
