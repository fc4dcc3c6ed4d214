use std::collections::VecDeque;
use std::time::SystemTime;

use sensorpipe_frame::{FrameError, Resync};
use serde::Serialize;

/// Default number of error messages kept in [`DecoderStats::recent_errors`].
pub const DEFAULT_MAX_ERROR_LOG: usize = 100;

/// Running counters for one decoder session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecoderStats {
    pub chunks_received: u64,
    pub bytes_received: u64,
    pub records_decoded: u64,
    /// Decode calls or lines that failed outright.
    pub decode_errors: u64,
    /// Times the frame scanner dropped bytes to regain alignment.
    pub resync_events: u64,
    pub checksum_failures: u64,
    pub bytes_discarded: u64,
    pub buffer_overflows: u64,
    pub last_decode_at: Option<SystemTime>,
    /// Newest error messages, oldest first.
    pub recent_errors: VecDeque<String>,
    #[serde(skip)]
    max_errors: usize,
}

impl DecoderStats {
    pub fn new(max_errors: usize) -> Self {
        Self {
            chunks_received: 0,
            bytes_received: 0,
            records_decoded: 0,
            decode_errors: 0,
            resync_events: 0,
            checksum_failures: 0,
            bytes_discarded: 0,
            buffer_overflows: 0,
            last_decode_at: None,
            recent_errors: VecDeque::new(),
            max_errors,
        }
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub(crate) fn record_input(&mut self, bytes: usize) {
        self.chunks_received += 1;
        self.bytes_received += bytes as u64;
        self.last_decode_at = Some(SystemTime::now());
    }

    pub(crate) fn record_decoded(&mut self, records: usize) {
        self.records_decoded += records as u64;
    }

    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        self.decode_errors += 1;
        if self.max_errors == 0 {
            return;
        }
        while self.recent_errors.len() >= self.max_errors {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(message.into());
    }

    pub(crate) fn record_resync(&mut self, resync: &Resync) {
        self.resync_events += 1;
        match *resync {
            Resync::Skipped { bytes } => self.bytes_discarded += bytes as u64,
            Resync::UnknownType { .. } => self.bytes_discarded += 1,
            Resync::ChecksumMismatch { .. } => {
                self.checksum_failures += 1;
                self.bytes_discarded += 1;
            }
        }
    }

    /// Count a buffer overflow and log it as a decode error.
    pub(crate) fn record_overflow(&mut self, err: &FrameError) {
        if let FrameError::Overflow { discarded, .. } = *err {
            self.buffer_overflows += 1;
            self.bytes_discarded += discarded as u64;
        }
        self.record_error(err.to_string());
    }

    /// Drop the retained error messages; counters are kept.
    pub fn clear_errors(&mut self) {
        self.recent_errors.clear();
    }

}

impl Default for DecoderStats {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERROR_LOG)
    }
}
