//! Multi-format decoding: CSV, JSON and fixed-size binary records.

mod binary;
mod csv;
mod detect;
mod json;

pub use detect::{detect_format, Detected};

use sensorpipe_frame::FrameBuffer;

use crate::config::{Format, MultiFormatConfig};
use crate::error::{ConfigError, DecodeError, Result};
use crate::input::Input;
use crate::mapping::FieldMapping;
use crate::record::StructuredRecord;
use crate::stats::DecoderStats;

const DEFAULT_DELIMITER: &str = ",";

/// Decoder for CSV rows, JSON objects and fixed-size binary records.
///
/// With [`Format::Auto`] the first input picks the format, and it stays
/// fixed for the rest of the session. Byte chunks are reassembled into
/// lines (CSV, JSON) or records (binary) in one internal buffer.
#[derive(Debug)]
pub struct MultiFormatDecoder {
    config: MultiFormatConfig,
    active: Option<Format>,
    delimiter: String,
    mapping: FieldMapping,
    header: Option<Vec<String>>,
    buffer: FrameBuffer,
    stats: DecoderStats,
}

impl MultiFormatDecoder {
    pub fn new(config: MultiFormatConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let active = match config.format {
            Format::Auto => None,
            format => Some(format),
        };
        let delimiter = config
            .delimiter
            .clone()
            .unwrap_or_else(|| DEFAULT_DELIMITER.to_string());
        let mapping = effective_mapping(&config.field_mapping, active);

        Ok(Self {
            active,
            delimiter,
            mapping,
            header: None,
            buffer: FrameBuffer::with_max_len(config.limits.max_buffer_size),
            stats: DecoderStats::new(config.limits.max_error_log),
            config,
        })
    }

    pub fn config(&self) -> &MultiFormatConfig {
        &self.config
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Format in use. [`Format::Auto`] until the first input is seen.
    pub fn format(&self) -> Format {
        self.active.unwrap_or(Format::Auto)
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// CSV column names, once a header row has been read.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn decode(&mut self, input: Input) -> Result<Vec<StructuredRecord>> {
        self.stats.record_input(input.byte_len());

        let format = match self.active {
            Some(format) => format,
            None => self.detect(&input),
        };

        let result = match format {
            Format::Csv => self.decode_csv(input),
            Format::Json => self.decode_json(input),
            Format::Binary | Format::Auto => self.decode_records(input),
        };

        match result {
            Ok(records) => {
                self.stats.record_decoded(records.len());
                Ok(records)
            }
            Err(err) => {
                tracing::warn!(format = %format, error = %err, "decode failed");
                self.stats.record_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Start a fresh session with the same configuration.
    ///
    /// An auto-detected format is forgotten and detected again. Statistics
    /// carry over; [`reconfigure`](Self::reconfigure) starts them from zero.
    pub fn reset(&mut self) {
        self.active = match self.config.format {
            Format::Auto => None,
            format => Some(format),
        };
        self.delimiter = self
            .config
            .delimiter
            .clone()
            .unwrap_or_else(|| DEFAULT_DELIMITER.to_string());
        self.mapping = effective_mapping(&self.config.field_mapping, self.active);
        self.header = None;
        self.buffer.clear();
    }

    pub fn reconfigure(
        &mut self,
        config: MultiFormatConfig,
    ) -> std::result::Result<(), ConfigError> {
        *self = Self::new(config)?;
        Ok(())
    }

    pub fn clear_errors(&mut self) {
        self.stats.clear_errors();
    }

    fn detect(&mut self, input: &Input) -> Format {
        let detected = detect_format(input);
        if self.config.delimiter.is_none() {
            if let Some(delimiter) = detected.delimiter {
                self.delimiter = delimiter.to_string();
            }
        }
        self.active = Some(detected.format);
        self.mapping = effective_mapping(&self.config.field_mapping, self.active);
        tracing::info!(
            format = %detected.format,
            delimiter = %self.delimiter,
            "detected payload format"
        );
        detected.format
    }

    fn append(&mut self, data: &[u8]) {
        if let Err(err) = self.buffer.append(data) {
            self.stats.record_overflow(&err);
        }
    }

    /// Buffer `data` and return every complete line, without terminators.
    ///
    /// Lines that are not valid UTF-8 are counted as errors and skipped.
    fn take_lines(&mut self, data: &[u8]) -> Vec<String> {
        self.append(data);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.scan_for(b'\n') {
            let raw = self.buffer.drain_prefix(pos + 1);
            let raw = &raw[..pos];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            match std::str::from_utf8(raw) {
                Ok(line) => lines.push(line.to_string()),
                Err(err) => {
                    let err = DecodeError::InvalidUtf8(err);
                    tracing::warn!(error = %err, "dropping line");
                    self.stats.record_error(err.to_string());
                }
            }
        }
        lines
    }
}

fn effective_mapping(configured: &FieldMapping, format: Option<Format>) -> FieldMapping {
    if !configured.is_empty() {
        return configured.clone();
    }
    match format {
        Some(Format::Csv) => FieldMapping::default_csv(),
        Some(Format::Json) => FieldMapping::default_json(),
        _ => FieldMapping::new(),
    }
}
