use std::fmt;

use serde::{Deserialize, Serialize};
use sensorpipe_frame::{DEFAULT_MAX_BUFFER, FRAME_LEN};

use crate::error::ConfigError;
use crate::mapping::FieldMapping;
use crate::record::{FieldValue, WellKnownField};
use crate::stats::DEFAULT_MAX_ERROR_LOG;

/// Default accelerometer full-scale range, in g.
pub const DEFAULT_ACC_RANGE: f64 = 16.0;
/// Default gyroscope full-scale range, in degrees per second.
pub const DEFAULT_GYRO_RANGE: f64 = 2000.0;
/// Default angle full-scale range, in degrees.
pub const DEFAULT_ANGLE_RANGE: f64 = 180.0;

/// Decoder selection plus its parameters.
///
/// ```json
/// {"type": "binary_protocol", "acc_range": 8}
/// {"type": "multi_format", "format": "csv", "has_header": false}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoderConfig {
    BinaryProtocol(BinaryProtocolConfig),
    MultiFormat(MultiFormatConfig),
}

impl DecoderConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: DecoderConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            DecoderConfig::BinaryProtocol(config) => config.validate(),
            DecoderConfig::MultiFormat(config) => config.validate(),
        }
    }

    pub fn limits(&self) -> &DecoderLimits {
        match self {
            DecoderConfig::BinaryProtocol(config) => &config.limits,
            DecoderConfig::MultiFormat(config) => &config.limits,
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig::MultiFormat(MultiFormatConfig::default())
    }
}

/// Resource caps shared by both decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderLimits {
    /// Cap on bytes held while waiting for a complete frame, record or line.
    pub max_buffer_size: usize,
    /// Number of error messages retained in statistics.
    pub max_error_log: usize,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER,
            max_error_log: DEFAULT_MAX_ERROR_LOG,
        }
    }
}

/// Scaling for the 11-byte IMU frame protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryProtocolConfig {
    pub acc_range: f64,
    pub gyro_range: f64,
    pub angle_range: f64,
    #[serde(flatten)]
    pub limits: DecoderLimits,
}

impl Default for BinaryProtocolConfig {
    fn default() -> Self {
        Self {
            acc_range: DEFAULT_ACC_RANGE,
            gyro_range: DEFAULT_GYRO_RANGE,
            angle_range: DEFAULT_ANGLE_RANGE,
            limits: DecoderLimits::default(),
        }
    }
}

impl BinaryProtocolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("acc_range", self.acc_range),
            ("gyro_range", self.gyro_range),
            ("angle_range", self.angle_range),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidRange { name, value });
            }
        }
        if self.limits.max_buffer_size < FRAME_LEN {
            return Err(ConfigError::BufferTooSmall {
                size: self.limits.max_buffer_size,
                unit: FRAME_LEN,
            });
        }
        Ok(())
    }
}

/// Payload format of the multi-format decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Detect from the first input, then keep that format.
    #[default]
    Auto,
    Csv,
    Json,
    Binary,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Auto => "auto",
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Binary => "binary",
        })
    }
}

/// Element type of a fixed-size binary record. Always little-endian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    F32,
    F64,
    I16,
    U16,
    I32,
    U32,
}

impl ValueType {
    pub fn width(self) -> usize {
        match self {
            ValueType::I16 | ValueType::U16 => 2,
            ValueType::F32 | ValueType::I32 | ValueType::U32 => 4,
            ValueType::F64 => 8,
        }
    }

    /// Decode one value from exactly [`width`](Self::width) bytes.
    pub(crate) fn read_le(self, raw: &[u8]) -> FieldValue {
        match self {
            ValueType::F32 => {
                FieldValue::Float(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64)
            }
            ValueType::F64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&raw[..8]);
                FieldValue::Float(f64::from_le_bytes(b))
            }
            ValueType::I16 => FieldValue::Int(i16::from_le_bytes([raw[0], raw[1]]) as i64),
            ValueType::U16 => FieldValue::Int(u16::from_le_bytes([raw[0], raw[1]]) as i64),
            ValueType::I32 => {
                FieldValue::Int(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64)
            }
            ValueType::U32 => {
                FieldValue::Int(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64)
            }
        }
    }
}

/// Settings for CSV, JSON and fixed-size binary record decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiFormatConfig {
    pub format: Format,
    /// CSV: the first row names the columns.
    pub has_header: bool,
    /// CSV column separator. `None` picks one during auto-detection, or `,`.
    pub delimiter: Option<String>,
    /// Empty means the format's default mapping.
    pub field_mapping: FieldMapping,
    /// Binary: bytes per record.
    pub binary_record_size: usize,
    /// Binary: how many leading values fill well-known fields positionally.
    pub binary_field_count: usize,
    pub binary_value_type: ValueType,
    #[serde(flatten)]
    pub limits: DecoderLimits,
}

impl Default for MultiFormatConfig {
    fn default() -> Self {
        Self {
            format: Format::Auto,
            has_header: true,
            delimiter: None,
            field_mapping: FieldMapping::default(),
            binary_record_size: 36,
            binary_field_count: 9,
            binary_value_type: ValueType::F32,
            limits: DecoderLimits::default(),
        }
    }
}

impl MultiFormatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(&self.delimiter, Some(d) if d.is_empty()) {
            return Err(ConfigError::EmptyDelimiter);
        }

        let width = self.binary_value_type.width();
        if self.binary_record_size == 0 || self.binary_record_size % width != 0 {
            return Err(ConfigError::InvalidRecordLayout {
                record_size: self.binary_record_size,
                value_width: width,
            });
        }

        let max = WellKnownField::POSITIONAL.len();
        if self.binary_field_count > max {
            return Err(ConfigError::TooManyPositionalFields {
                count: self.binary_field_count,
                max,
            });
        }

        // Auto can settle on binary, so it needs room for one record too.
        let may_be_binary = matches!(self.format, Format::Binary | Format::Auto);
        if may_be_binary && self.limits.max_buffer_size < self.binary_record_size {
            return Err(ConfigError::BufferTooSmall {
                size: self.limits.max_buffer_size,
                unit: self.binary_record_size,
            });
        }
        Ok(())
    }
}
