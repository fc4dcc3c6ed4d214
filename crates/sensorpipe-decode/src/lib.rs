//! Decoding of sensor byte streams and text payloads into structured records.
//!
//! Two decoders sit behind the [`Decode`] trait and the closed [`Decoder`] enum:
//! - [`BinaryProtocolDecoder`]: the fixed 11-byte IMU frame protocol
//! - [`MultiFormatDecoder`]: CSV, JSON or fixed-size binary records, with
//!   the format configured or detected from the first input
//!
//! Every decode call returns zero or more complete [`StructuredRecord`]s.
//! Partial input stays buffered inside the decoder until it completes.

pub mod binary_protocol;
pub mod config;
pub mod decoder;
pub mod error;
pub mod format;
pub mod input;
pub mod mapping;
pub mod record;
pub mod stats;

pub use binary_protocol::BinaryProtocolDecoder;
pub use config::{
    BinaryProtocolConfig, DecoderConfig, DecoderLimits, Format, MultiFormatConfig, ValueType,
};
pub use decoder::{Decode, Decoder};
pub use error::{ConfigError, DecodeError, Result};
pub use format::{detect_format, Detected, MultiFormatDecoder};
pub use input::Input;
pub use mapping::{map_object, map_row, FieldMapping, MapReport, MAX_MAPPING_DEPTH};
pub use record::{Axes, FieldValue, Orientation, StructuredRecord, WellKnownField};
pub use stats::DecoderStats;
