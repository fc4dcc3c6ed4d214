use crate::config::Format;

/// Errors that abort a single decode call.
///
/// None of these poison the decoder: the next call proceeds normally.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("malformed JSON payload: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// The JSON payload parsed, but its top level is not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Text payload bytes are not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The decoder cannot interpret this kind of input in its current format.
    #[error("{format} decoder cannot accept {input} input")]
    UnsupportedInput { format: Format, input: &'static str },
}

/// Invalid decoder configuration, rejected at construction time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("invalid decoder config: {0}")]
    Json(#[from] serde_json::Error),

    /// A scale range must be a finite positive number.
    #[error("{name} must be a finite positive number, got {value}")]
    InvalidRange { name: &'static str, value: f64 },

    /// The binary record size does not fit the value type.
    #[error("binary record size {record_size} is not a positive multiple of {value_width}")]
    InvalidRecordLayout {
        record_size: usize,
        value_width: usize,
    },

    /// More positional fields than well-known record fields.
    #[error("binary field count {count} exceeds {max} positional fields")]
    TooManyPositionalFields { count: usize, max: usize },

    /// CSV delimiter must not be empty.
    #[error("CSV delimiter must not be empty")]
    EmptyDelimiter,

    /// The buffer cap must allow at least one record or frame.
    #[error("max buffer size {size} is smaller than one unit of {unit} bytes")]
    BufferTooSmall { size: usize, unit: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
