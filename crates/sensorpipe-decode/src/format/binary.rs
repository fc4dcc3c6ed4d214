use bytes::Bytes;

use super::MultiFormatDecoder;
use crate::config::Format;
use crate::error::{DecodeError, Result};
use crate::input::Input;
use crate::record::{StructuredRecord, WellKnownField};

impl MultiFormatDecoder {
    /// Fixed-size little-endian records. Every complete record in the
    /// buffer is decoded; a trailing partial record waits for more bytes.
    pub(super) fn decode_records(&mut self, input: Input) -> Result<Vec<StructuredRecord>> {
        let data = match input {
            Input::Chunk(chunk) => chunk.data,
            Input::Text(text) => Bytes::from(text.into_bytes()),
            Input::Object(_) => {
                return Err(DecodeError::UnsupportedInput {
                    format: Format::Binary,
                    input: "object",
                })
            }
        };
        self.append(&data);

        let size = self.config.binary_record_size;
        let mut records = Vec::new();
        while self.buffer.len() >= size {
            let raw = self.buffer.drain_prefix(size);
            records.push(self.binary_record(&raw));
        }
        Ok(records)
    }

    /// The first `binary_field_count` values fill well-known fields in
    /// [`WellKnownField::POSITIONAL`] order; the rest become `value_0`,
    /// `value_1`, ...
    fn binary_record(&self, raw: &[u8]) -> StructuredRecord {
        let value_type = self.config.binary_value_type;
        let positional = self.config.binary_field_count;

        let mut record = StructuredRecord::new();
        for (i, bytes) in raw.chunks_exact(value_type.width()).enumerate() {
            let value = value_type.read_le(bytes);
            match value.as_f64() {
                Some(number) if i < positional => {
                    record.set(WellKnownField::POSITIONAL[i], number)
                }
                _ => record.insert_additional(format!("value_{}", i - positional), value),
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Format, MultiFormatConfig, ValueType};
    use crate::record::FieldValue;
    use crate::MultiFormatDecoder;

    fn f32_record(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn binary(config: MultiFormatConfig) -> MultiFormatDecoder {
        MultiFormatDecoder::new(MultiFormatConfig {
            format: Format::Binary,
            ..config
        })
        .unwrap()
    }

    #[test]
    fn test_default_layout_fills_nine_fields() {
        let mut dec = binary(MultiFormatConfig::default());
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];

        let records = dec.decode(f32_record(&values).into()).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.timestamp, Some(1.0));
        assert_eq!(r.orientation.yaw, Some(4.0));
        assert_eq!(r.acceleration.z, Some(7.0));
        assert_eq!(r.angular_velocity.y, Some(9.0));
        assert_eq!(r.angular_velocity.z, None);
        assert!(r.additional_values.is_empty());
    }

    #[test]
    fn test_values_beyond_field_count_are_numbered() {
        let mut dec = binary(MultiFormatConfig {
            binary_record_size: 12,
            binary_field_count: 1,
            ..Default::default()
        });

        let records = dec.decode(f32_record(&[10.0, 0.5, 0.25]).into()).unwrap();

        let r = &records[0];
        assert_eq!(r.timestamp, Some(10.0));
        assert_eq!(r.additional_values.get("value_0"), Some(&FieldValue::Float(0.5)));
        assert_eq!(r.additional_values.get("value_1"), Some(&FieldValue::Float(0.25)));
    }

    #[test]
    fn test_partial_record_waits() {
        let mut dec = binary(MultiFormatConfig {
            binary_record_size: 4,
            binary_field_count: 2,
            binary_value_type: ValueType::I16,
            ..Default::default()
        });

        let mut wire = Vec::new();
        for v in [1i16, -2, 3, -4, 5] {
            wire.extend(v.to_le_bytes());
        }

        let records = dec.decode(wire[..7].to_vec().into()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].orientation.roll, Some(-2.0));

        let records = dec.decode(wire[7..].to_vec().into()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, Some(3.0));
        assert_eq!(dec.stats().records_decoded, 2);
    }
}
