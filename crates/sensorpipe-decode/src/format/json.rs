use serde_json::{Map, Value};

use super::MultiFormatDecoder;
use crate::error::{DecodeError, Result};
use crate::input::Input;
use crate::mapping::{json_kind, map_object};
use crate::record::StructuredRecord;

impl MultiFormatDecoder {
    /// Objects and text are one document each; a malformed document fails
    /// the call. Byte chunks are newline-delimited JSON, where a malformed
    /// line is counted and skipped.
    pub(super) fn decode_json(&mut self, input: Input) -> Result<Vec<StructuredRecord>> {
        match input {
            Input::Object(map) => Ok(vec![self.json_record(&map)]),
            Input::Text(text) => {
                let map = parse_object(&text)?;
                Ok(vec![self.json_record(&map)])
            }
            Input::Chunk(chunk) => {
                let mut records = Vec::new();
                for line in self.take_lines(&chunk.data) {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_object(&line) {
                        Ok(map) => records.push(self.json_record(&map)),
                        Err(err) => {
                            tracing::warn!(error = %err, "skipping JSON line");
                            self.stats.record_error(err.to_string());
                        }
                    }
                }
                Ok(records)
            }
        }
    }

    fn json_record(&self, map: &Map<String, Value>) -> StructuredRecord {
        let mut record = StructuredRecord::new();
        let report = map_object(&self.mapping, map, &mut record);
        if report.coercion_failures > 0 {
            tracing::debug!(
                failures = report.coercion_failures,
                "mapped JSON values were not numeric"
            );
        }
        record
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::NotAnObject(json_kind(&other))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::{Format, MultiFormatConfig};
    use crate::error::DecodeError;
    use crate::mapping::FieldMapping;
    use crate::record::FieldValue;
    use crate::MultiFormatDecoder;

    fn json_decoder(mapping: FieldMapping) -> MultiFormatDecoder {
        MultiFormatDecoder::new(MultiFormatConfig {
            format: Format::Json,
            field_mapping: mapping,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_unknown_nested_key_kept_with_prefix() {
        let mut dec = json_decoder(FieldMapping::from_pairs([("orientation.roll", "roll")]));

        let records = dec
            .decode(r#"{"orientation":{"roll":1.2,"unknown":9}}"#.into())
            .unwrap();

        assert_eq!(records[0].orientation.roll, Some(1.2));
        assert_eq!(
            records[0].additional_values.get("orientation.unknown"),
            Some(&FieldValue::Int(9))
        );
    }

    #[test]
    fn test_object_input_decoded_directly() {
        let mut dec = json_decoder(FieldMapping::new());
        let map = match json!({"acceleration": {"z": 9.81}}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };

        let records = dec.decode(map.into()).unwrap();
        assert_eq!(records[0].acceleration.z, Some(9.81));
    }

    #[test]
    fn test_malformed_text_is_an_error() {
        let mut dec = json_decoder(FieldMapping::new());
        assert!(matches!(
            dec.decode("{\"a\": ".into()),
            Err(DecodeError::MalformedJson(_))
        ));
        assert!(matches!(
            dec.decode("[1, 2]".into()),
            Err(DecodeError::NotAnObject("array"))
        ));
        assert_eq!(dec.stats().decode_errors, 2);
    }

    #[test]
    fn test_ndjson_chunks_skip_bad_lines() {
        let mut dec = json_decoder(FieldMapping::new());

        let records = dec
            .decode(b"{\"timestamp\": 1}\nnot json\n{\"timest".to_vec().into())
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(dec.stats().decode_errors, 1);

        let records = dec.decode(b"amp\": 2}\n".to_vec().into()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, Some(2.0));
    }
}
