use super::MultiFormatDecoder;
use crate::config::Format;
use crate::error::{DecodeError, Result};
use crate::input::Input;
use crate::mapping::map_row;
use crate::record::StructuredRecord;

impl MultiFormatDecoder {
    /// Text input is one or more complete lines. Byte chunks are line
    /// buffered, so a row split across chunks is decoded once complete.
    pub(super) fn decode_csv(&mut self, input: Input) -> Result<Vec<StructuredRecord>> {
        let lines: Vec<String> = match input {
            Input::Text(text) => text.lines().map(str::to_string).collect(),
            Input::Chunk(chunk) => self.take_lines(&chunk.data),
            Input::Object(_) => {
                return Err(DecodeError::UnsupportedInput {
                    format: Format::Csv,
                    input: "object",
                })
            }
        };

        Ok(lines
            .iter()
            .filter_map(|line| self.csv_row(line))
            .collect())
    }

    fn csv_row(&mut self, line: &str) -> Option<StructuredRecord> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return None;
        }

        let cells: Vec<&str> = line.split(self.delimiter.as_str()).map(str::trim).collect();

        if self.config.has_header && self.header.is_none() {
            tracing::debug!(columns = cells.len(), "read CSV header");
            self.header = Some(cells.iter().map(|c| c.to_string()).collect());
            return None;
        }

        let names: Vec<String> = (0..cells.len())
            .map(|i| match &self.header {
                Some(header) if i < header.len() => header[i].clone(),
                _ => format!("field{i}"),
            })
            .collect();

        let mut record = StructuredRecord::new();
        map_row(
            &self.mapping,
            names.iter().map(String::as_str).zip(cells.iter().copied()),
            &mut record,
        );
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Format, MultiFormatConfig};
    use crate::mapping::FieldMapping;
    use crate::record::FieldValue;
    use crate::MultiFormatDecoder;

    fn csv(has_header: bool, mapping: FieldMapping) -> MultiFormatDecoder {
        MultiFormatDecoder::new(MultiFormatConfig {
            format: Format::Csv,
            has_header,
            field_mapping: mapping,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_headerless_rows_use_positional_names() {
        let mut dec = csv(false, FieldMapping::from_pairs([("field0", "timestamp")]));

        let records = dec.decode("12.5,1,2,3".into()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, Some(12.5));
        assert_eq!(
            records[0].additional_values.get("field3"),
            Some(&FieldValue::Text("3".to_string()))
        );
    }

    #[test]
    fn test_header_persists_across_calls() {
        let mut dec = csv(true, FieldMapping::new());

        assert!(dec.decode("timestamp,roll,pitch".into()).unwrap().is_empty());
        let records = dec.decode("1,10,20\n2,11,21".into()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].timestamp, Some(2.0));
        assert_eq!(records[1].orientation.pitch, Some(21.0));
    }

    #[test]
    fn test_byte_chunks_are_line_buffered() {
        let mut dec = csv(true, FieldMapping::new());

        assert!(dec.decode(b"timestamp,yaw\n3,4".to_vec().into()).unwrap().is_empty());
        let records = dec.decode(b"5\n".to_vec().into()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, Some(3.0));
        assert_eq!(records[0].orientation.yaw, Some(45.0));
    }

    #[test]
    fn test_blank_lines_yield_nothing() {
        let mut dec = csv(false, FieldMapping::new());
        assert!(dec.decode("\n  \n".into()).unwrap().is_empty());
    }

    #[test]
    fn test_extra_cells_beyond_header_are_kept() {
        let mut dec = csv(true, FieldMapping::new());
        let records = dec.decode("timestamp\n1,extra".into()).unwrap();

        assert_eq!(
            records[0].additional_values.get("field1"),
            Some(&FieldValue::Text("extra".to_string()))
        );
    }

    #[test]
    fn test_non_numeric_mapped_cell_preserved() {
        let mut dec = csv(true, FieldMapping::new());
        let records = dec.decode("timestamp,roll\n1,level".into()).unwrap();

        assert_eq!(records[0].orientation.roll, None);
        assert_eq!(
            records[0].additional_values.get("roll"),
            Some(&FieldValue::Text("level".to_string()))
        );
    }

    #[test]
    fn test_object_input_rejected() {
        let mut dec = csv(true, FieldMapping::new());
        assert!(dec.decode(serde_json::Map::new().into()).is_err());
    }
}
