use crate::config::Format;
use crate::input::Input;

/// Result of format detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detected {
    /// Never [`Format::Auto`].
    pub format: Format,
    /// Suggested CSV delimiter.
    pub delimiter: Option<&'static str>,
}

/// Guess the payload format from one input.
///
/// Objects and brace-wrapped text are JSON. Text containing a comma or a tab
/// is CSV, delimited by tab only when no comma appears. Anything else is
/// treated as binary records.
pub fn detect_format(input: &Input) -> Detected {
    let binary = Detected {
        format: Format::Binary,
        delimiter: None,
    };

    let text = match input {
        Input::Object(_) => {
            return Detected {
                format: Format::Json,
                delimiter: None,
            }
        }
        Input::Chunk(_) => return binary,
        Input::Text(text) => text.trim(),
    };

    if text.starts_with('{') && text.ends_with('}') {
        return Detected {
            format: Format::Json,
            delimiter: None,
        };
    }

    let has_comma = text.contains(',');
    let has_tab = text.contains('\t');
    if has_comma || has_tab {
        return Detected {
            format: Format::Csv,
            delimiter: Some(if has_tab && !has_comma { "\t" } else { "," }),
        };
    }

    binary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_json_text_and_objects() {
        assert_eq!(detect_format(&"  {\"a\": 1}\n".into()).format, Format::Json);
        assert_eq!(
            detect_format(&serde_json::Map::new().into()).format,
            Format::Json
        );
    }

    #[test]
    fn test_detects_csv_delimiters() {
        let comma = detect_format(&"a,b\tc".into());
        assert_eq!(comma.format, Format::Csv);
        assert_eq!(comma.delimiter, Some(","));

        let tab = detect_format(&"a\tb".into());
        assert_eq!(tab.delimiter, Some("\t"));
    }

    #[test]
    fn test_falls_back_to_binary() {
        assert_eq!(detect_format(&"plain".into()).format, Format::Binary);
        assert_eq!(detect_format(&vec![1u8, 2, 3].into()).format, Format::Binary);
    }
}
