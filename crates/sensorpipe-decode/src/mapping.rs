//! Field mapping from decoded key/value data onto [`StructuredRecord`] slots.
//!
//! Source keys are dotted paths (`orientation.roll`). Destinations are either
//! a [`WellKnownField`] name or any other name, which lands in
//! `additional_values`. Nothing in the input is dropped: unmapped keys and
//! values that fail numeric coercion are preserved under their source path.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{FieldValue, StructuredRecord, WellKnownField};

/// Deepest object nesting the mapper will descend into.
pub const MAX_MAPPING_DEPTH: usize = 16;

/// Immutable source-path to destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Map<String, Value>",
    into = "BTreeMap<String, String>"
)]
pub struct FieldMapping {
    entries: BTreeMap<String, String>,
    /// Every strict dotted prefix of every entry, used to decide recursion.
    prefixes: BTreeSet<String>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let prefixes = entries
            .keys()
            .flat_map(|path| {
                path.match_indices('.')
                    .map(move |(idx, _)| path[..idx].to_string())
            })
            .collect();
        Self { entries, prefixes }
    }

    /// Identity mapping of every well-known field name.
    pub fn default_csv() -> Self {
        Self::from_pairs(WellKnownField::ALL.map(|field| (field.name(), field.name())))
    }

    /// Mapping for the nested JSON shape produced by [`StructuredRecord`]
    /// serialization. `gyroscope` is accepted as an alias of
    /// `angular_velocity`.
    pub fn default_json() -> Self {
        Self::from_pairs([
            ("timestamp", "timestamp"),
            ("orientation.roll", "roll"),
            ("orientation.pitch", "pitch"),
            ("orientation.yaw", "yaw"),
            ("acceleration.x", "accel_x"),
            ("acceleration.y", "accel_y"),
            ("acceleration.z", "accel_z"),
            ("angular_velocity.x", "gyro_x"),
            ("angular_velocity.y", "gyro_y"),
            ("angular_velocity.z", "gyro_z"),
            ("gyroscope.x", "gyro_x"),
            ("gyroscope.y", "gyro_y"),
            ("gyroscope.z", "gyro_z"),
            ("magnetometer.x", "mag_x"),
            ("magnetometer.y", "mag_y"),
            ("magnetometer.z", "mag_z"),
        ])
    }

    pub fn destination(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// True when some entry lies strictly below `path`.
    pub fn covers_prefix(&self, path: &str) -> bool {
        self.prefixes.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Accepts flat dotted keys, nested objects, or a mix of both.
impl TryFrom<Map<String, Value>> for FieldMapping {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut pairs = Vec::new();
        flatten_mapping(&map, "", 0, &mut pairs)?;
        Ok(Self::from_pairs(pairs))
    }
}

impl From<FieldMapping> for BTreeMap<String, String> {
    fn from(mapping: FieldMapping) -> Self {
        mapping.entries
    }
}

fn flatten_mapping(
    map: &Map<String, Value>,
    prefix: &str,
    depth: usize,
    out: &mut Vec<(String, String)>,
) -> Result<(), String> {
    if depth >= MAX_MAPPING_DEPTH {
        return Err(format!("field mapping nested deeper than {MAX_MAPPING_DEPTH}"));
    }
    for (key, value) in map {
        let path = join_path(prefix, key);
        match value {
            Value::String(dest) => out.push((path, dest.clone())),
            Value::Object(inner) => flatten_mapping(inner, &path, depth + 1, out)?,
            other => {
                return Err(format!(
                    "field mapping for '{path}' must be a string or object, got {}",
                    json_kind(other)
                ))
            }
        }
    }
    Ok(())
}

/// Counts from one mapping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapReport {
    /// Values written to a mapped destination.
    pub mapped: usize,
    /// Values kept under their source path (unmapped or uncoercible).
    pub preserved: usize,
    /// Mapped values that were not numeric.
    pub coercion_failures: usize,
}

/// Map a parsed JSON object onto `record`.
///
/// Nested objects are descended only when some mapping entry lies below
/// them; otherwise they are preserved whole as JSON text.
pub fn map_object(
    mapping: &FieldMapping,
    source: &Map<String, Value>,
    record: &mut StructuredRecord,
) -> MapReport {
    let mut report = MapReport::default();
    map_level(mapping, source, record, "", 0, &mut report);
    report
}

/// Map one flat row of named text cells onto `record`.
pub fn map_row<'a, I>(mapping: &FieldMapping, row: I, record: &mut StructuredRecord) -> MapReport
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut report = MapReport::default();
    for (column, raw) in row {
        match mapping.destination(column) {
            Some(dest) => match FieldValue::coerce(raw) {
                Some(value) => {
                    assign(record, dest, value);
                    report.mapped += 1;
                }
                None => {
                    record.insert_additional(column, raw);
                    report.coercion_failures += 1;
                    report.preserved += 1;
                }
            },
            None => {
                record.insert_additional(column, raw);
                report.preserved += 1;
            }
        }
    }
    report
}

fn map_level(
    mapping: &FieldMapping,
    source: &Map<String, Value>,
    record: &mut StructuredRecord,
    prefix: &str,
    depth: usize,
    report: &mut MapReport,
) {
    for (key, value) in source {
        let path = join_path(prefix, key);

        if let Value::Object(inner) = value {
            if mapping.covers_prefix(&path) {
                if depth + 1 < MAX_MAPPING_DEPTH {
                    map_level(mapping, inner, record, &path, depth + 1, report);
                } else {
                    tracing::warn!(
                        path = %path,
                        "mapping depth limit reached, keeping object as text"
                    );
                    preserve(record, path, value);
                    report.preserved += 1;
                }
                continue;
            }
        }

        match mapping.destination(&path) {
            Some(dest) => match coerce_json(value) {
                Some(number) => {
                    assign(record, dest, number);
                    report.mapped += 1;
                }
                None => {
                    preserve(record, path, value);
                    report.coercion_failures += 1;
                    report.preserved += 1;
                }
            },
            None => {
                preserve(record, path, value);
                report.preserved += 1;
            }
        }
    }
}

fn assign(record: &mut StructuredRecord, dest: &str, value: FieldValue) {
    match (WellKnownField::from_name(dest), value.as_f64()) {
        (Some(field), Some(number)) => record.set(field, number),
        _ => record.insert_additional(dest, value),
    }
}

fn preserve(record: &mut StructuredRecord, path: String, value: &Value) {
    let value = match value {
        Value::Number(n) => match n.as_i64() {
            Some(int) => FieldValue::Int(int),
            None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => FieldValue::Text(s.clone()),
        other => FieldValue::Text(other.to_string()),
    };
    record.insert_additional(path, value);
}

/// Integer first, then float. Numeric strings are accepted.
fn coerce_json(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Int)
            .or_else(|| n.as_f64().map(FieldValue::Float)),
        Value::String(s) => FieldValue::coerce(s),
        _ => None,
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
