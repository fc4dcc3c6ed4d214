use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Three-axis reading. Absent axes stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Axes {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Axes {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    fn merge_from(&mut self, other: &Axes) {
        self.x = other.x.or(self.x);
        self.y = other.y.or(self.y);
        self.z = other.z.or(self.z);
    }
}

/// Orientation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Orientation {
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
}

impl Orientation {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            roll: Some(roll),
            pitch: Some(pitch),
            yaw: Some(yaw),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roll.is_none() && self.pitch.is_none() && self.yaw.is_none()
    }

    fn merge_from(&mut self, other: &Orientation) {
        self.roll = other.roll.or(self.roll);
        self.pitch = other.pitch.or(self.pitch);
        self.yaw = other.yaw.or(self.yaw);
    }
}

/// Value kept in [`StructuredRecord::additional_values`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Parse text as an integer, then as a float.
    pub fn coerce(raw: &str) -> Option<FieldValue> {
        let raw = raw.trim();
        if let Ok(int) = raw.parse::<i64>() {
            return Some(FieldValue::Int(int));
        }
        raw.parse::<f64>().ok().map(FieldValue::Float)
    }

    /// Numeric view, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

/// Named slots of a [`StructuredRecord`] that mapping destinations and
/// positional binary values resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownField {
    Timestamp,
    Roll,
    Pitch,
    Yaw,
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
    MagX,
    MagY,
    MagZ,
}

impl WellKnownField {
    /// Order in which fixed-size binary records fill the record.
    pub const POSITIONAL: [WellKnownField; 10] = [
        WellKnownField::Timestamp,
        WellKnownField::Roll,
        WellKnownField::Pitch,
        WellKnownField::Yaw,
        WellKnownField::AccelX,
        WellKnownField::AccelY,
        WellKnownField::AccelZ,
        WellKnownField::GyroX,
        WellKnownField::GyroY,
        WellKnownField::GyroZ,
    ];

    pub const ALL: [WellKnownField; 13] = [
        WellKnownField::Timestamp,
        WellKnownField::Roll,
        WellKnownField::Pitch,
        WellKnownField::Yaw,
        WellKnownField::AccelX,
        WellKnownField::AccelY,
        WellKnownField::AccelZ,
        WellKnownField::GyroX,
        WellKnownField::GyroY,
        WellKnownField::GyroZ,
        WellKnownField::MagX,
        WellKnownField::MagY,
        WellKnownField::MagZ,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Roll => "roll",
            Self::Pitch => "pitch",
            Self::Yaw => "yaw",
            Self::AccelX => "accel_x",
            Self::AccelY => "accel_y",
            Self::AccelZ => "accel_z",
            Self::GyroX => "gyro_x",
            Self::GyroY => "gyro_y",
            Self::GyroZ => "gyro_z",
            Self::MagX => "mag_x",
            Self::MagY => "mag_y",
            Self::MagZ => "mag_z",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

/// Normalized output of every decoder.
///
/// Serializes to the nested shape
/// `{timestamp, orientation{roll,pitch,yaw}, acceleration{x,y,z},
/// angular_velocity{x,y,z}, magnetometer{x,y,z}, additional_values{..}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredRecord {
    pub timestamp: Option<f64>,
    pub orientation: Orientation,
    pub acceleration: Axes,
    pub angular_velocity: Axes,
    pub magnetometer: Axes,
    pub additional_values: BTreeMap<String, FieldValue>,
}

impl StructuredRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: WellKnownField, value: f64) {
        *self.slot_mut(field) = Some(value);
    }

    pub fn get(&self, field: WellKnownField) -> Option<f64> {
        match field {
            WellKnownField::Timestamp => self.timestamp,
            WellKnownField::Roll => self.orientation.roll,
            WellKnownField::Pitch => self.orientation.pitch,
            WellKnownField::Yaw => self.orientation.yaw,
            WellKnownField::AccelX => self.acceleration.x,
            WellKnownField::AccelY => self.acceleration.y,
            WellKnownField::AccelZ => self.acceleration.z,
            WellKnownField::GyroX => self.angular_velocity.x,
            WellKnownField::GyroY => self.angular_velocity.y,
            WellKnownField::GyroZ => self.angular_velocity.z,
            WellKnownField::MagX => self.magnetometer.x,
            WellKnownField::MagY => self.magnetometer.y,
            WellKnownField::MagZ => self.magnetometer.z,
        }
    }

    /// Insert into `additional_values`, replacing any previous value.
    pub fn insert_additional(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.additional_values.insert(key.into(), value.into());
    }

    /// True when no slot and no additional value is populated.
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none()
            && self.orientation.is_empty()
            && self.acceleration.is_empty()
            && self.angular_velocity.is_empty()
            && self.magnetometer.is_empty()
            && self.additional_values.is_empty()
    }

    /// Overlay every populated value of `other` onto `self`.
    pub fn merge_from(&mut self, other: &StructuredRecord) {
        self.timestamp = other.timestamp.or(self.timestamp);
        self.orientation.merge_from(&other.orientation);
        self.acceleration.merge_from(&other.acceleration);
        self.angular_velocity.merge_from(&other.angular_velocity);
        self.magnetometer.merge_from(&other.magnetometer);
        for (key, value) in &other.additional_values {
            self.additional_values.insert(key.clone(), value.clone());
        }
    }

    fn slot_mut(&mut self, field: WellKnownField) -> &mut Option<f64> {
        match field {
            WellKnownField::Timestamp => &mut self.timestamp,
            WellKnownField::Roll => &mut self.orientation.roll,
            WellKnownField::Pitch => &mut self.orientation.pitch,
            WellKnownField::Yaw => &mut self.orientation.yaw,
            WellKnownField::AccelX => &mut self.acceleration.x,
            WellKnownField::AccelY => &mut self.acceleration.y,
            WellKnownField::AccelZ => &mut self.acceleration.z,
            WellKnownField::GyroX => &mut self.angular_velocity.x,
            WellKnownField::GyroY => &mut self.angular_velocity.y,
            WellKnownField::GyroZ => &mut self.angular_velocity.z,
            WellKnownField::MagX => &mut self.magnetometer.x,
            WellKnownField::MagY => &mut self.magnetometer.y,
            WellKnownField::MagZ => &mut self.magnetometer.z,
        }
    }
}
