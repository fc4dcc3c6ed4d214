use bytes::{BufMut, BytesMut};

use crate::buffer::FrameBuffer;

/// First byte of every frame.
pub const SYNC_BYTE: u8 = 0x55;

/// Frame size: sync (1) + type (1) + payload (8) + checksum (1).
pub const FRAME_LEN: usize = 11;

/// Payload size: three `i16` values + 2 reserved bytes.
pub const PAYLOAD_LEN: usize = 8;

const CHECKSUM_OFFSET: usize = FRAME_LEN - 1;

/// What a frame carries, selected by the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Acceleration = 0x51,
    AngularVelocity = 0x52,
    Orientation = 0x53,
    Magnetometer = 0x54,
}

impl FrameType {
    pub const ALL: [FrameType; 4] = [
        FrameType::Acceleration,
        FrameType::AngularVelocity,
        FrameType::Orientation,
        FrameType::Magnetometer,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x51 => Some(Self::Acceleration),
            0x52 => Some(Self::AngularVelocity),
            0x53 => Some(Self::Orientation),
            0x54 => Some(Self::Magnetometer),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Acceleration => "acceleration",
            Self::AngularVelocity => "angular_velocity",
            Self::Orientation => "orientation",
            Self::Magnetometer => "magnetometer",
        }
    }
}

/// One validated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    /// Raw signed readings, in x/y/z (or roll/pitch/yaw) order.
    pub values: [i16; 3],
    pub reserved: [u8; 2],
}

/// Why the scanner consumed bytes without producing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// Bytes before the next sync byte were dropped (the whole buffer if none).
    Skipped { bytes: usize },
    /// A sync byte was followed by an unknown type; one byte was dropped.
    UnknownType { type_byte: u8 },
    /// The checksum did not match; one byte was dropped.
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// Outcome of one scanning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    /// Not enough bytes buffered; wait for the next chunk.
    Incomplete,
    /// Some bytes were dropped to regain alignment; call again.
    Resync(Resync),
    /// A complete frame was consumed.
    Frame(Frame),
}

/// Sum of `bytes` modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encode one frame into the wire format.
///
/// ```text
/// ┌──────┬──────┬──────────┬──────────┬──────────┬──────────┬──────────┐
/// │ 0x55 │ type │ v0 (LE)  │ v1 (LE)  │ v2 (LE)  │ reserved │ checksum │
/// │ 1B   │ 1B   │ 2B       │ 2B       │ 2B       │ 2B       │ 1B       │
/// └──────┴──────┴──────────┴──────────┴──────────┴──────────┴──────────┘
/// ```
pub fn encode_frame(frame_type: FrameType, values: [i16; 3], dst: &mut BytesMut) {
    let start = dst.len();
    dst.reserve(FRAME_LEN);
    dst.put_u8(SYNC_BYTE);
    dst.put_u8(frame_type.as_byte());
    for value in values {
        dst.put_i16_le(value);
    }
    dst.put_slice(&[0, 0]);
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
}

/// Run one step of frame synchronization over `buf`.
///
/// Every step other than [`FrameStep::Incomplete`] consumes at least one
/// byte, so calling this until `Incomplete` always terminates. A failed
/// checksum only advances by one byte: a valid frame may start inside the
/// rejected one.
pub fn next_frame(buf: &mut FrameBuffer) -> FrameStep {
    if buf.is_empty() {
        return FrameStep::Incomplete;
    }

    if buf.get(0) != Some(SYNC_BYTE) {
        let skip = buf.scan_for(SYNC_BYTE).unwrap_or(buf.len());
        buf.discard(skip);
        return FrameStep::Resync(Resync::Skipped { bytes: skip });
    }

    if buf.len() < FRAME_LEN {
        return FrameStep::Incomplete;
    }

    let mut raw = [0u8; FRAME_LEN];
    raw.copy_from_slice(&buf.as_slice()[..FRAME_LEN]);

    let Some(frame_type) = FrameType::from_byte(raw[1]) else {
        buf.discard(1);
        return FrameStep::Resync(Resync::UnknownType { type_byte: raw[1] });
    };

    let expected = checksum(&raw[..CHECKSUM_OFFSET]);
    let actual = raw[CHECKSUM_OFFSET];
    if expected != actual {
        buf.discard(1);
        return FrameStep::Resync(Resync::ChecksumMismatch { expected, actual });
    }

    let values = [
        i16::from_le_bytes([raw[2], raw[3]]),
        i16::from_le_bytes([raw[4], raw[5]]),
        i16::from_le_bytes([raw[6], raw[7]]),
    ];
    buf.discard(FRAME_LEN);

    FrameStep::Frame(Frame {
        frame_type,
        values,
        reserved: [raw[8], raw[9]],
    })
}
