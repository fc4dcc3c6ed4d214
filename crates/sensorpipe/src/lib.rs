//! Sensor telemetry from raw bytes to structured records.
//!
//! sensorpipe accumulates transport chunks, decodes them (a fixed 11-byte IMU
//! frame protocol, or CSV / JSON / fixed binary records) into structured
//! records, and runs each sensor through its own staged pipeline.
//!
//! # Crate Structure
//!
//! - [`frame`]: byte accumulation, frame scanning and chunked reading
//! - [`decode`]: structured records, field mapping and both decoders
//! - [`pipeline`]: per-sensor stage executor and registry (behind `pipeline` feature)

/// Re-export frame types.
pub mod frame {
    pub use sensorpipe_frame::*;
}

/// Re-export decoder types.
pub mod decode {
    pub use sensorpipe_decode::*;
}

/// Re-export pipeline types (requires `pipeline` feature).
#[cfg(feature = "pipeline")]
pub mod pipeline {
    pub use sensorpipe_pipeline::*;
}
