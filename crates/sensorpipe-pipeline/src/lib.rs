//! Concurrent per-sensor pipelines.
//!
//! A [`PipelineExecutor`] runs one sensor's data through ordered stages
//! (acquire, decode, process, analyze, emit, persist), one Tokio task per
//! stage, coupled by bounded channels. A full channel blocks the upstream
//! stage; that is the only flow control. Pipelines share no mutable state;
//! a [`PipelineRegistry`] owns any number of them.

pub mod config;
pub mod error;
pub mod executor;
pub mod registry;
pub mod stage;
pub mod status;

pub use config::{
    PipelineConfig, DEFAULT_JOIN_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_STAGE_TIMEOUT,
};
pub use error::{PipelineError, Result, StageError};
pub use executor::PipelineExecutor;
pub use registry::PipelineRegistry;
pub use stage::{from_fn, ChannelSource, FnStage, ReaderSource, RecordStage, Source, Stage};
pub use status::{PipelineState, PipelineStatus, QueueDepth, StageStatus};
