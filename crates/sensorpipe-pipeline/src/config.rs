use std::time::Duration;

/// Default capacity of every inter-stage queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default wait on an empty queue before a worker re-checks for stop.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound on waiting for workers to exit during shutdown.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Executor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Items each queue holds before the upstream stage blocks (at least 1).
    pub queue_capacity: usize,
    pub stage_timeout: Duration,
    pub join_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}
