use std::fmt;

use sensorpipe_decode::DecoderStats;

use crate::stage::Stage;

/// Executor lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PipelineState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    /// Terminal.
    Stopped = 3,
}

impl PipelineState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PipelineState::Created,
            1 => PipelineState::Running,
            2 => PipelineState::Stopping,
            _ => PipelineState::Stopped,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PipelineState::Created => "created",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Visible state of one stage worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub stage: Stage,
    /// Collaborator name, for record stages.
    pub handler: Option<String>,
    pub items_in: u64,
    pub items_out: u64,
    pub recoverable_errors: u64,
    pub last_error: Option<String>,
    /// Set when this stage stopped the pipeline.
    pub fatal: Option<String>,
    pub alive: bool,
}

impl StageStatus {
    pub(crate) fn new(stage: Stage, handler: Option<String>) -> Self {
        Self {
            stage,
            handler,
            items_in: 0,
            items_out: 0,
            recoverable_errors: 0,
            last_error: None,
            fatal: None,
            alive: false,
        }
    }
}

/// Items waiting in the queue between two stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepth {
    pub from: Stage,
    pub to: Stage,
    pub depth: usize,
    pub capacity: usize,
}

/// Point-in-time view of one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStatus {
    pub id: String,
    pub state: PipelineState,
    pub paused: bool,
    /// Configured stages in data-flow order.
    pub stages: Vec<StageStatus>,
    pub queues: Vec<QueueDepth>,
    pub decoder: DecoderStats,
}

impl PipelineStatus {
    pub fn stage(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn total_recoverable_errors(&self) -> u64 {
        self.stages.iter().map(|s| s.recoverable_errors).sum()
    }

    /// The stage that stopped the pipeline, if any.
    pub fn fatal(&self) -> Option<(Stage, &str)> {
        self.stages
            .iter()
            .find_map(|s| s.fatal.as_deref().map(|msg| (s.stage, msg)))
    }
}
