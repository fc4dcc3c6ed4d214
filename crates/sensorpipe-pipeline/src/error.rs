use sensorpipe_decode::ConfigError;

use crate::stage::Stage;

/// Failure reported by a stage collaborator for one item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// Logged and counted; the stage moves on to its next item.
    #[error("{0}")]
    Recoverable(String),

    /// Stops the whole pipeline.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl StageError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        StageError::Recoverable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        StageError::Fatal(message.into())
    }
}

/// Pipeline lifecycle and registry errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline '{0}' was already started")]
    AlreadyStarted(String),

    #[error("pipeline '{0}' is not running")]
    NotRunning(String),

    /// Workers still running when the join deadline passed. They were aborted.
    #[error("stage workers did not exit within the join timeout: {stages:?}")]
    JoinTimeout { stages: Vec<Stage> },

    #[error("stage workers panicked: {stages:?}")]
    WorkerPanicked { stages: Vec<Stage> },

    /// A fatal stage error stopped the pipeline.
    #[error("{stage} stage failed: {message}")]
    StageFailed { stage: Stage, message: String },

    #[error("pipeline '{0}' is already registered")]
    DuplicatePipeline(String),

    #[error("no pipeline named '{0}'")]
    UnknownPipeline(String),

    #[error("pipeline '{0}' is still running")]
    StillRunning(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
