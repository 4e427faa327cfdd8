use barrage_core::ScheduleError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("either \"gun\" or \"instance\" implementation must be provided")]
    NoImplementation,

    #[error("rps load scheduling requires a gun implementation")]
    NoGun,

    #[error("instance load scheduling requires an instance implementation")]
    NoInstance,

    #[error("invalid label name \"{0}\", must match [a-zA-Z_][a-zA-Z0-9_]*")]
    InvalidLabels(String),

    #[error("Generator is already running")]
    AlreadyRunning,

    #[error("Generator must be run from within a tokio runtime")]
    NoRuntime,
}
