use std::sync::PoisonError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule type must be \"rps_schedule\" or \"instance_schedule\", got \"{0}\"")]
    InvalidScheduleType(String),

    #[error("from must be > 0")]
    InvalidStartFrom,

    #[error("both \"steps\" and \"step_duration\" must be defined in a schedule segment")]
    InvalidSteps,

    #[error("no schedule segments were provided")]
    NoSegments,

    #[error("schedule duration overflows")]
    DurationOverflow,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink rejected the entry: {0}")]
    Rejected(String),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Sink has been stopped")]
    Closed,

    #[error("Sink queue is full")]
    QueueFull,

    #[error("Sink Mutex is poisoned")]
    PoisonData,
}

impl<T> From<PoisonError<T>> for SinkError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}
