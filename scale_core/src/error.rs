use thiserror::Error;

/// Why a tare command was refused. Nothing is mutated in any of these cases.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TareRejection {
    #[error("weight output is in the error state")]
    OutputFaulted,
    #[error("sensor not ready")]
    SensorNotReady,
    #[error("weight estimate outside the sane range")]
    OutOfRange,
    #[error("sensor zeroing failed")]
    SensorFailed,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaleError {
    #[error("timeout waiting for sensor")]
    SensorTimeout,
    #[error("sensor returned a non-finite reading")]
    SensorInvalidReading,
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("tare rejected: {0}")]
    TareRejected(TareRejection),
    #[error("nothing to undo")]
    UndoUnavailable,
    #[error("auto-zero verification read failed; offset reverted")]
    AutoZeroVerifyFailed,
    #[error("slot {slot} corrupt: {reason}")]
    StorageCorruption { slot: usize, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing load cell")]
    MissingLoadCell,
    #[error("missing storage")]
    MissingStorage,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
