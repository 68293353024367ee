use thiserror::Error;

/// Faults raised by the sensor and storage backends.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio: {0}")]
    Gpio(String),
    /// DT never went low inside the wait budget.
    #[error("load cell data-ready timeout after {0:?}")]
    DataReadyTimeout(std::time::Duration),
    #[error("load cell is powered down")]
    PoweredDown,
    #[error("storage access out of range: addr={addr} len={len} capacity={capacity}")]
    OutOfRange {
        addr: usize,
        len: usize,
        capacity: usize,
    },
    #[error("storage image: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
