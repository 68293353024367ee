//! Pipeline outputs published after every cycle.

use crate::fixed_point::cu_to_units;

/// Weight output; `Error` is sticky until the sensor recovers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    Value(f64),
    Error,
}

impl Measurement {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Error => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Flat,
    Down,
}

/// Snapshot of everything the display and battery collaborators consume.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleStatus {
    pub weight: Measurement,
    /// Rounded (and possibly frozen) weight in centi-units; `None` while in error.
    pub display_cu: Option<i32>,
    pub session_delta: f64,
    pub stable: bool,
    pub frozen: bool,
    pub overloaded: bool,
    pub idle: bool,
    pub trend: Trend,
    pub auto_zero_enabled: bool,
    pub undo_available: bool,
}

impl ScaleStatus {
    /// Display value in units (kg).
    pub fn display(&self) -> Measurement {
        match self.display_cu {
            Some(cu) => Measurement::Value(cu_to_units(cu)),
            None => Measurement::Error,
        }
    }
}
