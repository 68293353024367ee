//! Test and helper load cells for scale_core.

use std::collections::VecDeque;
use std::time::Duration;

use scale_traits::{BoxError, LoadCell};

/// A load cell that is never ready; useful for exercising the fault paths
/// and for storage-only tools that must not touch a sensor.
#[derive(Debug, Default)]
pub struct NullCell {
    offset: i32,
}

impl LoadCell for NullCell {
    fn set_scale(&mut self, _factor: f32) {}

    fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    fn offset(&self) -> i32 {
        self.offset
    }

    fn tare(&mut self, _samples: u8) -> Result<i32, BoxError> {
        Err(Box::new(std::io::Error::other("null cell")))
    }

    fn wait_ready(&mut self, _timeout: Duration) -> bool {
        false
    }

    fn read_units(&mut self, _samples: u8) -> Result<f64, BoxError> {
        Err(Box::new(std::io::Error::other("null cell")))
    }

    fn power_down(&mut self) {}

    fn power_up(&mut self) {}
}

/// One scripted sensor response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// `wait_ready` succeeds and `read_units` returns this value (NaN allowed).
    Units(f64),
    /// `wait_ready` fails.
    NotReady,
    /// `wait_ready` succeeds but `read_units` errors.
    Fails,
}

/// A load cell that replays a script of readings, then repeats `idle`.
///
/// Offset and scale are recorded but do not affect the values; tests assert
/// on them directly.
#[derive(Debug)]
pub struct ScriptedCell {
    script: VecDeque<Reading>,
    idle: Reading,
    current: Option<Reading>,
    offset: i32,
    scale: f32,
    tare_result: Option<i32>,
    powered: bool,
}

impl ScriptedCell {
    pub fn new(script: impl IntoIterator<Item = Reading>) -> Self {
        Self {
            script: script.into_iter().collect(),
            idle: Reading::Units(0.0),
            current: None,
            offset: 0,
            scale: 1.0,
            tare_result: Some(0),
            powered: true,
        }
    }

    /// Steady reading once the script runs out.
    pub fn with_idle(mut self, idle: Reading) -> Self {
        self.idle = idle;
        self
    }

    /// Offset returned by `tare`; `None` makes zeroing fail.
    pub fn with_tare_result(mut self, result: Option<i32>) -> Self {
        self.tare_result = result;
        self
    }

    pub fn push(&mut self, r: Reading) {
        self.script.push_back(r);
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    fn next(&mut self) -> Reading {
        self.script.pop_front().unwrap_or(self.idle)
    }
}

impl LoadCell for ScriptedCell {
    fn set_scale(&mut self, factor: f32) {
        self.scale = factor;
    }

    fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    fn offset(&self) -> i32 {
        self.offset
    }

    fn tare(&mut self, _samples: u8) -> Result<i32, BoxError> {
        match self.tare_result {
            Some(o) => {
                self.offset = o;
                Ok(o)
            }
            None => {
                // Zeroing may clobber the offset before failing.
                self.offset = i32::MIN;
                Err(Box::new(std::io::Error::other("scripted tare failure")))
            }
        }
    }

    fn wait_ready(&mut self, _timeout: Duration) -> bool {
        let r = self.next();
        self.current = Some(r);
        !matches!(r, Reading::NotReady)
    }

    fn read_units(&mut self, _samples: u8) -> Result<f64, BoxError> {
        match self.current.take().unwrap_or(self.idle) {
            Reading::Units(w) => Ok(w),
            Reading::NotReady | Reading::Fails => {
                Err(Box::new(std::io::Error::other("scripted read failure")))
            }
        }
    }

    fn power_down(&mut self) {
        self.powered = false;
    }

    fn power_up(&mut self) {
        self.powered = true;
    }
}
