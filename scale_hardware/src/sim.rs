//! Simulated load cell.
//!
//! Models an HX711 behind a bar load cell: a mechanical zero in raw counts, a
//! sensitivity in counts per kg, optional deterministic noise, and a handle
//! that lets a test or demo change the load and inject faults while the
//! pipeline owns the cell.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use scale_traits::{BoxError, LoadCell};

use crate::error::HwError;

#[derive(Debug)]
struct SimState {
    load_kg: f64,
    zero_counts: i32,
    counts_per_kg: f64,
    noise_counts: u32,
    rng: u32,
    pending_timeouts: u32,
    pending_invalid: u32,
    stuck: bool,
    powered: bool,
    conversions: u64,
}

impl SimState {
    fn next_noise(&mut self) -> i64 {
        if self.noise_counts == 0 {
            return 0;
        }
        let mut x = self.rng.max(1);
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let span = u64::from(self.noise_counts) * 2 + 1;
        (u64::from(x) % span) as i64 - i64::from(self.noise_counts)
    }

    fn raw(&mut self) -> i64 {
        self.conversions += 1;
        let ideal = f64::from(self.zero_counts) + self.load_kg * self.counts_per_kg;
        ideal.round() as i64 + self.next_noise()
    }
}

/// Shared control surface for a [`SimulatedLoadCell`].
#[derive(Debug, Clone)]
pub struct SimHandle(Rc<RefCell<SimState>>);

impl SimHandle {
    /// Put `kg` on the platter.
    pub fn set_load(&self, kg: f64) {
        self.0.borrow_mut().load_kg = kg;
    }

    pub fn load(&self) -> f64 {
        self.0.borrow().load_kg
    }

    /// Shift the mechanical zero (creep, temperature drift).
    pub fn set_zero_counts(&self, counts: i32) {
        self.0.borrow_mut().zero_counts = counts;
    }

    /// The next `n` readiness checks time out.
    pub fn inject_timeouts(&self, n: u32) {
        self.0.borrow_mut().pending_timeouts = n;
    }

    /// The next `n` reads return NaN.
    pub fn inject_invalid(&self, n: u32) {
        self.0.borrow_mut().pending_invalid = n;
    }

    /// Data-ready never asserts while set (unplugged amplifier).
    pub fn set_stuck(&self, stuck: bool) {
        self.0.borrow_mut().stuck = stuck;
    }

    pub fn is_powered(&self) -> bool {
        self.0.borrow().powered
    }

    /// Number of raw conversions clocked out so far.
    pub fn conversions(&self) -> u64 {
        self.0.borrow().conversions
    }
}

/// HX711 stand-in used by the CLI and the tests.
#[derive(Debug)]
pub struct SimulatedLoadCell {
    state: Rc<RefCell<SimState>>,
    offset: i32,
    scale: f32,
}

impl Default for SimulatedLoadCell {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLoadCell {
    /// Default rig: zero at 84 000 counts, 2280 counts per kg, no noise.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState {
                load_kg: 0.0,
                zero_counts: 84_000,
                counts_per_kg: 2280.0,
                noise_counts: 0,
                rng: 0x2545_F491,
                pending_timeouts: 0,
                pending_invalid: 0,
                stuck: false,
                powered: true,
                conversions: 0,
            })),
            offset: 0,
            scale: 1.0,
        }
    }

    pub fn with_sensitivity(self, counts_per_kg: f64) -> Self {
        self.state.borrow_mut().counts_per_kg = counts_per_kg;
        self
    }

    /// Uniform noise of ±`counts` from a seeded xorshift generator.
    pub fn with_noise(self, counts: u32, seed: u32) -> Self {
        {
            let mut s = self.state.borrow_mut();
            s.noise_counts = counts;
            s.rng = seed.max(1);
        }
        self
    }

    pub fn with_load(self, kg: f64) -> Self {
        self.state.borrow_mut().load_kg = kg;
        self
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle(Rc::clone(&self.state))
    }

    fn average_raw(&mut self, samples: u8) -> Result<f64, HwError> {
        let mut s = self.state.borrow_mut();
        if !s.powered {
            return Err(HwError::PoweredDown);
        }
        let n = samples.max(1);
        let sum: i64 = (0..n).map(|_| s.raw()).sum();
        Ok(sum as f64 / f64::from(n))
    }
}

impl LoadCell for SimulatedLoadCell {
    fn set_scale(&mut self, factor: f32) {
        self.scale = factor;
    }

    fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    fn offset(&self) -> i32 {
        self.offset
    }

    fn tare(&mut self, samples: u8) -> Result<i32, BoxError> {
        let avg = self.average_raw(samples)?;
        self.offset = avg.round() as i32;
        tracing::debug!(offset = self.offset, "sim tare");
        Ok(self.offset)
    }

    fn wait_ready(&mut self, _timeout: Duration) -> bool {
        let mut s = self.state.borrow_mut();
        if !s.powered || s.stuck {
            return false;
        }
        if s.pending_timeouts > 0 {
            s.pending_timeouts -= 1;
            return false;
        }
        true
    }

    fn read_units(&mut self, samples: u8) -> Result<f64, BoxError> {
        {
            let mut s = self.state.borrow_mut();
            if s.powered && s.pending_invalid > 0 {
                s.pending_invalid -= 1;
                return Ok(f64::NAN);
            }
        }
        let avg = self.average_raw(samples)?;
        Ok((avg - f64::from(self.offset)) / f64::from(self.scale))
    }

    fn power_down(&mut self) {
        self.state.borrow_mut().powered = false;
    }

    fn power_up(&mut self) {
        self.state.borrow_mut().powered = true;
    }
}
