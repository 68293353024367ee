//! Stability window, trend classification and display freeze.

use std::collections::VecDeque;

use crate::fixed_point::abs_diff_i32_u32;
use crate::status::Trend;

/// Ring of the most recent filtered weights.
///
/// Stable means at least two entries and `max - min` strictly below the
/// threshold.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    buf: VecDeque<f64>,
    cap: usize,
}

impl StabilityWindow {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, x: f64) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(x);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// `max - min` over the window, `None` with fewer than two entries.
    pub fn spread(&self) -> Option<f64> {
        if self.buf.len() < 2 {
            return None;
        }
        let (lo, hi) = self
            .buf
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        Some(hi - lo)
    }

    pub fn is_stable(&self, threshold: f64) -> bool {
        self.spread().is_some_and(|s| s < threshold)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Classify the per-cycle change against a symmetric deadband.
#[inline]
pub fn classify_trend(delta: f64, deadband: f64) -> Trend {
    if delta > deadband {
        Trend::Up
    } else if delta < -deadband {
        Trend::Down
    } else {
        Trend::Flat
    }
}

/// Display freeze.
///
/// While unfrozen the display follows every rounded value and freezes on the
/// first stable cycle. While frozen it only moves once the rounded value
/// differs from the frozen one by more than the threshold, which also unfreezes.
#[derive(Debug, Clone)]
pub struct Freeze {
    threshold_cu: u32,
    frozen: Option<i32>,
}

impl Freeze {
    pub fn new(threshold_cu: u32) -> Self {
        Self {
            threshold_cu,
            frozen: None,
        }
    }

    /// Feed this cycle's rounded weight; returns the value to display.
    pub fn update(&mut self, rounded_cu: i32, current_display_cu: i32, stable: bool) -> i32 {
        match self.frozen {
            Some(f) => {
                if abs_diff_i32_u32(rounded_cu, f) > self.threshold_cu {
                    self.frozen = None;
                    rounded_cu
                } else {
                    current_display_cu
                }
            }
            None => {
                if stable {
                    self.frozen = Some(rounded_cu);
                }
                rounded_cu
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn release(&mut self) {
        self.frozen = None;
    }
}
