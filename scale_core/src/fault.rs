//! Consecutive-failure tracker for sensor reads.

/// `Normal` until a read fails, `Degraded(n)` while fewer than the threshold
/// consecutive reads failed, `Faulted` once the threshold is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultState {
    Normal,
    Degraded(u8),
    Faulted,
}

#[derive(Debug, Clone)]
pub struct FaultTracker {
    state: FaultState,
    threshold: u8,
}

impl FaultTracker {
    pub fn new(threshold: u8) -> Self {
        Self {
            state: FaultState::Normal,
            threshold: threshold.max(1),
        }
    }

    pub fn state(&self) -> FaultState {
        self.state
    }

    /// Record a failed read. Returns `true` on the transition into `Faulted`.
    pub fn record_failure(&mut self) -> bool {
        let failures = match self.state {
            FaultState::Normal => 1,
            FaultState::Degraded(n) => n.saturating_add(1),
            FaultState::Faulted => return false,
        };
        if failures >= self.threshold {
            self.state = FaultState::Faulted;
            true
        } else {
            self.state = FaultState::Degraded(failures);
            false
        }
    }

    /// Record a good read. Returns `true` when recovering from `Faulted`.
    pub fn record_success(&mut self) -> bool {
        let was_faulted = self.is_faulted();
        self.state = FaultState::Normal;
        was_faulted
    }

    pub fn is_faulted(&self) -> bool {
        self.state == FaultState::Faulted
    }

    /// No failure since the last good read.
    pub fn is_clear(&self) -> bool {
        self.state == FaultState::Normal
    }

    pub fn reset(&mut self) {
        self.state = FaultState::Normal;
    }
}
