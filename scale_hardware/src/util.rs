use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `dt_high` until the HX711 pulls DT low (conversion ready).
///
/// Returns how long the wait took. Sleeps `poll` between checks so a missing
/// sensor costs at most `timeout` of wall time.
pub fn wait_data_ready(
    mut dt_high: impl FnMut() -> bool,
    timeout: Duration,
    poll: Duration,
) -> Result<Duration> {
    let start = Instant::now();
    while dt_high() {
        let waited = start.elapsed();
        if waited >= timeout {
            return Err(HwError::DataReadyTimeout(waited));
        }
        std::thread::sleep(poll);
    }
    Ok(start.elapsed())
}

/// Bounds check shared by the EEPROM backends.
#[inline]
pub fn check_range(addr: usize, len: usize, capacity: usize) -> Result<()> {
    match addr.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(HwError::OutOfRange {
            addr,
            len,
            capacity,
        }),
    }
}
