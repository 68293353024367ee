//! Small timing and index helpers shared by the pipeline and the store.

/// `true` once at least `period_ms` has passed between `since_ms` and `now_ms`.
/// A `since_ms` in the future counts as no time elapsed.
#[inline]
pub fn elapsed_at_least(now_ms: u64, since_ms: u64, period_ms: u64) -> bool {
    now_ms.saturating_sub(since_ms) >= period_ms
}

/// Next index in a ring of `count` entries; 0 for an empty ring.
#[inline]
pub fn wrap_next(current: usize, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    (current + 1) % count
}

/// Wraparound-safe "a is newer than b" for 8-bit sequence numbers: `a` is
/// ahead of `b` by 1..=127 steps.
#[inline]
pub fn seq_newer(a: u8, b: u8) -> bool {
    let d = a.wrapping_sub(b);
    d != 0 && d < 128
}
