//! Fixed-point centi-unit helpers.
//!
//! The display value is held in centi-units (`i32`, 1 cu = 0.01 kg) so that
//! freeze and auto-zero decisions compare integers instead of rounded floats.

/// Centi-units per display unit.
pub const CU_PER_UNIT: f64 = 100.0;

/// Quantize a floating-point weight to integer centi-units, rounding half away
/// from zero and clamping to the `i32` range. Non-finite values map to 0.
#[inline]
pub fn quantize_to_cu_i32(x: f64) -> i32 {
    if !x.is_finite() {
        return 0;
    }
    let scaled = (x * CU_PER_UNIT).round();
    if scaled >= f64::from(i32::MAX) {
        i32::MAX
    } else if scaled <= f64::from(i32::MIN) {
        i32::MIN
    } else {
        scaled as i32
    }
}

/// Convert centi-units back to display units.
#[inline]
pub fn cu_to_units(cu: i32) -> f64 {
    f64::from(cu) / CU_PER_UNIT
}

/// Absolute difference of two i32 values as u32 without overflow.
///
/// Uses 64-bit intermediates; for any `i32` inputs `|a - b| <= u32::MAX`.
#[inline]
pub fn abs_diff_i32_u32(a: i32, b: i32) -> u32 {
    let diff = i64::from(a) - i64::from(b);
    let mag = diff.unsigned_abs();
    debug_assert!(
        mag <= u64::from(u32::MAX),
        "abs_diff_i32_u32: magnitude out of u32 range: {mag}"
    );
    mag as u32
}
