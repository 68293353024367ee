//! Hardware seams shared by the scale crates.
//!
//! The conditioning pipeline only ever talks to a [`LoadCell`], the calibration
//! store only ever talks to a [`Storage`] device, and both measure time through
//! a [`Clock`]. Concrete drivers live in `scale_hardware`.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type used at the trait boundary; mapped to typed errors in `scale_core`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Load-cell amplifier (HX711-class) as seen by the pipeline.
///
/// Readings are in calibrated units: `(raw_average - offset) / scale`.
pub trait LoadCell {
    /// Set the calibration factor (raw counts per unit).
    fn set_scale(&mut self, factor: f32);

    /// Set the raw zero offset.
    fn set_offset(&mut self, offset: i32);

    /// Current raw zero offset.
    fn offset(&self) -> i32;

    /// Native zeroing: average `samples` raw reads, adopt the result as the new
    /// offset and return it.
    fn tare(&mut self, samples: u8) -> Result<i32, BoxError>;

    /// Block until a conversion is ready or `timeout` elapses.
    fn wait_ready(&mut self, timeout: std::time::Duration) -> bool;

    /// Average `samples` reads in calibrated units. May yield NaN/Inf when the
    /// calibration factor or the conversion is bad.
    fn read_units(&mut self, samples: u8) -> Result<f64, BoxError>;

    fn power_down(&mut self);

    fn power_up(&mut self);
}

/// Byte-addressed persistent storage (emulated EEPROM / flash page).
///
/// Writes may be buffered until [`Storage::commit`].
pub trait Storage {
    /// Size of the device in bytes, fixed at construction.
    fn capacity(&self) -> usize;

    fn read(&mut self, addr: usize, buf: &mut [u8]) -> Result<(), BoxError>;

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), BoxError>;

    /// Flush pending writes to the medium.
    fn commit(&mut self) -> Result<(), BoxError>;
}

impl<T: LoadCell + ?Sized> LoadCell for Box<T> {
    fn set_scale(&mut self, factor: f32) {
        (**self).set_scale(factor);
    }
    fn set_offset(&mut self, offset: i32) {
        (**self).set_offset(offset);
    }
    fn offset(&self) -> i32 {
        (**self).offset()
    }
    fn tare(&mut self, samples: u8) -> Result<i32, BoxError> {
        (**self).tare(samples)
    }
    fn wait_ready(&mut self, timeout: std::time::Duration) -> bool {
        (**self).wait_ready(timeout)
    }
    fn read_units(&mut self, samples: u8) -> Result<f64, BoxError> {
        (**self).read_units(samples)
    }
    fn power_down(&mut self) {
        (**self).power_down();
    }
    fn power_up(&mut self) {
        (**self).power_up();
    }
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }
    fn read(&mut self, addr: usize, buf: &mut [u8]) -> Result<(), BoxError> {
        (**self).read(addr, buf)
    }
    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), BoxError> {
        (**self).write(addr, data)
    }
    fn commit(&mut self) -> Result<(), BoxError> {
        (**self).commit()
    }
}
