//! Concrete load cells and storage devices for the scale core.
//!
//! - [`SimulatedLoadCell`]: deterministic HX711 model with fault injection.
//! - [`MemEeprom`] / [`FileEeprom`]: emulated EEPROM with commit semantics.
//! - `hx711::Hx711` (feature `hardware`, Linux): GPIO driver via `rppal`.

pub mod eeprom;
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;
pub mod sim;
pub mod util;

pub use eeprom::{ERASED, FileEeprom, MemEeprom};
pub use error::HwError;
pub use sim::{SimHandle, SimulatedLoadCell};
