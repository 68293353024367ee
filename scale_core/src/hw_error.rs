//! Maps `Box<dyn Error>` from trait boundaries to typed `ScaleError`.
//!
//! The traits in `scale_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `scale_hardware::HwError` downcasting.

use crate::error::ScaleError;

/// Map a sensor-side trait-boundary error to a typed `ScaleError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    #[cfg(feature = "hardware-errors")]
    {
        use scale_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::DataReadyTimeout(_) | HwError::PoweredDown => {
                    ScaleError::SensorTimeout
                }
                other => ScaleError::Sensor(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        ScaleError::SensorTimeout
    } else {
        ScaleError::Sensor(s)
    }
}

/// Map a storage-side trait-boundary error. Storage faults never mean a timeout.
pub fn map_storage_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    ScaleError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_errors_fall_back_to_message() {
        let e = std::io::Error::other("read timeout on dt pin");
        assert_eq!(map_hw_error(&e), ScaleError::SensorTimeout);
        let e = std::io::Error::other("bus glitch");
        assert_eq!(map_hw_error(&e), ScaleError::Sensor("bus glitch".into()));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_errors_are_downcast() {
        use scale_hardware::error::HwError;
        assert_eq!(map_hw_error(&HwError::PoweredDown), ScaleError::SensorTimeout);
        assert!(matches!(
            map_hw_error(&HwError::Gpio("x".into())),
            ScaleError::Sensor(_)
        ));
    }
}
