//! Human-readable error descriptions and structured JSON error formatting.

use scale_core::error::{BuildError, ScaleError, TareRejection};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLoadCell => {
                "What happened: No load cell was provided to the scale.\nLikely causes: The sensor driver failed to initialise or was not passed to the builder.\nHow to fix: Ensure the load cell is created and passed via with_load_cell(...).".to_string()
            }
            BuildError::MissingStorage => {
                "What happened: No storage device was provided to the scale.\nLikely causes: The EEPROM image could not be opened.\nHow to fix: Check the --image path or storage.image in the config.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return match se {
            ScaleError::SensorTimeout => "What happened: Load cell did not become ready in time.\nLikely causes: HX711 not wired correctly, no power/ground, or sensor.timeout_ms too low.\nHow to fix: Verify DT/SCK pins and power, and consider raising sensor.timeout_ms in the config.".to_string(),
            ScaleError::SensorInvalidReading => "What happened: Load cell returned a non-finite reading.\nLikely causes: A calibration factor of zero or a failing amplifier.\nHow to fix: Recalibrate with `scale calibrate --factor <F>` and check the wiring.".to_string(),
            ScaleError::TareRejected(r) => {
                let cause = match r {
                    TareRejection::OutputFaulted => "the sensor is in the error state",
                    TareRejection::SensorNotReady => "the sensor was not ready",
                    TareRejection::OutOfRange => "the current weight is beyond the tare limit",
                    TareRejection::SensorFailed => "the sensor failed while zeroing",
                };
                format!(
                    "What happened: Tare was rejected because {cause}.\nHow to fix: Clear the platter, wait for a stable reading, then tare again."
                )
            }
            ScaleError::Storage(msg) | ScaleError::StorageCorruption { reason: msg, .. } => format!(
                "What happened: Calibration storage problem ({msg}).\nLikely causes: Unwritable image file or damaged media.\nHow to fix: Run `scale inspect` to see which slots are valid."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") || lower.starts_with("parse config") {
        return format!(
            "What happened: The configuration file could not be loaded.\nDetails: {msg}\nHow to fix: Check the --config path and the TOML syntax."
        );
    }

    if lower.contains("must be") || lower.contains("must lie within") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("open storage image") {
        let cause = err.source().map(|s| format!(" Cause: {s}")).unwrap_or_default();
        return format!(
            "What happened: The storage image could not be opened.{cause}\nHow to fix: Check the --image path and its permissions."
        );
    }

    if lower.contains("open hx711") {
        return "What happened: Failed to initialise the HX711 pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 sensor, 4 storage, 5 configuration, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 5;
    }
    match err.downcast_ref::<ScaleError>() {
        Some(
            ScaleError::SensorTimeout | ScaleError::SensorInvalidReading | ScaleError::Sensor(_),
        ) => 3,
        Some(ScaleError::Storage(_) | ScaleError::StorageCorruption { .. }) => 4,
        Some(ScaleError::Config(_)) => 5,
        _ => {
            let lower = err.to_string().to_ascii_lowercase();
            if lower.contains("config") || lower.contains("must be") {
                5
            } else {
                1
            }
        }
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::SensorTimeout) => "SensorTimeout",
        Some(ScaleError::SensorInvalidReading) => "SensorInvalidReading",
        Some(ScaleError::Sensor(_)) => "Sensor",
        Some(ScaleError::TareRejected(_)) => "TareRejected",
        Some(ScaleError::UndoUnavailable) => "UndoUnavailable",
        Some(ScaleError::AutoZeroVerifyFailed) => "AutoZeroVerifyFailed",
        Some(ScaleError::StorageCorruption { .. } | ScaleError::Storage(_)) => "Storage",
        Some(ScaleError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
