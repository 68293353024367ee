#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the scale firmware core.
//!
//! Every section is optional; a missing section or key falls back to the
//! firmware defaults, so an empty file is a valid configuration. `validate()`
//! rejects values the pipeline or the store cannot work with.
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            hx711_dt: 12,
            hx711_sck: 14,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterCfg {
    /// EMA smoothing factor applied after the median-of-three stage. Range: (0.0, 1.0].
    pub ema_alpha: f64,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self { ema_alpha: 0.3 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StabilityCfg {
    /// Ring size of recent filtered values.
    pub window: usize,
    /// Stable when max - min over the window is strictly below this.
    pub threshold_kg: f64,
    /// Frozen display is released once the rounded weight moves further than this.
    pub freeze_threshold_kg: f64,
    /// Per-cycle deadband for the trend indicator.
    pub trend_threshold_kg: f64,
    /// Absolute filtered weight above which the scale reports overload.
    pub overload_kg: f64,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            window: 8,
            threshold_kg: 0.03,
            freeze_threshold_kg: 0.02,
            trend_threshold_kg: 0.03,
            overload_kg: 5.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    /// Max time to wait for HX711 data-ready before counting a timeout.
    pub timeout_ms: u64,
    /// Consecutive failed reads before the output latches to Error.
    pub error_count_max: u8,
    pub samples_startup: u8,
    pub samples_read: u8,
    pub samples_tare: u8,
    pub samples_undo: u8,
    pub samples_verify: u8,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            error_count_max: 3,
            samples_startup: 10,
            samples_read: 3,
            samples_tare: 10,
            samples_undo: 5,
            samples_verify: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TareCfg {
    /// Tare is refused when |filtered| exceeds this.
    pub sane_max_kg: f64,
    /// Minimum change before the last committed weight is rewritten.
    pub weight_change_threshold_kg: f64,
}

impl Default for TareCfg {
    fn default() -> Self {
        Self {
            sane_max_kg: 500.0,
            weight_change_threshold_kg: 0.05,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AutoZeroCfg {
    /// Only weights displayed strictly below this are pulled toward zero.
    pub threshold_kg: f64,
    /// Offset correction per step, in raw counts.
    pub step_counts: i32,
    /// Minimum time between two corrections.
    pub interval_ms: u64,
    /// Consecutive qualifying cycles required before a correction.
    pub min_stable_cycles: u8,
}

impl Default for AutoZeroCfg {
    fn default() -> Self {
        Self {
            threshold_kg: 0.05,
            step_counts: 1,
            interval_ms: 3_000,
            min_stable_cycles: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageCfg {
    /// Host file backing the emulated EEPROM.
    pub image: PathBuf,
    /// Number of wear-leveling slots.
    pub slots: usize,
    /// Throttled saves are skipped until this much time has passed since the last write.
    pub min_interval_ms: u64,
    pub cal_factor_min: f32,
    pub cal_factor_max: f32,
    pub default_cal_factor: f32,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            image: PathBuf::from("var/scale_eeprom.bin"),
            slots: 4,
            min_interval_ms: 300_000,
            cal_factor_min: 1.0,
            cal_factor_max: 100_000.0,
            default_cal_factor: 2280.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PowerCfg {
    /// Main-loop period while the weight is changing; also the power-save slice.
    pub loop_delay_ms: u64,
    /// Main-loop period once the scale is idle.
    pub idle_loop_delay_ms: u64,
}

impl Default for PowerCfg {
    fn default() -> Self {
        Self {
            loop_delay_ms: 30,
            idle_loop_delay_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub filter: FilterCfg,
    pub stability: StabilityCfg,
    pub sensor: SensorCfg,
    pub tare: TareCfg,
    pub auto_zero: AutoZeroCfg,
    pub storage: StorageCfg,
    pub power: PowerCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn positive_finite(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Filter
        if !(self.filter.ema_alpha > 0.0 && self.filter.ema_alpha <= 1.0) {
            eyre::bail!("filter.ema_alpha must be in (0.0, 1.0]");
        }

        // Stability
        if self.stability.window < 2 {
            eyre::bail!("stability.window must be >= 2");
        }
        if self.stability.window > 64 {
            eyre::bail!("stability.window is unreasonably large (>64)");
        }
        if !positive_finite(self.stability.threshold_kg) {
            eyre::bail!("stability.threshold_kg must be > 0");
        }
        if !self.stability.freeze_threshold_kg.is_finite()
            || self.stability.freeze_threshold_kg < 0.0
        {
            eyre::bail!("stability.freeze_threshold_kg must be >= 0");
        }
        if !self.stability.trend_threshold_kg.is_finite()
            || self.stability.trend_threshold_kg < 0.0
        {
            eyre::bail!("stability.trend_threshold_kg must be >= 0");
        }
        if !positive_finite(self.stability.overload_kg) {
            eyre::bail!("stability.overload_kg must be > 0");
        }

        // Sensor
        if self.sensor.timeout_ms == 0 {
            eyre::bail!("sensor.timeout_ms must be >= 1");
        }
        if self.sensor.timeout_ms > 10_000 {
            eyre::bail!("sensor.timeout_ms is unreasonably large (>10s)");
        }
        if self.sensor.error_count_max == 0 {
            eyre::bail!("sensor.error_count_max must be >= 1");
        }
        for (name, n) in [
            ("samples_startup", self.sensor.samples_startup),
            ("samples_read", self.sensor.samples_read),
            ("samples_tare", self.sensor.samples_tare),
            ("samples_undo", self.sensor.samples_undo),
            ("samples_verify", self.sensor.samples_verify),
        ] {
            if n == 0 {
                eyre::bail!("sensor.{name} must be >= 1");
            }
        }

        // Tare
        if !positive_finite(self.tare.sane_max_kg) {
            eyre::bail!("tare.sane_max_kg must be > 0");
        }
        if !positive_finite(self.tare.weight_change_threshold_kg) {
            eyre::bail!("tare.weight_change_threshold_kg must be > 0");
        }

        // Auto-zero
        if !positive_finite(self.auto_zero.threshold_kg) {
            eyre::bail!("auto_zero.threshold_kg must be > 0");
        }
        if self.auto_zero.step_counts <= 0 {
            eyre::bail!("auto_zero.step_counts must be >= 1");
        }
        if self.auto_zero.min_stable_cycles == 0 {
            eyre::bail!("auto_zero.min_stable_cycles must be >= 1");
        }

        // Storage
        if self.storage.slots == 0 {
            eyre::bail!("storage.slots must be >= 1");
        }
        if self.storage.slots > 255 {
            eyre::bail!("storage.slots must be <= 255");
        }
        let (lo, hi, def) = (
            self.storage.cal_factor_min,
            self.storage.cal_factor_max,
            self.storage.default_cal_factor,
        );
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo < hi) {
            eyre::bail!("storage.cal_factor_min/max must be finite with 0 < min < max");
        }
        if !(lo..=hi).contains(&def) {
            eyre::bail!(
                "storage.default_cal_factor must lie within [cal_factor_min, cal_factor_max]"
            );
        }
        if self.storage.image.as_os_str().is_empty() {
            eyre::bail!("storage.image must not be empty");
        }

        // Power
        if self.power.loop_delay_ms == 0 {
            eyre::bail!("power.loop_delay_ms must be >= 1");
        }
        if self.power.idle_loop_delay_ms < self.power.loop_delay_ms {
            eyre::bail!("power.idle_loop_delay_ms must be >= power.loop_delay_ms");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
