//! Runtime configuration for the conditioning pipeline and the calibration store.
//!
//! These are separate from the TOML-deserialized config in `scale_config`;
//! see `conversions` for the mapping. Defaults are the firmware constants.

/// Median-of-three prefilter followed by an EMA.
#[derive(Debug, Clone)]
pub struct FilterCfg {
    /// EMA smoothing factor. Range: (0.0, 1.0].
    pub ema_alpha: f64,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self { ema_alpha: 0.3 }
    }
}

/// Stability, overload, trend and display-freeze thresholds.
#[derive(Debug, Clone)]
pub struct StabilityCfg {
    pub window: usize,
    pub threshold_kg: f64,
    pub freeze_threshold_kg: f64,
    pub trend_threshold_kg: f64,
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

/// Sensor timing, fault threshold and per-operation sample counts.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    pub timeout_ms: u64,
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

#[derive(Debug, Clone)]
pub struct TareCfg {
    pub sane_max_kg: f64,
    /// Smart-start and checkpoint threshold on |weight - last_weight|.
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

#[derive(Debug, Clone)]
pub struct AutoZeroCfg {
    pub threshold_kg: f64,
    pub step_counts: i32,
    pub interval_ms: u64,
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

#[derive(Debug, Clone)]
pub struct PowerCfg {
    /// Active loop period and power-save polling slice.
    pub loop_delay_ms: u64,
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

/// Everything the conditioning pipeline needs.
#[derive(Debug, Clone, Default)]
pub struct PipelineCfg {
    pub filter: FilterCfg,
    pub stability: StabilityCfg,
    pub sensor: SensorCfg,
    pub tare: TareCfg,
    pub auto_zero: AutoZeroCfg,
    pub power: PowerCfg,
}

/// Calibration store layout and write policy.
#[derive(Debug, Clone)]
pub struct StoreCfg {
    pub slots: usize,
    /// Throttled saves are skipped until this much time has passed since the last write.
    pub min_interval_ms: u64,
    pub cal_factor_min: f32,
    pub cal_factor_max: f32,
    pub default_cal_factor: f32,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            slots: 4,
            min_interval_ms: 300_000,
            cal_factor_min: 1.0,
            cal_factor_max: 100_000.0,
            default_cal_factor: 2280.0,
        }
    }
}

impl StoreCfg {
    /// Clamp a calibration factor into the accepted range. `None` for NaN/Inf.
    pub fn clamp_cal_factor(&self, factor: f32) -> Option<f32> {
        factor
            .is_finite()
            .then(|| factor.clamp(self.cal_factor_min, self.cal_factor_max))
    }

    pub fn accepts_cal_factor(&self, factor: f32) -> bool {
        factor.is_finite() && (self.cal_factor_min..=self.cal_factor_max).contains(&factor)
    }
}
