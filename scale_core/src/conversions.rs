//! `From` implementations bridging `scale_config` types to `scale_core` types.

use crate::config::{
    AutoZeroCfg, FilterCfg, PipelineCfg, PowerCfg, SensorCfg, StabilityCfg, StoreCfg, TareCfg,
};

// ── FilterCfg ────────────────────────────────────────────────────────────────

impl From<&scale_config::FilterCfg> for FilterCfg {
    fn from(c: &scale_config::FilterCfg) -> Self {
        Self {
            ema_alpha: c.ema_alpha,
        }
    }
}

// ── StabilityCfg ─────────────────────────────────────────────────────────────

impl From<&scale_config::StabilityCfg> for StabilityCfg {
    fn from(c: &scale_config::StabilityCfg) -> Self {
        Self {
            window: c.window,
            threshold_kg: c.threshold_kg,
            freeze_threshold_kg: c.freeze_threshold_kg,
            trend_threshold_kg: c.trend_threshold_kg,
            overload_kg: c.overload_kg,
        }
    }
}

// ── SensorCfg ────────────────────────────────────────────────────────────────

impl From<&scale_config::SensorCfg> for SensorCfg {
    fn from(c: &scale_config::SensorCfg) -> Self {
        Self {
            timeout_ms: c.timeout_ms,
            error_count_max: c.error_count_max,
            samples_startup: c.samples_startup,
            samples_read: c.samples_read,
            samples_tare: c.samples_tare,
            samples_undo: c.samples_undo,
            samples_verify: c.samples_verify,
        }
    }
}

// ── TareCfg / AutoZeroCfg / PowerCfg ─────────────────────────────────────────

impl From<&scale_config::TareCfg> for TareCfg {
    fn from(c: &scale_config::TareCfg) -> Self {
        Self {
            sane_max_kg: c.sane_max_kg,
            weight_change_threshold_kg: c.weight_change_threshold_kg,
        }
    }
}

impl From<&scale_config::AutoZeroCfg> for AutoZeroCfg {
    fn from(c: &scale_config::AutoZeroCfg) -> Self {
        Self {
            threshold_kg: c.threshold_kg,
            step_counts: c.step_counts,
            interval_ms: c.interval_ms,
            min_stable_cycles: c.min_stable_cycles,
        }
    }
}

impl From<&scale_config::PowerCfg> for PowerCfg {
    fn from(c: &scale_config::PowerCfg) -> Self {
        Self {
            loop_delay_ms: c.loop_delay_ms,
            idle_loop_delay_ms: c.idle_loop_delay_ms,
        }
    }
}

// ── Aggregates ───────────────────────────────────────────────────────────────

impl From<&scale_config::Config> for PipelineCfg {
    fn from(c: &scale_config::Config) -> Self {
        Self {
            filter: (&c.filter).into(),
            stability: (&c.stability).into(),
            sensor: (&c.sensor).into(),
            tare: (&c.tare).into(),
            auto_zero: (&c.auto_zero).into(),
            power: (&c.power).into(),
        }
    }
}

impl From<&scale_config::StorageCfg> for StoreCfg {
    fn from(c: &scale_config::StorageCfg) -> Self {
        Self {
            slots: c.slots,
            min_interval_ms: c.min_interval_ms,
            cal_factor_min: c.cal_factor_min,
            cal_factor_max: c.cal_factor_max,
            default_cal_factor: c.default_cal_factor,
        }
    }
}
