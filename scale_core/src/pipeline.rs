//! The signal conditioning pipeline (`ConditioningPipeline`).
//!
//! One `update()` per main-loop iteration:
//! acquire → median-of-three → EMA → stability / overload / trend → freeze → auto-zero.
//!
//! Persisted state (offsets, factor, last weight, settings) lives in the
//! [`CalibrationStore`], which commands take by `&mut` so a tare or undo
//! updates the record and persists it in one call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use scale_traits::{Clock, LoadCell, Storage};

use crate::config::PipelineCfg;
use crate::error::{ScaleError, TareRejection};
use crate::fault::{FaultState, FaultTracker};
use crate::filter::{Ema, MedianOfThree};
use crate::fixed_point::quantize_to_cu_i32;
use crate::hw_error::map_hw_error;
use crate::record::Settings;
use crate::stability::{Freeze, StabilityWindow, classify_trend};
use crate::status::{Measurement, ScaleStatus, Trend};
use crate::store::{CalibrationStore, SaveOutcome};
use crate::util::elapsed_at_least;

pub struct ConditioningPipeline<L: LoadCell> {
    cell: L,
    cfg: PipelineCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,

    median: MedianOfThree,
    ema: Ema,
    window: StabilityWindow,
    freeze: Freeze,
    fault: FaultTracker,

    filtered: f64,
    output: Measurement,
    display_cu: Option<i32>,
    session_delta: f64,
    overloaded: bool,
    trend: Trend,
    prev_trend_weight: f64,

    auto_zero_enabled: bool,
    auto_zero_run: u8,
    last_auto_zero_ms: u64,
    auto_zero_threshold_cu: i32,

    undo_available: bool,
}

impl<L: LoadCell> core::fmt::Debug for ConditioningPipeline<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConditioningPipeline")
            .field("output", &self.output)
            .field("display_cu", &self.display_cu)
            .field("fault", &self.fault.state())
            .field("frozen", &self.freeze.is_frozen())
            .field("undo_available", &self.undo_available)
            .finish()
    }
}

impl<L: LoadCell> ConditioningPipeline<L> {
    /// Construct with empty filters. Call [`ConditioningPipeline::init`] before the first update.
    pub fn new(cell: L, cfg: PipelineCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        let freeze_cu = quantize_to_cu_i32(cfg.stability.freeze_threshold_kg).unsigned_abs();
        let auto_zero_threshold_cu = quantize_to_cu_i32(cfg.auto_zero.threshold_kg);
        Self {
            median: MedianOfThree::new(),
            ema: Ema::new(cfg.filter.ema_alpha),
            window: StabilityWindow::new(cfg.stability.window),
            freeze: Freeze::new(freeze_cu),
            fault: FaultTracker::new(cfg.sensor.error_count_max),
            filtered: 0.0,
            output: Measurement::Value(0.0),
            display_cu: Some(0),
            session_delta: 0.0,
            overloaded: false,
            trend: Trend::Flat,
            prev_trend_weight: 0.0,
            auto_zero_enabled: true,
            auto_zero_run: 0,
            last_auto_zero_ms: 0,
            auto_zero_threshold_cu,
            undo_available: false,
            cell,
            cfg,
            clock,
            epoch,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.cfg.sensor.timeout_ms)
    }

    fn set_error(&mut self) {
        self.output = Measurement::Error;
        self.display_cu = None;
    }

    /// Force filtered, displayed and published weight to `w`.
    fn reseed(&mut self, w: f64) {
        self.ema.seed(w);
        self.filtered = w;
        self.output = Measurement::Value(w);
        self.display_cu = Some(quantize_to_cu_i32(w));
    }

    /// Drop every sample-derived buffer so the next read starts fresh.
    fn clear_history(&mut self) {
        self.median.reset();
        self.window.clear();
        self.freeze.release();
        self.auto_zero_run = 0;
        self.trend = Trend::Flat;
    }

    /// Wait and read once, bypassing the fault tracker. `None` on timeout, error or NaN/Inf.
    fn read_finite(&mut self, samples: u8) -> Option<f64> {
        if !self.cell.wait_ready(self.sensor_timeout()) {
            return None;
        }
        self.cell.read_units(samples).ok().filter(|w| w.is_finite())
    }

    // ── Boot ─────────────────────────────────────────────────────────────────

    /// Apply the stored calibration to the sensor and seed the filters from a
    /// startup average. A startup weight that moved by more than the change
    /// threshold since the last session is persisted right away.
    pub fn init<S: Storage>(&mut self, store: &mut CalibrationStore<S>) -> Result<(), ScaleError> {
        let rec = store.record();
        self.cell.set_scale(rec.cal_factor);
        self.cell.set_offset(rec.tare_offset);
        self.auto_zero_enabled = rec.settings.auto_zero_on() && !rec.settings.tare_lock_on();
        self.last_auto_zero_ms = self.now_ms();

        if !self.cell.wait_ready(self.sensor_timeout()) {
            tracing::warn!("sensor not ready at startup");
            self.set_error();
            return Err(ScaleError::SensorTimeout);
        }
        let startup = match self.cell.read_units(self.cfg.sensor.samples_startup) {
            Ok(w) if w.is_finite() => w,
            Ok(_) => 0.0,
            Err(e) => {
                let err = map_hw_error(&*e);
                tracing::warn!(error = %err, "startup read failed");
                self.set_error();
                return Err(err);
            }
        };

        let last = f64::from(store.record().last_weight);
        self.session_delta = startup - last;
        if (startup - last).abs() > self.cfg.tare.weight_change_threshold_kg {
            store.record_mut().last_weight = startup as f32;
            let out = store.force_save();
            tracing::info!(startup, last, outcome = ?out, "weight changed while off");
        }

        self.reseed(startup);
        self.prev_trend_weight = startup;
        tracing::debug!(startup, session_delta = self.session_delta, "pipeline initialised");
        Ok(())
    }

    // ── Per-cycle stages ─────────────────────────────────────────────────────

    fn fail(&mut self, err: ScaleError) -> ScaleError {
        if self.fault.record_failure() {
            self.set_error();
            tracing::warn!(error = %err, "sensor faulted; output latched to error");
        } else {
            tracing::debug!(error = %err, state = ?self.fault.state(), "sensor read failed");
        }
        err
    }

    /// Bounded wait plus averaged read. Failures feed the fault tracker; the
    /// first good read after a fault clears every filter buffer.
    pub fn acquire(&mut self) -> Result<f64, ScaleError> {
        if !self.cell.wait_ready(self.sensor_timeout()) {
            return Err(self.fail(ScaleError::SensorTimeout));
        }
        let w = match self.cell.read_units(self.cfg.sensor.samples_read) {
            Ok(w) => w,
            Err(e) => {
                let err = map_hw_error(&*e);
                return Err(self.fail(err));
            }
        };
        if !w.is_finite() {
            return Err(self.fail(ScaleError::SensorInvalidReading));
        }
        if self.fault.record_success() {
            self.clear_history();
            self.ema.invalidate();
            tracing::info!("sensor recovered");
        }
        Ok(w)
    }

    /// Median-of-three then EMA. Returns the new filtered weight.
    pub fn condition(&mut self, sample: f64) -> f64 {
        let m = self.median.push(sample);
        let f = self.ema.update(m);
        self.filtered = f;
        self.output = Measurement::Value(f);
        f
    }

    /// Stability, overload, trend and display freeze for the current filtered weight.
    pub fn classify(&mut self) {
        let f = self.filtered;
        self.window.push(f);

        let over = f.abs() > self.cfg.stability.overload_kg;
        if over && !self.overloaded {
            tracing::warn!(weight = f, "overload");
        }
        self.overloaded = over;

        self.trend = classify_trend(
            f - self.prev_trend_weight,
            self.cfg.stability.trend_threshold_kg,
        );
        self.prev_trend_weight = f;

        let rounded = quantize_to_cu_i32(f);
        let stable = self.is_stable();
        let current = self.display_cu.unwrap_or(rounded);
        self.display_cu = Some(self.freeze.update(rounded, current, stable));
    }

    /// Slow zero tracking. Returns `true` when a correction was applied and verified.
    pub fn auto_zero<S: Storage>(&mut self, store: &mut CalibrationStore<S>) -> bool {
        let Some(display) = self.display_cu else {
            self.auto_zero_run = 0;
            return false;
        };
        let qualifies = self.auto_zero_enabled
            && self.is_stable()
            && display.abs() < self.auto_zero_threshold_cu
            && !self.overloaded;
        if !qualifies {
            self.auto_zero_run = 0;
            return false;
        }

        self.auto_zero_run = self.auto_zero_run.saturating_add(1);
        let now = self.now_ms();
        if self.auto_zero_run < self.cfg.auto_zero.min_stable_cycles
            || !elapsed_at_least(now, self.last_auto_zero_ms, self.cfg.auto_zero.interval_ms)
        {
            return false;
        }
        self.auto_zero_run = 0;
        self.last_auto_zero_ms = now;

        // Captured once; the revert below applies exactly this value.
        let step = match display.signum() {
            1 => self.cfg.auto_zero.step_counts,
            -1 => -self.cfg.auto_zero.step_counts,
            _ => return false,
        };
        let offset = {
            let rec = store.record_mut();
            rec.tare_offset = rec.tare_offset.wrapping_add(step);
            rec.tare_offset
        };
        self.cell.set_offset(offset);

        match self.read_finite(self.cfg.sensor.samples_verify) {
            Some(w) => {
                self.reseed(w);
                store.mark_dirty();
                tracing::debug!(step, offset, weight = w, "auto-zero corrected");
                true
            }
            None => {
                let offset = {
                    let rec = store.record_mut();
                    rec.tare_offset = rec.tare_offset.wrapping_sub(step);
                    rec.tare_offset
                };
                self.cell.set_offset(offset);
                tracing::warn!(
                    error = %ScaleError::AutoZeroVerifyFailed,
                    step,
                    offset,
                    "auto-zero reverted"
                );
                false
            }
        }
    }

    /// One main-loop iteration.
    pub fn update<S: Storage>(&mut self, store: &mut CalibrationStore<S>) -> ScaleStatus {
        if let Ok(sample) = self.acquire() {
            self.condition(sample);
            self.classify();
            self.auto_zero(store);
        }
        self.status()
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Zero the scale at the current load. Nothing changes when rejected.
    pub fn try_tare<S: Storage>(
        &mut self,
        store: &mut CalibrationStore<S>,
    ) -> Result<(), ScaleError> {
        let reject = |r: TareRejection| {
            tracing::info!(reason = %r, "tare rejected");
            Err(ScaleError::TareRejected(r))
        };
        let Measurement::Value(w) = self.output else {
            return reject(TareRejection::OutputFaulted);
        };
        if !self.cell.wait_ready(self.sensor_timeout()) {
            return reject(TareRejection::SensorNotReady);
        }
        if w.abs() > self.cfg.tare.sane_max_kg {
            return reject(TareRejection::OutOfRange);
        }
        let prev_offset = self.cell.offset();
        let new_offset = match self.cell.tare(self.cfg.sensor.samples_tare) {
            Ok(o) => o,
            Err(e) => {
                self.cell.set_offset(prev_offset);
                tracing::warn!(error = %map_hw_error(&*e), "sensor zeroing failed");
                return reject(TareRejection::SensorFailed);
            }
        };

        {
            let rec = store.record_mut();
            rec.backup_offset = rec.tare_offset;
            rec.backup_weight = rec.last_weight;
            rec.tare_offset = new_offset;
            rec.last_weight = 0.0;
        }
        self.session_delta = 0.0;
        let out = store.force_save();
        self.undo_available = true;

        self.clear_history();
        self.fault.reset();
        self.reseed(0.0);
        self.overloaded = false;
        self.prev_trend_weight = 0.0;
        tracing::info!(offset = new_offset, outcome = ?out, "tare");
        Ok(())
    }

    pub fn tare<S: Storage>(&mut self, store: &mut CalibrationStore<S>) -> bool {
        self.try_tare(store).is_ok()
    }

    /// Restore the offset and last weight saved by the most recent tare.
    ///
    /// Availability is consumed whatever happens and the restored record is
    /// always persisted. Returns `false` when nothing was available or the
    /// sensor was not ready for the verification read.
    pub fn undo_tare<S: Storage>(&mut self, store: &mut CalibrationStore<S>) -> bool {
        if !self.undo_available {
            tracing::debug!(error = %ScaleError::UndoUnavailable, "undo ignored");
            return false;
        }
        self.undo_available = false;

        let offset = {
            let rec = store.record_mut();
            rec.tare_offset = rec.backup_offset;
            rec.last_weight = rec.backup_weight;
            rec.tare_offset
        };
        self.cell.set_offset(offset);

        if !self.cell.wait_ready(self.sensor_timeout()) {
            let out = store.force_save();
            self.set_error();
            self.clear_history();
            self.ema.invalidate();
            tracing::warn!(
                error = %ScaleError::SensorTimeout,
                outcome = ?out,
                "undo: sensor not ready"
            );
            return false;
        }

        self.session_delta = 0.0;
        let last = f64::from(store.record().last_weight);
        match self.cell.read_units(self.cfg.sensor.samples_undo) {
            Ok(w) if w.is_finite() => {
                self.session_delta = w - last;
                self.reseed(w);
                self.prev_trend_weight = w;
            }
            _ => self.ema.invalidate(),
        }
        let out = store.force_save();

        self.clear_history();
        self.fault.reset();
        tracing::info!(offset, outcome = ?out, "tare undone");
        true
    }

    pub fn set_auto_zero(&mut self, on: bool) {
        self.auto_zero_enabled = on;
        self.auto_zero_run = 0;
    }

    /// Tare lock on forces auto-zero off; off restores the stored auto-zero flag.
    pub fn set_tare_lock(&mut self, settings: &Settings, on: bool) {
        self.auto_zero_enabled = !on && settings.auto_zero_on();
        self.auto_zero_run = 0;
    }

    /// Clamp the stored settings and re-derive the runtime auto-zero flag.
    pub fn apply_settings<S: Storage>(&mut self, store: &mut CalibrationStore<S>) {
        let rec = store.record_mut();
        rec.settings = rec.settings.clamped();
        let s = rec.settings;
        self.auto_zero_enabled = s.auto_zero_on() && !s.tare_lock_on();
        self.auto_zero_run = 0;
        tracing::debug!(settings = ?s, "settings applied");
    }

    /// Store new settings, apply them and persist immediately.
    pub fn save_settings<S: Storage>(
        &mut self,
        store: &mut CalibrationStore<S>,
        settings: Settings,
    ) -> SaveOutcome {
        store.record_mut().settings = settings;
        self.apply_settings(store);
        store.force_save()
    }

    /// Persist a new calibration factor, clamped into the accepted range.
    /// Returns the factor actually applied.
    pub fn commit_calibration<S: Storage>(
        &mut self,
        store: &mut CalibrationStore<S>,
        factor: f32,
    ) -> Result<f32, ScaleError> {
        let applied = store.cfg().clamp_cal_factor(factor).ok_or_else(|| {
            ScaleError::Config(format!("calibration factor {factor} is not finite"))
        })?;
        store.record_mut().cal_factor = applied;
        self.cell.set_scale(applied);
        let out = store.force_save();
        // Readings change scale; start the filters over.
        self.clear_history();
        self.ema.invalidate();
        tracing::info!(requested = factor, applied, outcome = ?out, "calibration committed");
        Ok(applied)
    }

    /// Remember a settled weight that moved past the change threshold, or
    /// persist a record left dirty by auto-zero, using the throttled save.
    /// `None` when nothing qualified.
    pub fn checkpoint<S: Storage>(
        &mut self,
        store: &mut CalibrationStore<S>,
    ) -> Option<SaveOutcome> {
        let Measurement::Value(w) = self.output else {
            return None;
        };
        if !self.is_stable() || !self.fault.is_clear() {
            return None;
        }
        let last = f64::from(store.record().last_weight);
        if (w - last).abs() > self.cfg.tare.weight_change_threshold_kg {
            store.record_mut().last_weight = w as f32;
            return Some(store.save());
        }
        store.is_dirty().then(|| store.save())
    }

    /// Low-power wait: sensor off, sliced sleep polling `poll` every loop
    /// period. Returns the first event `poll` produced, if any.
    pub fn power_save<E, F>(&mut self, duration: Duration, mut poll: F) -> Option<E>
    where
        F: FnMut() -> Option<E>,
    {
        self.cell.power_down();
        self.auto_zero_run = 0;

        let slice = Duration::from_millis(self.cfg.power.loop_delay_ms.max(1));
        let mut elapsed = Duration::ZERO;
        let mut pending = None;
        while elapsed < duration {
            let step = slice.min(duration - elapsed);
            self.clock.sleep(step);
            elapsed += step;
            if let Some(ev) = poll()
                && pending.is_none()
            {
                pending = Some(ev);
            }
        }

        self.cell.power_up();
        // First conversion after power-up is unreliable.
        self.ema.invalidate();
        tracing::trace!(
            slept_ms = elapsed.as_millis() as u64,
            woke_early = pending.is_some(),
            "power save"
        );
        pending
    }

    // ── Outputs ──────────────────────────────────────────────────────────────

    pub fn is_stable(&self) -> bool {
        self.window.is_stable(self.cfg.stability.threshold_kg)
    }

    /// Stable with no read failure since the last good sample.
    pub fn is_idle(&self) -> bool {
        self.is_stable() && self.fault.is_clear()
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze.is_frozen()
    }

    pub fn is_overloaded(&self) -> bool {
        self.overloaded
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }

    pub fn output(&self) -> Measurement {
        self.output
    }

    pub fn filtered(&self) -> f64 {
        self.filtered
    }

    pub fn display_cu(&self) -> Option<i32> {
        self.display_cu
    }

    pub fn session_delta(&self) -> f64 {
        self.session_delta
    }

    pub fn auto_zero_enabled(&self) -> bool {
        self.auto_zero_enabled
    }

    pub fn undo_available(&self) -> bool {
        self.undo_available
    }

    pub fn fault_state(&self) -> FaultState {
        self.fault.state()
    }

    /// Main-loop period: slow down once the reading has settled.
    pub fn loop_delay(&self) -> Duration {
        let ms = if self.is_idle() {
            self.cfg.power.idle_loop_delay_ms
        } else {
            self.cfg.power.loop_delay_ms
        };
        Duration::from_millis(ms)
    }

    pub fn cfg(&self) -> &PipelineCfg {
        &self.cfg
    }

    pub fn cell(&self) -> &L {
        &self.cell
    }

    pub fn status(&self) -> ScaleStatus {
        ScaleStatus {
            weight: self.output,
            display_cu: self.display_cu,
            session_delta: self.session_delta,
            stable: self.is_stable(),
            frozen: self.is_frozen(),
            overloaded: self.overloaded,
            idle: self.is_idle(),
            trend: self.trend,
            auto_zero_enabled: self.auto_zero_enabled,
            undo_available: self.undo_available,
        }
    }
}
