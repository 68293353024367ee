//! Type-state builder for `Scale` and generic `build_scale` constructor.
//!
//! The builder enforces at compile time that a load cell and a storage device
//! are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use scale_traits::{Clock, LoadCell, MonotonicClock, Storage};

use crate::config::{PipelineCfg, StoreCfg};
use crate::error::{BuildError, Result, ScaleError};
use crate::pipeline::ConditioningPipeline;
use crate::record::Settings;
use crate::status::ScaleStatus;
use crate::store::{CalibrationStore, SaveOutcome};

// ── Facade ───────────────────────────────────────────────────────────────────

/// Pipeline plus the store it persists into; what a main loop drives.
pub struct ScaleG<L: LoadCell, S: Storage> {
    pipeline: ConditioningPipeline<L>,
    store: CalibrationStore<S>,
}

/// Dynamic (boxed) scale as produced by [`ScaleBuilder`].
pub type Scale = ScaleG<Box<dyn LoadCell>, Box<dyn Storage>>;

impl<L: LoadCell, S: Storage> core::fmt::Debug for ScaleG<L, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scale")
            .field("pipeline", &self.pipeline)
            .field("store", &self.store)
            .finish()
    }
}

impl Scale {
    /// Start building a Scale.
    pub fn builder() -> ScaleBuilder<Missing, Missing> {
        ScaleBuilder::default()
    }
}

impl<L: LoadCell, S: Storage> ScaleG<L, S> {
    /// Seed the pipeline from the booted record.
    pub fn init(&mut self) -> std::result::Result<(), ScaleError> {
        self.pipeline.init(&mut self.store)
    }

    /// One main-loop iteration: update, then checkpoint a settled weight.
    pub fn cycle(&mut self) -> ScaleStatus {
        let status = self.pipeline.update(&mut self.store);
        if status.idle {
            self.pipeline.checkpoint(&mut self.store);
        }
        status
    }

    pub fn tare(&mut self) -> bool {
        self.pipeline.tare(&mut self.store)
    }

    pub fn try_tare(&mut self) -> std::result::Result<(), ScaleError> {
        self.pipeline.try_tare(&mut self.store)
    }

    pub fn undo_tare(&mut self) -> bool {
        self.pipeline.undo_tare(&mut self.store)
    }

    pub fn set_auto_zero(&mut self, on: bool) {
        self.pipeline.set_auto_zero(on);
    }

    pub fn set_tare_lock(&mut self, on: bool) {
        let settings = self.store.record().settings;
        self.pipeline.set_tare_lock(&settings, on);
    }

    pub fn apply_settings(&mut self) {
        self.pipeline.apply_settings(&mut self.store);
    }

    pub fn save_settings(&mut self, settings: Settings) -> SaveOutcome {
        self.pipeline.save_settings(&mut self.store, settings)
    }

    pub fn commit_calibration(&mut self, factor: f32) -> std::result::Result<f32, ScaleError> {
        self.pipeline.commit_calibration(&mut self.store, factor)
    }

    pub fn mark_dirty(&mut self) {
        self.store.mark_dirty();
    }

    /// Critical-power flush.
    pub fn flush(&mut self) -> SaveOutcome {
        self.store.flush()
    }

    pub fn power_save<E, F>(&mut self, duration: Duration, poll: F) -> Option<E>
    where
        F: FnMut() -> Option<E>,
    {
        self.pipeline.power_save(duration, poll)
    }

    pub fn status(&self) -> ScaleStatus {
        self.pipeline.status()
    }

    pub fn loop_delay(&self) -> Duration {
        self.pipeline.loop_delay()
    }

    pub fn pipeline(&self) -> &ConditioningPipeline<L> {
        &self.pipeline
    }

    pub fn store(&self) -> &CalibrationStore<S> {
        &self.store
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Scale`. Configuration is validated on `build()`.
pub struct ScaleBuilder<C, St> {
    cell: Option<Box<dyn LoadCell>>,
    storage: Option<Box<dyn Storage>>,
    pipeline: Option<PipelineCfg>,
    store: Option<StoreCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _c: PhantomData<C>,
    _st: PhantomData<St>,
}

impl Default for ScaleBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            cell: None,
            storage: None,
            pipeline: None,
            store: None,
            clock: None,
            _c: PhantomData,
            _st: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Reject configurations the pipeline or the store cannot run with.
pub fn validate_cfg(pipeline: &PipelineCfg, store: &StoreCfg) -> Result<()> {
    let alpha = pipeline.filter.ema_alpha;
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(invalid("ema_alpha must be in (0.0, 1.0]"));
    }
    if pipeline.stability.window < 2 {
        return Err(invalid("stability window must be >= 2"));
    }
    if !(pipeline.stability.threshold_kg.is_finite() && pipeline.stability.threshold_kg > 0.0) {
        return Err(invalid("stability threshold must be > 0"));
    }
    if pipeline.stability.freeze_threshold_kg.is_sign_negative() {
        return Err(invalid("freeze threshold must be >= 0"));
    }
    if pipeline.sensor.timeout_ms == 0 {
        return Err(invalid("sensor timeout must be >= 1 ms"));
    }
    if pipeline.sensor.error_count_max == 0 {
        return Err(invalid("error_count_max must be >= 1"));
    }
    if pipeline.auto_zero.step_counts <= 0 {
        return Err(invalid("auto-zero step must be >= 1 count"));
    }
    if store.slots == 0 {
        return Err(invalid("storage needs at least one slot"));
    }
    if !(store.cal_factor_min.is_finite()
        && store.cal_factor_max.is_finite()
        && store.cal_factor_min > 0.0
        && store.cal_factor_min < store.cal_factor_max)
    {
        return Err(invalid("calibration factor range must satisfy 0 < min < max"));
    }
    if !store.accepts_cal_factor(store.default_cal_factor) {
        return Err(invalid("default calibration factor outside the accepted range"));
    }
    Ok(())
}

impl<C, St> ScaleBuilder<C, St> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    ///
    /// Boots the store (migrating or factory-resetting as needed) but does not
    /// touch the sensor; call [`ScaleG::init`] for that.
    pub fn try_build(self) -> Result<Scale> {
        let cell = self
            .cell
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLoadCell))?;
        let storage = self
            .storage
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStorage))?;
        build_scale(
            cell,
            storage,
            self.pipeline.unwrap_or_default(),
            self.store.unwrap_or_default(),
            self.clock,
        )
    }

    pub fn with_pipeline_cfg(mut self, cfg: PipelineCfg) -> Self {
        self.pipeline = Some(cfg);
        self
    }

    pub fn with_store_cfg(mut self, cfg: StoreCfg) -> Self {
        self.store = Some(cfg);
        self
    }

    /// Take both runtime configs from a loaded config file.
    pub fn with_config(self, cfg: &scale_config::Config) -> Self {
        self.with_pipeline_cfg(cfg.into())
            .with_store_cfg((&cfg.storage).into())
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl<St> ScaleBuilder<Missing, St> {
    pub fn with_load_cell(self, cell: impl LoadCell + 'static) -> ScaleBuilder<Set, St> {
        ScaleBuilder {
            cell: Some(Box::new(cell)),
            storage: self.storage,
            pipeline: self.pipeline,
            store: self.store,
            clock: self.clock,
            _c: PhantomData,
            _st: PhantomData,
        }
    }
}

impl<C> ScaleBuilder<C, Missing> {
    pub fn with_storage(self, storage: impl Storage + 'static) -> ScaleBuilder<C, Set> {
        ScaleBuilder {
            cell: self.cell,
            storage: Some(Box::new(storage)),
            pipeline: self.pipeline,
            store: self.store,
            clock: self.clock,
            _c: PhantomData,
            _st: PhantomData,
        }
    }
}

impl ScaleBuilder<Set, Set> {
    /// Validate and build. Only available once a load cell and storage are set.
    pub fn build(self) -> Result<Scale> {
        self.try_build()
    }
}

/// Build a statically-dispatched `ScaleG` from a concrete load cell and storage.
///
/// Shares one clock between the pipeline and the store.
pub fn build_scale<L, S>(
    cell: L,
    storage: S,
    pipeline: PipelineCfg,
    store: StoreCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<ScaleG<L, S>>
where
    L: LoadCell,
    S: Storage,
{
    validate_cfg(&pipeline, &store)?;
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let store = CalibrationStore::boot(storage, store, Arc::clone(&clock))?;
    let pipeline = ConditioningPipeline::new(cell, pipeline, clock);
    Ok(ScaleG { pipeline, store })
}
