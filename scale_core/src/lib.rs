#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Scale firmware core (hardware-agnostic).
//!
//! All hardware interactions go through `scale_traits::LoadCell` and
//! `scale_traits::Storage`; time goes through `scale_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Conditioning**: median-of-three, EMA, stability window, trend, overload,
//!   display freeze and auto-zero feedback (`pipeline` module)
//! - **Faults**: consecutive read failures latch the output to `Error` (`fault` module)
//! - **Persistence**: checksum-verified, wear-leveled record slots with legacy
//!   migration (`store`, `record`, `legacy` modules)
//! - **Configuration**: runtime config structs (`config` module), mapped from
//!   `scale_config` in `conversions`
//! - **Facade**: `Scale` and its type-state builder (`builder` module)
//!
//! ## Fixed-Point Display
//!
//! Filtering runs in `f64` kilograms. The displayed weight is held in
//! **centi-units** (`i32`, 1 cu = 0.01 kg); see `quantize_to_cu_i32`.

pub mod builder;
pub mod checksum;
pub mod config;
pub mod conversions;
pub mod error;
pub mod fault;
pub mod filter;
pub mod fixed_point;
pub mod hw_error;
pub mod legacy;
pub mod mocks;
pub mod pipeline;
pub mod record;
pub mod stability;
pub mod status;
pub mod store;
pub mod util;

pub use builder::{Missing, Scale, ScaleBuilder, ScaleG, Set, build_scale, validate_cfg};
pub use config::{
    AutoZeroCfg, FilterCfg, PipelineCfg, PowerCfg, SensorCfg, StabilityCfg, StoreCfg, TareCfg,
};
pub use error::{BuildError, Result, ScaleError, TareRejection};
pub use fault::{FaultState, FaultTracker};
pub use legacy::LegacySchema;
pub use pipeline::ConditioningPipeline;
pub use record::{CalibrationRecord, RECORD_LEN, Settings, SlotError};
pub use status::{Measurement, ScaleStatus, Trend};
pub use store::{
    BootReport, BootSource, CalibrationStore, SaveOutcome, SlotInfo, image_len, scan_slots,
};
