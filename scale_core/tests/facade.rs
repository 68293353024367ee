mod common;

use scale_core::{
    BuildError, FilterCfg, Measurement, PipelineCfg, RECORD_LEN, SaveOutcome, Scale, ScaleError,
    Settings, build_scale,
};
use scale_hardware::{MemEeprom, SimulatedLoadCell};
use scale_traits::ManualClock;

use common::eeprom;

/// Device holding a tared, calibrated record in slot 0.
fn calibrated() -> MemEeprom {
    let rec = scale_core::CalibrationRecord {
        tare_offset: 84_000,
        ..scale_core::CalibrationRecord::factory(2280.0)
    };
    let mut dev = eeprom();
    dev.poke(0, &rec.encode()).unwrap();
    dev
}

#[test]
fn missing_pieces_are_reported() {
    let err = Scale::builder().try_build().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingLoadCell)
    ));

    let err = Scale::builder()
        .with_load_cell(SimulatedLoadCell::new())
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingStorage)
    ));
}

#[test]
fn invalid_pipeline_config_is_rejected() {
    let cfg = PipelineCfg {
        filter: FilterCfg { ema_alpha: 0.0 },
        ..PipelineCfg::default()
    };
    let err = Scale::builder()
        .with_load_cell(SimulatedLoadCell::new())
        .with_storage(eeprom())
        .with_pipeline_cfg(cfg)
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn file_config_feeds_the_builder() {
    let cfg = scale_config::load_toml("[storage]\ndefault_cal_factor = 1000.0\n").unwrap();
    let scale = Scale::builder()
        .with_config(&cfg)
        .with_load_cell(SimulatedLoadCell::new())
        .with_storage(eeprom())
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .expect("build");
    assert_eq!(scale.store().record().cal_factor, 1000.0);
}

#[test]
fn smart_start_persists_weight_changed_while_off() {
    let clock = ManualClock::new();
    let mut scale = build_scale(
        SimulatedLoadCell::new().with_load(1.0),
        calibrated(),
        PipelineCfg::default(),
        Default::default(),
        Some(Box::new(clock.clone())),
    )
    .expect("build");
    assert!(scale.store().storage().write_log().is_empty());

    scale.init().expect("init");
    let status = scale.status();
    assert!((status.session_delta - 1.0).abs() < 1e-6);
    assert_eq!(status.display_cu, Some(100));
    assert_eq!(scale.store().storage().write_log(), &[RECORD_LEN]);
    assert_eq!(scale.store().record().last_weight, 1.0);
}

#[test]
fn settled_weight_is_checkpointed_with_throttle() {
    let clock = ManualClock::new();
    let mut scale = build_scale(
        SimulatedLoadCell::new(),
        calibrated(),
        PipelineCfg::default(),
        Default::default(),
        Some(Box::new(clock.clone())),
    )
    .expect("build");
    scale.init().expect("init");
    let sim = scale.pipeline().cell().handle();
    sim.set_load(2.0);

    clock.advance_ms(300_000);
    let mut idle = false;
    for _ in 0..60 {
        clock.advance_ms(30);
        idle |= scale.cycle().idle;
    }
    assert!(idle);
    assert_eq!(scale.store().storage().write_log().len(), 1);
    let last = scale.store().record().last_weight;
    assert!((last - 2.0).abs() < 0.06, "got {last}");
    assert_eq!(scale.loop_delay().as_millis(), 250);
}

#[test]
fn calibration_factor_is_clamped() {
    let clock = ManualClock::new();
    let mut scale = build_scale(
        SimulatedLoadCell::new(),
        calibrated(),
        PipelineCfg::default(),
        Default::default(),
        Some(Box::new(clock)),
    )
    .expect("build");
    scale.init().expect("init");

    assert_eq!(scale.commit_calibration(250_000.0), Ok(100_000.0));
    assert_eq!(scale.commit_calibration(0.0), Ok(1.0));
    assert_eq!(scale.commit_calibration(2200.0), Ok(2200.0));
    assert_eq!(scale.store().record().cal_factor, 2200.0);
    assert!(matches!(
        scale.commit_calibration(f32::NAN),
        Err(ScaleError::Config(_))
    ));
}

#[test]
fn saved_settings_are_clamped_and_applied() {
    let mut scale = Scale::builder()
        .with_load_cell(SimulatedLoadCell::new())
        .with_storage(calibrated())
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .expect("build");
    scale.init().expect("init");
    assert!(scale.status().auto_zero_enabled);

    let out = scale.save_settings(Settings {
        brightness: 9,
        auto_off: 9,
        auto_dim: 9,
        auto_zero: 5,
        units: 7,
        tare_lock: 3,
    });
    assert!(matches!(out, SaveOutcome::Written { .. }));
    let s = scale.store().record().settings;
    assert_eq!(
        s,
        Settings {
            brightness: 2,
            auto_off: 3,
            auto_dim: 2,
            auto_zero: 1,
            units: 1,
            tare_lock: 1,
        }
    );
    assert!(!scale.status().auto_zero_enabled);

    scale.set_tare_lock(false);
    assert!(scale.status().auto_zero_enabled);
}

#[test]
fn tare_and_undo_through_the_facade() {
    let mut scale = Scale::builder()
        .with_load_cell(SimulatedLoadCell::new().with_load(0.5))
        .with_storage(calibrated())
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .expect("build");
    scale.init().expect("init");
    assert!(scale.tare());
    assert_eq!(scale.status().weight, Measurement::Value(0.0));
    assert!(scale.status().undo_available);
    assert!(scale.undo_tare());
    assert_eq!(scale.store().record().tare_offset, 84_000);
    assert!(!scale.status().undo_available);
}

#[test]
fn auto_zero_corrections_reach_storage_after_throttle() {
    let clock = ManualClock::new();
    let mut scale = build_scale(
        SimulatedLoadCell::new(),
        calibrated(),
        PipelineCfg::default(),
        Default::default(),
        Some(Box::new(clock.clone())),
    )
    .expect("build");
    scale.init().expect("init");
    // Sensor zero drifts a little while the platter stays empty
    let sim = scale.pipeline().cell().handle();
    sim.set_zero_counts(84_030);

    for _ in 0..299 {
        clock.advance_ms(1_000);
        scale.cycle();
    }
    assert!(scale.store().storage().write_log().is_empty());
    assert!(scale.store().is_dirty());
    assert!(scale.store().record().tare_offset > 84_000);

    for _ in 0..10 {
        clock.advance_ms(1_000);
        scale.cycle();
    }
    assert_eq!(scale.store().storage().write_log(), &[RECORD_LEN]);
    let image = scale.store().storage().image();
    let saved = scale_core::CalibrationRecord::decode(&image[RECORD_LEN..2 * RECORD_LEN])
        .expect("slot 1 holds the corrected record");
    assert!(saved.tare_offset > 84_000, "got {}", saved.tare_offset);
}

#[test]
fn tare_clears_overload_at_once() {
    let clock = ManualClock::new();
    let mut scale = build_scale(
        SimulatedLoadCell::new(),
        calibrated(),
        PipelineCfg::default(),
        Default::default(),
        Some(Box::new(clock.clone())),
    )
    .expect("build");
    scale.init().expect("init");
    let sim = scale.pipeline().cell().handle();
    sim.set_load(6.0);
    for _ in 0..20 {
        clock.advance_ms(30);
        scale.cycle();
    }
    assert!(scale.status().overloaded);

    scale.try_tare().expect("tare");
    let status = scale.status();
    assert!(!status.overloaded);
    assert_eq!(status.weight, Measurement::Value(0.0));
}
