mod common;

use scale_core::mocks::{Reading, ScriptedCell};
use scale_core::{FaultState, Measurement};
use scale_traits::ManualClock;

use common::{boot, eeprom, pipeline};

#[test]
fn consecutive_failures_latch_error_then_recover() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    let cell = ScriptedCell::new([
        Reading::Units(1.0),
        Reading::NotReady,
        Reading::NotReady,
        Reading::NotReady,
    ])
    .with_idle(Reading::Units(2.0));
    let mut p = pipeline(cell, &clock);
    p.init(&mut store).expect("init");
    assert_eq!(p.output(), Measurement::Value(1.0));

    let s = p.update(&mut store);
    assert_eq!(p.fault_state(), FaultState::Degraded(1));
    assert_eq!(s.weight, Measurement::Value(1.0), "last value is held while degraded");
    assert!(!s.idle);

    p.update(&mut store);
    assert_eq!(p.fault_state(), FaultState::Degraded(2));

    let s = p.update(&mut store);
    assert_eq!(p.fault_state(), FaultState::Faulted);
    assert_eq!(s.weight, Measurement::Error);
    assert_eq!(s.display_cu, None);
    assert_eq!(s.display(), Measurement::Error);

    // First good read starts the filters over from the new sample.
    let s = p.update(&mut store);
    assert_eq!(p.fault_state(), FaultState::Normal);
    assert_eq!(s.weight, Measurement::Value(2.0));
    assert_eq!(s.display_cu, Some(200));
    assert!(!s.frozen);
}

#[test]
fn a_good_read_resets_the_failure_count() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    let cell = ScriptedCell::new([
        Reading::Units(0.0),
        Reading::NotReady,
        Reading::NotReady,
        Reading::Units(0.0),
        Reading::NotReady,
        Reading::NotReady,
    ]);
    let mut p = pipeline(cell, &clock);
    p.init(&mut store).expect("init");
    for _ in 0..5 {
        p.update(&mut store);
        assert_ne!(p.output(), Measurement::Error);
    }
    assert_eq!(p.fault_state(), FaultState::Degraded(2));
}

#[test]
fn read_errors_and_non_finite_values_count_as_failures() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    let cell = ScriptedCell::new([
        Reading::Units(0.0),
        Reading::Fails,
        Reading::Units(f64::NAN),
        Reading::Units(f64::INFINITY),
    ]);
    let mut p = pipeline(cell, &clock);
    p.init(&mut store).expect("init");
    for _ in 0..3 {
        p.update(&mut store);
    }
    assert_eq!(p.output(), Measurement::Error);
}

#[test]
fn startup_timeout_reports_error() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    let mut p = pipeline(ScriptedCell::new([Reading::NotReady]), &clock);
    let err = p.init(&mut store).expect_err("sensor not ready");
    assert_eq!(err, scale_core::ScaleError::SensorTimeout);
    assert_eq!(p.output(), Measurement::Error);
}
