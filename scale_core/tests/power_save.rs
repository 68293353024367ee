mod common;

use std::cell::Cell;
use std::time::Duration;

use scale_core::Measurement;
use scale_hardware::SimulatedLoadCell;
use scale_traits::{Clock, ManualClock};

use common::{boot, eeprom, pipeline_with};

#[test]
fn sleeps_in_loop_slices_and_keeps_first_event() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    store.record_mut().tare_offset = 84_000;
    let cell = SimulatedLoadCell::new();
    let sim = cell.handle();
    let mut p = pipeline_with(cell, Default::default(), &clock);
    p.init(&mut store).expect("init");

    let start = clock.now();
    let polls = Cell::new(0u32);
    let event = p.power_save(Duration::from_millis(100), || {
        polls.set(polls.get() + 1);
        assert!(!sim.is_powered(), "sensor must be off while sleeping");
        match polls.get() {
            2 => Some("button"),
            3 => Some("second"),
            _ => None,
        }
    });

    assert_eq!(event, Some("button"));
    // 30 + 30 + 30 + 10 ms
    assert_eq!(polls.get(), 4);
    assert_eq!(clock.now() - start, Duration::from_millis(100));
    assert!(sim.is_powered());
}

#[test]
fn filter_restarts_after_wake() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    store.record_mut().tare_offset = 84_000;
    let cell = SimulatedLoadCell::new();
    let sim = cell.handle();
    let mut p = pipeline_with(cell, Default::default(), &clock);
    p.init(&mut store).expect("init");
    assert_eq!(p.output(), Measurement::Value(0.0));

    let none: Option<()> = p.power_save(Duration::from_millis(60), || {
        sim.set_load(2.0);
        None
    });
    assert!(none.is_none());

    // Without the restart the EMA would only have moved 30 % of the way.
    p.update(&mut store);
    let w = p.filtered();
    assert!((w - 2.0).abs() < 1e-3, "got {w}");
}

#[test]
fn zero_duration_does_not_poll() {
    let clock = ManualClock::new();
    let mut p = pipeline_with(SimulatedLoadCell::new(), Default::default(), &clock);
    let sim = p.cell().handle();
    let ev = p.power_save(Duration::ZERO, || -> Option<u8> { panic!("polled") });
    assert!(ev.is_none());
    assert!(sim.is_powered());
}
