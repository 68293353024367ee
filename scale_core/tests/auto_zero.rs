mod common;

use scale_core::mocks::{Reading, ScriptedCell};
use scale_core::{PipelineCfg, Settings};
use scale_hardware::SimulatedLoadCell;
use scale_traits::{LoadCell, ManualClock};

use common::{boot, eeprom, pipeline, pipeline_with};

#[test]
fn tracks_slow_zero_drift_one_count_at_a_time() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    store.record_mut().cal_factor = 100.0;
    store.record_mut().tare_offset = 84_000;

    let cell = SimulatedLoadCell::new().with_sensitivity(100.0);
    let sim = cell.handle();
    let mut p = pipeline_with(cell, PipelineCfg::default(), &clock);
    p.init(&mut store).expect("init");

    sim.set_zero_counts(84_003);
    let mut corrections = 0;
    for _ in 0..60 {
        clock.advance_ms(1_000);
        let before = store.record().tare_offset;
        p.update(&mut store);
        let after = store.record().tare_offset;
        assert!((after - before).abs() <= 1, "one count per correction");
        if after != before {
            corrections += 1;
        }
    }

    assert_eq!(corrections, 3);
    assert_eq!(store.record().tare_offset, 84_003);
    assert_eq!(p.cell().offset(), 84_003);
    assert_eq!(p.display_cu(), Some(0));
    assert!(store.is_dirty());
}

#[test]
fn failed_verification_reverts_exactly() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    store.record_mut().tare_offset = 1_000;

    let mut script = vec![Reading::Units(0.02); 7];
    script.push(Reading::NotReady);
    let mut p = pipeline(ScriptedCell::new(script), &clock);
    p.init(&mut store).expect("init");

    for _ in 0..6 {
        clock.advance_ms(1_000);
        p.update(&mut store);
    }

    assert_eq!(store.record().tare_offset, 1_000);
    assert_eq!(p.cell().offset(), 1_000);
    assert!(!store.is_dirty());
}

#[test]
fn negative_display_steps_the_offset_down() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    store.record_mut().tare_offset = 1_000;
    let mut p = pipeline(
        ScriptedCell::new([]).with_idle(Reading::Units(-0.02)),
        &clock,
    );
    p.init(&mut store).expect("init");

    for _ in 0..6 {
        clock.advance_ms(1_000);
        p.update(&mut store);
    }

    assert_eq!(store.record().tare_offset, 999);
    assert_eq!(p.cell().offset(), 999);
    assert!(store.is_dirty());
}

#[test]
fn interval_gates_corrections() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    store.record_mut().tare_offset = 1_000;
    let mut p = pipeline(ScriptedCell::new([]).with_idle(Reading::Units(0.02)), &clock);
    p.init(&mut store).expect("init");

    // Plenty of stable cycles, but the clock never reaches the interval.
    for _ in 0..20 {
        clock.advance_ms(100);
        p.update(&mut store);
    }
    assert_eq!(store.record().tare_offset, 1_000);

    clock.advance_ms(1_000);
    p.update(&mut store);
    assert_eq!(store.record().tare_offset, 1_001);
}

#[test]
fn tare_lock_disables_correction() {
    let clock = ManualClock::new();
    let mut store = boot(eeprom(), &clock);
    store.record_mut().tare_offset = 1_000;
    store.record_mut().settings = Settings {
        tare_lock: 1,
        ..Settings::default()
    };
    let mut p = pipeline(ScriptedCell::new([]).with_idle(Reading::Units(0.02)), &clock);
    p.init(&mut store).expect("init");
    assert!(!p.auto_zero_enabled());

    for _ in 0..20 {
        clock.advance_ms(1_000);
        p.update(&mut store);
    }
    assert_eq!(store.record().tare_offset, 1_000);

    // Releasing the lock restores the stored auto-zero flag.
    let settings = store.record().settings;
    p.set_tare_lock(&settings, false);
    assert!(p.auto_zero_enabled());
}

#[test]
fn zero_or_large_display_is_left_alone() {
    for idle in [0.0, 0.05, -0.05] {
        let clock = ManualClock::new();
        let mut store = boot(eeprom(), &clock);
        store.record_mut().tare_offset = 1_000;
        let mut p = pipeline(ScriptedCell::new([]).with_idle(Reading::Units(idle)), &clock);
        p.init(&mut store).expect("init");
        for _ in 0..20 {
            clock.advance_ms(1_000);
            p.update(&mut store);
        }
        assert_eq!(store.record().tare_offset, 1_000, "idle {idle}");
        assert!(!store.is_dirty());
    }
}
