use proptest::prelude::*;
use scale_core::mocks::NullCell;
use scale_core::stability::{Freeze, StabilityWindow};
use scale_core::{ConditioningPipeline, FilterCfg, PipelineCfg};
use scale_traits::ManualClock;
use std::sync::Arc;

#[test]
fn spread_equal_to_threshold_is_not_stable() {
    let mut w = StabilityWindow::new(8);
    for x in [1.00, 1.01, 1.02, 0.99, 1.00, 1.01, 1.00, 1.02] {
        w.push(x);
    }
    assert!(!w.is_stable(0.03));
}

#[test]
fn spread_below_threshold_is_stable() {
    let mut w = StabilityWindow::new(8);
    for x in [1.00, 1.01, 1.02, 1.00, 1.01, 1.00, 1.02, 1.01] {
        w.push(x);
    }
    assert!(w.is_stable(0.03));
}

#[test]
fn fewer_than_two_samples_is_never_stable() {
    let mut w = StabilityWindow::new(8);
    assert!(!w.is_stable(0.03));
    w.push(1.0);
    assert!(!w.is_stable(0.03));
    w.push(1.0);
    assert!(w.is_stable(0.03));
}

proptest! {
    #[test]
    fn stable_iff_spread_of_last_window_below_threshold(
        samples in proptest::collection::vec(-1.0f64..1.0, 0..24),
        threshold in 0.001f64..0.5,
    ) {
        let mut w = StabilityWindow::new(8);
        for &x in &samples {
            w.push(x);
        }
        let tail = &samples[samples.len().saturating_sub(8)..];
        let expected = tail.len() >= 2 && {
            let lo = tail.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            hi - lo < threshold
        };
        prop_assert_eq!(w.is_stable(threshold), expected);
    }
}

#[test]
fn freeze_holds_until_threshold_is_exceeded() {
    let mut f = Freeze::new(2);
    assert_eq!(f.update(100, 0, false), 100);
    assert_eq!(f.update(105, 100, false), 105);
    assert!(!f.is_frozen());

    assert_eq!(f.update(110, 105, true), 110);
    assert!(f.is_frozen());
    assert_eq!(f.update(112, 110, true), 110);
    assert_eq!(f.update(108, 110, false), 110);
    assert!(f.is_frozen());

    assert_eq!(f.update(113, 110, false), 113);
    assert!(!f.is_frozen());
    assert_eq!(f.update(113, 113, true), 113);
    assert!(f.is_frozen());
}

fn step(p: &mut ConditioningPipeline<NullCell>, x: f64) {
    p.condition(x);
    p.classify();
}

#[test]
fn pipeline_display_freezes_on_stability() {
    let cfg = PipelineCfg {
        filter: FilterCfg { ema_alpha: 1.0 },
        ..PipelineCfg::default()
    };
    let mut p = ConditioningPipeline::new(NullCell::default(), cfg, Arc::new(ManualClock::new()));

    step(&mut p, 1.00);
    assert_eq!(p.display_cu(), Some(100));
    assert!(!p.is_frozen());
    step(&mut p, 1.00);
    assert!(p.is_frozen());
    step(&mut p, 1.00);

    // Small move: the display holds.
    for _ in 0..3 {
        step(&mut p, 1.01);
        assert_eq!(p.display_cu(), Some(100));
    }

    // Larger move releases the freeze immediately.
    step(&mut p, 1.04);
    step(&mut p, 1.04);
    assert_eq!(p.display_cu(), Some(104));
    step(&mut p, 1.04);
    assert_eq!(p.display_cu(), Some(104));
    assert!(!p.is_frozen());
}

#[test]
fn overload_and_trend_are_classified() {
    let cfg = PipelineCfg {
        filter: FilterCfg { ema_alpha: 1.0 },
        ..PipelineCfg::default()
    };
    let mut p = ConditioningPipeline::new(NullCell::default(), cfg, Arc::new(ManualClock::new()));
    step(&mut p, 0.0);
    assert_eq!(p.trend(), scale_core::Trend::Flat);
    step(&mut p, 6.0);
    assert_eq!(p.trend(), scale_core::Trend::Up);
    assert!(p.is_overloaded());
    step(&mut p, 6.0);
    step(&mut p, 0.5);
    assert!(p.is_overloaded(), "median still holds the heavy reading");
    step(&mut p, 0.5);
    assert!(!p.is_overloaded());
    assert_eq!(p.trend(), scale_core::Trend::Down);
}
