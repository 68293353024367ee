//! Subcommand bodies: build the scale from config, drive it, print results.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::{Result, WrapErr};
use serde_json::json;

use scale_core::{
    BootReport, BootSource, CalibrationStore, Measurement, SaveOutcome, Scale, ScaleStatus,
    Settings, SlotInfo, StoreCfg, scan_slots,
};
use scale_traits::MonotonicClock;

use crate::cli::{LoadStep, Toggle};
use crate::hw::{self, LoadControl};

/// Options for `scale run`.
#[derive(Debug, Clone)]
pub struct RunOpts {
    pub cycles: u32,
    pub load: f64,
    pub steps: Vec<LoadStep>,
    pub tare_at: Option<u32>,
    pub undo_at: Option<u32>,
    pub noise: u32,
    pub power_save_ms: Option<u64>,
    pub realtime: bool,
}

/// Settings fields given on the command line; `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsPatch {
    pub brightness: Option<u8>,
    pub auto_off: Option<u8>,
    pub auto_dim: Option<u8>,
    pub auto_zero: Option<Toggle>,
    pub units: Option<u8>,
    pub tare_lock: Option<Toggle>,
}

impl SettingsPatch {
    fn is_empty(&self) -> bool {
        self.brightness.is_none()
            && self.auto_off.is_none()
            && self.auto_dim.is_none()
            && self.auto_zero.is_none()
            && self.units.is_none()
            && self.tare_lock.is_none()
    }

    fn apply(&self, s: Settings) -> Settings {
        Settings {
            brightness: self.brightness.unwrap_or(s.brightness),
            auto_off: self.auto_off.unwrap_or(s.auto_off),
            auto_dim: self.auto_dim.unwrap_or(s.auto_dim),
            auto_zero: self.auto_zero.map_or(s.auto_zero, Toggle::as_flag),
            units: self.units.unwrap_or(s.units),
            tare_lock: self.tare_lock.map_or(s.tare_lock, Toggle::as_flag),
        }
    }
}

// ── Formatting ───────────────────────────────────────────────────────────────

pub fn source_name(source: BootSource) -> String {
    match source {
        BootSource::Current => "current".to_string(),
        BootSource::Migrated { from_version } => format!("migrated-v{from_version}"),
        BootSource::FactoryDefaults => "factory".to_string(),
    }
}

fn weight_json(m: Measurement) -> serde_json::Value {
    match m {
        Measurement::Value(w) => json!(w),
        Measurement::Error => serde_json::Value::Null,
    }
}

fn trend_name(t: scale_core::Trend) -> &'static str {
    match t {
        scale_core::Trend::Up => "up",
        scale_core::Trend::Flat => "flat",
        scale_core::Trend::Down => "down",
    }
}

pub fn status_json(cycle: u32, s: &ScaleStatus) -> serde_json::Value {
    json!({
        "cycle": cycle,
        "weight": weight_json(s.weight),
        "display": weight_json(s.display()),
        "session_delta": s.session_delta,
        "stable": s.stable,
        "frozen": s.frozen,
        "overloaded": s.overloaded,
        "idle": s.idle,
        "trend": trend_name(s.trend),
        "auto_zero": s.auto_zero_enabled,
        "undo_available": s.undo_available,
    })
}

fn display_text(s: &ScaleStatus) -> String {
    match s.display() {
        Measurement::Value(w) => {
            let mut out = format!("{w:.2} kg");
            if s.overloaded {
                out.push_str(" (overload)");
            } else if s.stable {
                out.push_str(" (stable)");
            }
            out
        }
        Measurement::Error => "ERR".to_string(),
    }
}

fn outcome_name(o: SaveOutcome) -> String {
    match o {
        SaveOutcome::Written { slot, seq } => format!("written slot={slot} seq={seq}"),
        SaveOutcome::Throttled => "throttled".to_string(),
        SaveOutcome::Unchanged => "unchanged".to_string(),
        SaveOutcome::Failed => "failed".to_string(),
    }
}

fn settings_json(s: &Settings) -> serde_json::Value {
    json!({
        "brightness": s.brightness,
        "auto_off": s.auto_off,
        "auto_dim": s.auto_dim,
        "auto_zero": s.auto_zero,
        "units": s.units,
        "tare_lock": s.tare_lock,
    })
}

fn boot_json(r: &BootReport) -> serde_json::Value {
    json!({
        "source": source_name(r.source),
        "slot": r.slot,
        "seq": r.seq,
        "corrupt_slots": r.corrupt_slots,
    })
}

fn slot_json(s: &SlotInfo) -> serde_json::Value {
    json!({
        "slot": s.slot,
        "addr": s.addr,
        "seq": s.seq,
        "error": s.error.as_ref().map(ToString::to_string),
        "current": s.current,
    })
}

// ── Assembly ─────────────────────────────────────────────────────────────────

fn build(
    cfg: &scale_config::Config,
    image: &Path,
    load: f64,
    noise: u32,
    clock: hw::BoxedClock,
) -> Result<(Scale, LoadControl)> {
    let storage = hw::open_image(cfg, image)?;
    let (cell, loads) = hw::make_sensor(cfg, load, noise)?;
    let scale = Scale::builder()
        .with_config(cfg)
        .with_load_cell(cell)
        .with_storage(storage)
        .with_clock(clock)
        .build()?;
    let report = scale.store().boot_report();
    tracing::info!(
        image = %image.display(),
        source = %source_name(report.source),
        slot = report.slot,
        seq = report.seq,
        "storage ready"
    );
    Ok((scale, loads))
}

// ── Commands ─────────────────────────────────────────────────────────────────

/// Main loop. Ctrl-C ends it early; the record is flushed either way.
pub fn run(
    cfg: &scale_config::Config,
    image: &Path,
    opts: &RunOpts,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<ScaleStatus> {
    let (clock, loop_clock) = hw::clocks(opts.realtime);
    let (mut scale, loads) = build(cfg, image, opts.load, opts.noise, clock)?;
    scale.init().wrap_err("sensor initialisation")?;

    let mut status = scale.status();
    if json {
        println!("{}", json!({ "event": "init", "status": status_json(0, &status) }));
    }

    for cycle in 0..opts.cycles {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(cycle, "shutdown requested");
            break;
        }
        for step in opts.steps.iter().filter(|s| s.cycle == cycle) {
            loads.set_load(step.kg);
        }
        if opts.tare_at == Some(cycle) {
            let res = scale.try_tare();
            if json {
                let err = res.as_ref().err().map(ToString::to_string);
                println!(
                    "{}",
                    json!({ "event": "tare", "cycle": cycle, "ok": res.is_ok(), "error": err })
                );
            } else if let Err(e) = &res {
                println!("tare failed: {e}");
            }
        }
        if opts.undo_at == Some(cycle) {
            let ok = scale.undo_tare();
            if json {
                println!("{}", json!({ "event": "undo", "cycle": cycle, "ok": ok }));
            } else if !ok {
                println!("undo failed");
            }
        }

        status = scale.cycle();
        if json {
            println!("{}", status_json(cycle, &status));
        }

        match opts.power_save_ms {
            Some(ms) if status.idle => {
                let flag = Arc::clone(shutdown);
                let woke = scale.power_save(Duration::from_millis(ms), || {
                    flag.load(Ordering::Relaxed).then_some(())
                });
                if woke.is_some() {
                    tracing::debug!(cycle, "woken from power save");
                }
            }
            _ => loop_clock.sleep(scale.loop_delay()),
        }
    }

    let out = scale.flush();
    if json {
        println!(
            "{}",
            json!({
                "event": "summary",
                "status": status_json(opts.cycles, &status),
                "flush": outcome_name(out),
                "record": {
                    "tare_offset": scale.store().record().tare_offset,
                    "last_weight": scale.store().record().last_weight,
                    "cal_factor": scale.store().record().cal_factor,
                },
            })
        );
    } else {
        println!("weight: {}", display_text(&status));
        println!("session delta: {:+.2} kg", status.session_delta);
        println!("flush: {}", outcome_name(out));
    }
    Ok(status)
}

/// Decode the image on a RAM copy: boot report plus per-slot diagnostics.
pub fn inspect(cfg: &scale_config::Config, image: &Path, json: bool) -> Result<()> {
    let store_cfg: StoreCfg = (&cfg.storage).into();
    let mut pristine = hw::snapshot_image(cfg, image)?;
    let booted = CalibrationStore::boot(
        pristine.clone(),
        store_cfg.clone(),
        Arc::new(MonotonicClock::new()),
    )?;
    let report = booted.boot_report().clone();
    let record = booted.record().clone();
    let current = (report.source == BootSource::Current).then_some(report.slot);
    let slots = scan_slots(&mut pristine, &store_cfg, current);

    if json {
        let out = json!({
            "image": image.display().to_string(),
            "boot": boot_json(&report),
            "slots": slots.iter().map(slot_json).collect::<Vec<_>>(),
            "record": {
                "seq": record.seq,
                "tare_offset": record.tare_offset,
                "backup_offset": record.backup_offset,
                "last_weight": record.last_weight,
                "cal_factor": record.cal_factor,
                "backup_weight": record.backup_weight,
                "settings": settings_json(&record.settings),
            },
        });
        println!("{out}");
        return Ok(());
    }

    println!("image: {}", image.display());
    println!(
        "boot: {} slot={} seq={}",
        source_name(report.source),
        report.slot,
        report.seq
    );
    for s in &slots {
        let state = match (&s.seq, &s.error) {
            (Some(seq), _) => format!("seq {seq}"),
            (None, Some(e)) => e.to_string(),
            (None, None) => "unknown".to_string(),
        };
        let marker = if s.current { " *" } else { "" };
        println!("slot {} @{:#06x}: {state}{marker}", s.slot, s.addr);
    }
    println!(
        "record: tare_offset={} backup_offset={} last_weight={:.3} cal_factor={:.1}",
        record.tare_offset, record.backup_offset, record.last_weight, record.cal_factor
    );
    Ok(())
}

/// Commit an absolute or nudged factor, then read the platter with it.
pub fn calibrate(
    cfg: &scale_config::Config,
    image: &Path,
    factor: Option<f32>,
    nudge: Option<f32>,
    load: f64,
    json: bool,
) -> Result<()> {
    let (clock, _) = hw::clocks(false);
    let (mut scale, _loads) = build(cfg, image, load, 0, clock)?;
    let current = scale.store().record().cal_factor;
    let requested = match (factor, nudge) {
        (Some(f), _) => f,
        // Fine adjustments land on a 0.1 grid.
        (None, Some(d)) => ((current + d) * 10.0).round() / 10.0,
        (None, None) => eyre::bail!("calibrate needs --factor or --nudge"),
    };
    let applied = scale.commit_calibration(requested)?;
    let reading = match scale.init() {
        Ok(()) => scale.status().weight,
        Err(e) => {
            tracing::warn!(error = %e, "no reading with the new factor");
            Measurement::Error
        }
    };

    if json {
        println!(
            "{}",
            json!({
                "previous": current,
                "requested": requested,
                "applied": applied,
                "weight": weight_json(reading),
            })
        );
    } else {
        println!("cal_factor: {current:.1} -> {applied:.1}");
        if applied != requested {
            println!("(clamped from {requested})");
        }
        match reading {
            Measurement::Value(w) => println!("weight: {w:.2} kg"),
            Measurement::Error => println!("weight: ERR"),
        }
    }
    Ok(())
}

/// Print the stored settings, saving the patch first when one was given.
pub fn settings(
    cfg: &scale_config::Config,
    image: &Path,
    patch: SettingsPatch,
    json: bool,
) -> Result<()> {
    let (clock, _) = hw::clocks(false);
    let (mut scale, _loads) = build(cfg, image, 0.0, 0, clock)?;
    let outcome = if patch.is_empty() {
        None
    } else {
        let next = patch.apply(scale.store().record().settings);
        let out = scale.save_settings(next);
        if out == SaveOutcome::Failed {
            eyre::bail!("settings could not be written to {}", image.display());
        }
        Some(out)
    };
    let s = scale.store().record().settings;

    if json {
        println!(
            "{}",
            json!({
                "settings": settings_json(&s),
                "saved": outcome.map(outcome_name),
            })
        );
    } else {
        println!(
            "brightness={} auto_off={} auto_dim={} auto_zero={} units={} tare_lock={}",
            s.brightness, s.auto_off, s.auto_dim, s.auto_zero, s.units, s.tare_lock
        );
        if let Some(out) = outcome {
            println!("saved: {}", outcome_name(out));
        }
    }
    Ok(())
}

pub fn self_check(cfg: &scale_config::Config, image: &Path, json: bool) -> Result<()> {
    let (clock, _) = hw::clocks(false);
    let (mut scale, _loads) = build(cfg, image, 0.0, 0, clock)?;
    scale.init().wrap_err("sensor initialisation")?;
    let report = scale.store().boot_report().clone();
    let status = scale.status();
    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "boot": boot_json(&report),
                "weight": weight_json(status.weight),
            })
        );
    } else {
        println!(
            "self-check ok: storage {} (slot {}, seq {}), weight {}",
            source_name(report.source),
            report.slot,
            report.seq,
            display_text(&status)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_keeps_unspecified_fields() {
        let patch = SettingsPatch {
            brightness: Some(0),
            tare_lock: Some(Toggle::On),
            ..SettingsPatch::default()
        };
        assert!(!patch.is_empty());
        let s = patch.apply(Settings::default());
        assert_eq!(s.brightness, 0);
        assert_eq!(s.tare_lock, 1);
        assert_eq!(s.auto_off, Settings::default().auto_off);
        assert!(SettingsPatch::default().is_empty());
    }

    #[test]
    fn source_names_are_stable() {
        assert_eq!(source_name(BootSource::Current), "current");
        assert_eq!(
            source_name(BootSource::Migrated { from_version: 3 }),
            "migrated-v3"
        );
        assert_eq!(source_name(BootSource::FactoryDefaults), "factory");
    }
}
