use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn json_lines(image: &Path, args: &[&str]) -> Vec<Value> {
    let out = Command::cargo_bin("scale")
        .unwrap()
        .arg("--json")
        .arg("--image")
        .arg(image)
        .args(args)
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("bad line {l:?}: {e}")))
        .collect()
}

fn close(v: &Value, expected: f64) -> bool {
    v.as_f64().is_some_and(|x| (x - expected).abs() < 1e-3)
}

#[test]
fn run_emits_init_cycles_and_summary() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("eeprom.bin");
    let lines = json_lines(
        &image,
        &["run", "--cycles", "60", "--tare-at", "0", "--step", "10:2.25"],
    );

    assert_eq!(lines.first().unwrap()["event"], "init");
    assert_eq!(lines.last().unwrap()["event"], "summary");

    let tare = lines.iter().find(|l| l["event"] == "tare").unwrap();
    assert_eq!(tare["ok"], true);
    assert!(tare["error"].is_null());

    let cycles: Vec<&Value> = lines.iter().filter(|l| l.get("event").is_none()).collect();
    assert_eq!(cycles.len(), 60);
    for (i, c) in cycles.iter().enumerate() {
        assert_eq!(c["cycle"], i as u64);
        for key in [
            "weight",
            "display",
            "session_delta",
            "stable",
            "frozen",
            "overloaded",
            "idle",
            "trend",
            "auto_zero",
            "undo_available",
        ] {
            assert!(c.get(key).is_some(), "cycle {i} lacks {key}");
        }
    }
    // Right after the load arrives the weight is climbing
    assert!(cycles.iter().any(|c| c["trend"] == "up"));

    let summary = lines.last().unwrap();
    assert!(close(&summary["status"]["display"], 2.25));
    assert_eq!(summary["status"]["stable"], true);
    assert_eq!(summary["status"]["undo_available"], true);
    assert_eq!(summary["record"]["tare_offset"], 84_000);
}

#[test]
fn fresh_platter_without_tare_reads_overloaded() {
    let dir = tempdir().unwrap();
    let lines = json_lines(&dir.path().join("eeprom.bin"), &["run", "--cycles", "3"]);
    let init = &lines[0];
    // Factory offset is zero, so the raw sensor bias shows up as weight
    assert_eq!(init["status"]["overloaded"], false);
    assert!(init["status"]["weight"].as_f64().unwrap() > 30.0);
    assert_eq!(lines[1]["overloaded"], true);
}

#[test]
fn inspect_reports_boot_and_every_slot() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("eeprom.bin");

    let fresh = json_lines(&image, &["inspect"]);
    assert_eq!(fresh[0]["boot"]["source"], "factory");
    assert_eq!(fresh[0]["slots"].as_array().unwrap().len(), 4);
    assert!(
        fresh[0]["slots"]
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["seq"].is_null() && s["error"].is_string())
    );

    json_lines(&image, &["run", "--cycles", "5", "--tare-at", "0"]);

    let after = json_lines(&image, &["inspect"]);
    let v = &after[0];
    assert_eq!(v["boot"]["source"], "current");
    let slots = v["slots"].as_array().unwrap();
    let current: Vec<&Value> = slots.iter().filter(|s| s["current"] == true).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["slot"], v["boot"]["slot"]);
    assert_eq!(current[0]["seq"], v["record"]["seq"]);
    assert_eq!(v["record"]["tare_offset"], 84_000);
    assert_eq!(v["record"]["settings"]["auto_zero"], 1);
}

#[test]
fn calibrate_and_settings_report_what_was_applied() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("eeprom.bin");

    let cal = json_lines(&image, &["calibrate", "--factor", "0"]);
    assert!(close(&cal[0]["previous"], 2280.0));
    assert!(close(&cal[0]["applied"], 1.0));

    let set = json_lines(&image, &["settings", "--tare-lock", "on", "--units", "9"]);
    assert_eq!(set[0]["settings"]["tare_lock"], 1);
    assert!(set[0]["settings"]["units"].as_u64().unwrap() < 9);
    assert!(set[0]["saved"].as_str().unwrap().starts_with("written"));

    let again = json_lines(&image, &["settings"]);
    assert!(again[0]["saved"].is_null());
    assert_eq!(again[0]["settings"], set[0]["settings"]);
}

#[test]
fn self_check_reports_storage() {
    let dir = tempdir().unwrap();
    let lines = json_lines(&dir.path().join("eeprom.bin"), &["self-check"]);
    assert_eq!(lines[0]["ok"], true);
    assert_eq!(lines[0]["boot"]["source"], "factory");
    assert!(lines[0]["weight"].is_number());
}
