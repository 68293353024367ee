use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::process::Command;
use tempfile::tempdir;

#[rstest]
#[case("run")]
#[case("self-check")]
fn stuck_sensor_bubbles_to_cli(#[case] sub: &str) {
    let dir = tempdir().unwrap();

    Command::cargo_bin("scale")
        .unwrap()
        .arg("--image")
        .arg(dir.path().join("eeprom.bin"))
        .arg(sub)
        .env("SCALE_TEST_SIM_STUCK", "1")
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "What happened: Load cell did not become ready in time.",
        ));
}

#[test]
fn stuck_sensor_json_error_goes_to_stdout() {
    let dir = tempdir().unwrap();

    let out = Command::cargo_bin("scale")
        .unwrap()
        .arg("--json")
        .arg("--image")
        .arg(dir.path().join("eeprom.bin"))
        .arg("run")
        .env("SCALE_TEST_SIM_STUCK", "1")
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(3));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(v["reason"], "SensorTimeout");
    assert_eq!(v["exit_code"], 3);
}

#[test]
fn invalid_readings_latch_the_error_display_then_recover() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("eeprom.bin");

    // Startup consumes one invalid reading (counted as zero), the next three
    // trip the failure counter.
    let out = Command::cargo_bin("scale")
        .unwrap()
        .arg("--json")
        .arg("--image")
        .arg(&image)
        .args(["run", "--cycles", "12", "--tare-at", "0"])
        .env("SCALE_TEST_SIM_INVALID", "4")
        .output()
        .unwrap();
    assert!(out.status.success());

    let lines: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let tare = lines.iter().find(|l| l["event"] == "tare").unwrap();
    assert_eq!(tare["ok"], true);

    let cycles: Vec<&serde_json::Value> =
        lines.iter().filter(|l| l.get("event").is_none()).collect();
    assert!(cycles[0]["display"].is_number());
    assert!(cycles[2]["display"].is_null(), "third failure latches ERR");
    assert!(cycles.last().unwrap()["display"].is_number());
}
