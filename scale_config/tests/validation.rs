use rstest::rstest;
use scale_config::{load_file, load_toml};
use tempfile::tempdir;

#[test]
fn accepts_full_document() {
    let toml = r#"
[pins]
hx711_dt = 5
hx711_sck = 6

[filter]
ema_alpha = 0.3

[stability]
window = 8
threshold_kg = 0.03
freeze_threshold_kg = 0.02
trend_threshold_kg = 0.03
overload_kg = 5.0

[sensor]
timeout_ms = 500
error_count_max = 3
samples_startup = 10
samples_read = 3
samples_tare = 10
samples_undo = 5
samples_verify = 1

[tare]
sane_max_kg = 500.0
weight_change_threshold_kg = 0.05

[auto_zero]
threshold_kg = 0.05
step_counts = 1
interval_ms = 3000
min_stable_cycles = 5

[storage]
image = "var/eeprom.bin"
slots = 4
min_interval_ms = 300000
cal_factor_min = 1.0
cal_factor_max = 100000.0
default_cal_factor = 2280.0

[power]
loop_delay_ms = 30
idle_loop_delay_ms = 250

[logging]
level = "debug"
rotation = "daily"
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config");
    assert_eq!(cfg.pins.hx711_dt, 5);
    assert_eq!(cfg.storage.image.to_str(), Some("var/eeprom.bin"));
}

#[rstest]
#[case("[filter]\nema_alpha = 0.0", "ema_alpha must be in (0.0, 1.0]")]
#[case("[filter]\nema_alpha = 1.5", "ema_alpha must be in (0.0, 1.0]")]
#[case("[stability]\nwindow = 1", "stability.window must be >= 2")]
#[case("[stability]\nthreshold_kg = 0.0", "stability.threshold_kg must be > 0")]
#[case("[sensor]\ntimeout_ms = 0", "sensor.timeout_ms must be >= 1")]
#[case("[sensor]\nerror_count_max = 0", "sensor.error_count_max must be >= 1")]
#[case("[sensor]\nsamples_tare = 0", "sensor.samples_tare must be >= 1")]
#[case("[auto_zero]\nstep_counts = 0", "auto_zero.step_counts must be >= 1")]
#[case("[storage]\nslots = 0", "storage.slots must be >= 1")]
#[case(
    "[storage]\ncal_factor_min = 10.0\ncal_factor_max = 5.0",
    "0 < min < max"
)]
#[case(
    "[storage]\ndefault_cal_factor = 0.5",
    "default_cal_factor must lie within"
)]
#[case(
    "[power]\nloop_delay_ms = 100\nidle_loop_delay_ms = 50",
    "idle_loop_delay_ms must be >="
)]
#[case("[logging]\nrotation = \"weekly\"", "never|daily|hourly")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(format!("{err}").contains(needle), "got: {err}");
}

#[test]
fn unknown_type_is_a_parse_error() {
    assert!(load_toml("[stability]\nwindow = \"eight\"").is_err());
}

#[test]
fn load_file_parses_and_validates() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.toml");
    std::fs::write(&good, "[auto_zero]\ninterval_ms = 1500\n").unwrap();
    let cfg = load_file(&good).expect("good config");
    assert_eq!(cfg.auto_zero.interval_ms, 1500);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[storage]\nslots = 0\n").unwrap();
    let err = load_file(&bad).expect_err("invalid config");
    assert!(format!("{err}").contains("storage.slots"));
}

#[test]
fn load_file_reports_missing_path() {
    let dir = tempdir().unwrap();
    let err = load_file(&dir.path().join("nope.toml")).expect_err("missing file");
    assert!(format!("{err}").starts_with("read config"));
}
