//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "scale", version, about = "Kitchen scale firmware host")]
pub struct Cli {
    /// Path to config TOML; firmware defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Storage image file (overrides storage.image)
    #[arg(long, value_name = "FILE")]
    pub image: Option<PathBuf>,

    /// JSON lines on stdout and JSON logs on stderr
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn as_flag(self) -> u8 {
        u8::from(self == Toggle::On)
    }
}

/// A load change applied before a given cycle: `CYCLE:KG`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoadStep {
    pub cycle: u32,
    pub kg: f64,
}

fn parse_load_step(s: &str) -> Result<LoadStep, String> {
    let (cycle, kg) = s
        .split_once(':')
        .ok_or_else(|| format!("expected CYCLE:KG, got '{s}'"))?;
    let cycle = cycle
        .trim()
        .parse()
        .map_err(|e| format!("bad cycle '{cycle}': {e}"))?;
    let kg: f64 = kg.trim().parse().map_err(|e| format!("bad load '{kg}': {e}"))?;
    if !kg.is_finite() {
        return Err(format!("load must be finite, got {kg}"));
    }
    Ok(LoadStep { cycle, kg })
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the weighing loop against the simulated load cell
    Run {
        /// Number of main-loop cycles
        #[arg(long, default_value_t = 100)]
        cycles: u32,
        /// Load on the platter at power-on, in kg
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        load: f64,
        /// Change the load before a cycle; repeatable (e.g. --step 20:1.5)
        #[arg(long = "step", value_name = "CYCLE:KG", value_parser = parse_load_step)]
        steps: Vec<LoadStep>,
        /// Tare before this cycle
        #[arg(long, value_name = "CYCLE")]
        tare_at: Option<u32>,
        /// Undo the last tare before this cycle
        #[arg(long, value_name = "CYCLE")]
        undo_at: Option<u32>,
        /// Simulated noise amplitude in raw counts
        #[arg(long, default_value_t = 0)]
        noise: u32,
        /// Drop into low-power sleep for this long after every idle cycle
        #[arg(long, value_name = "MS")]
        power_save_ms: Option<u64>,
        /// Sleep in real time instead of advancing a simulated clock
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
    },
    /// Decode every slot of the storage image without modifying it
    Inspect,
    /// Commit a calibration factor
    Calibrate {
        /// Absolute factor (raw counts per kg)
        #[arg(long, conflicts_with = "nudge")]
        factor: Option<f32>,
        /// Adjust the stored factor by this amount, rounded to 0.1
        #[arg(long, allow_negative_numbers = true)]
        nudge: Option<f32>,
        /// Load on the simulated platter while checking the result, in kg
        #[arg(long, default_value_t = 0.0)]
        load: f64,
    },
    /// Show or change persisted settings
    Settings {
        #[arg(long)]
        brightness: Option<u8>,
        #[arg(long)]
        auto_off: Option<u8>,
        #[arg(long)]
        auto_dim: Option<u8>,
        #[arg(long, value_enum)]
        auto_zero: Option<Toggle>,
        #[arg(long)]
        units: Option<u8>,
        #[arg(long, value_enum)]
        tare_lock: Option<Toggle>,
    },
    /// Quick health check (storage image and sensor)
    SelfCheck,
}
