//! Hardware assembly: load cell, storage image and clocks.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use scale_core::image_len;
use scale_hardware::{ERASED, FileEeprom, MemEeprom, SimHandle};
use scale_traits::{Clock, LoadCell, ManualClock, MonotonicClock};

pub type BoxedClock = Box<dyn Clock + Send + Sync>;

/// Storage image path: `--image` wins over `storage.image`.
pub fn image_path(cfg: &scale_config::Config, flag: Option<&Path>) -> PathBuf {
    flag.map_or_else(|| cfg.storage.image.clone(), Path::to_path_buf)
}

pub fn open_image(cfg: &scale_config::Config, path: &Path) -> Result<FileEeprom> {
    FileEeprom::open(path, image_len(cfg.storage.slots))
        .wrap_err_with(|| format!("open storage image {}", path.display()))
}

/// In-memory copy of the image; writes never reach the file.
pub fn snapshot_image(cfg: &scale_config::Config, path: &Path) -> Result<MemEeprom> {
    let mut bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            return Err(e).wrap_err_with(|| format!("open storage image {}", path.display()));
        }
    };
    bytes.resize(image_len(cfg.storage.slots), ERASED);
    Ok(MemEeprom::from_image(bytes))
}

/// Two handles on one timeline: one for the scale, one for the main loop.
pub fn clocks(realtime: bool) -> (BoxedClock, BoxedClock) {
    if realtime {
        (Box::new(MonotonicClock::new()), Box::new(MonotonicClock::new()))
    } else {
        let clock = ManualClock::new();
        (Box::new(clock.clone()), Box::new(clock))
    }
}

pub type Sensor = (Box<dyn LoadCell>, LoadControl);

/// Moves the load on the simulated platter; a no-op on real hardware.
pub struct LoadControl(Option<SimHandle>);

impl LoadControl {
    pub fn set_load(&self, kg: f64) {
        match &self.0 {
            Some(h) => h.set_load(kg),
            None => tracing::warn!(kg, "load changes only apply to the simulated cell"),
        }
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn make_sensor(cfg: &scale_config::Config, _load: f64, _noise: u32) -> Result<Sensor> {
    let cell = scale_hardware::hx711::Hx711::open(cfg.pins.hx711_dt, cfg.pins.hx711_sck)
        .wrap_err("open hx711")?;
    tracing::info!(
        dt = cfg.pins.hx711_dt,
        sck = cfg.pins.hx711_sck,
        "hx711 opened"
    );
    Ok((Box::new(cell), LoadControl(None)))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn make_sensor(_cfg: &scale_config::Config, load: f64, noise: u32) -> Result<Sensor> {
    let cell = scale_hardware::SimulatedLoadCell::new()
        .with_load(load)
        .with_noise(noise, 0x5EED);
    let sim = cell.handle();
    // Test knobs for exercising the fault paths end to end.
    if std::env::var("SCALE_TEST_SIM_STUCK").is_ok_and(|v| v == "1") {
        sim.set_stuck(true);
    }
    if let Some(n) = std::env::var("SCALE_TEST_SIM_INVALID")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
    {
        sim.inject_invalid(n);
    }
    Ok((Box::new(cell), LoadControl(Some(sim))))
}
