use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use scale_traits::{BoxError, LoadCell};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_data_ready;

/// HX711 bit-banged over two Raspberry Pi GPIO lines.
pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
    offset: i32,
    scale: f32,
    poll: Duration,
}

impl Hx711 {
    /// Claim `dt_pin` / `sck_pin` (BCM numbering). Channel A, gain 128 by default.
    pub fn open(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses: 25,
            offset: 0,
            scale: 1.0,
            poll: Duration::from_micros(200),
        })
    }

    pub fn with_gain_pulses(mut self, pulses: u8) -> Self {
        self.gain_pulses = pulses.clamp(25, 27);
        self
    }

    fn read_raw(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        let waited = wait_data_ready(|| dt.is_high(), timeout, self.poll)?;

        // Clock out 24 bits
        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Pulse gain to set next measurement
        for _ in 0..self.gain_pulses - 24 {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, waited_us = waited.as_micros() as u64, "hx711 raw read");
        Ok(value)
    }

    fn average_raw(&mut self, samples: u8) -> Result<f64> {
        let n = samples.max(1);
        let mut sum: i64 = 0;
        for _ in 0..n {
            sum += i64::from(self.read_raw(Duration::from_millis(500))?);
        }
        Ok(sum as f64 / f64::from(n))
    }
}

impl LoadCell for Hx711 {
    fn set_scale(&mut self, factor: f32) {
        self.scale = factor;
    }

    fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    fn offset(&self) -> i32 {
        self.offset
    }

    fn tare(&mut self, samples: u8) -> std::result::Result<i32, BoxError> {
        let avg = self.average_raw(samples)?;
        self.offset = avg.round() as i32;
        Ok(self.offset)
    }

    fn wait_ready(&mut self, timeout: Duration) -> bool {
        let dt = &self.dt;
        wait_data_ready(|| dt.is_high(), timeout, self.poll).is_ok()
    }

    fn read_units(&mut self, samples: u8) -> std::result::Result<f64, BoxError> {
        let avg = self.average_raw(samples)?;
        Ok((avg - f64::from(self.offset)) / f64::from(self.scale))
    }

    fn power_down(&mut self) {
        // SCK held high for >60 µs puts the chip to sleep.
        self.sck.set_low();
        self.sck.set_high();
        std::thread::sleep(Duration::from_micros(80));
    }

    fn power_up(&mut self) {
        self.sck.set_low();
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}
