//! Persisted calibration record and its current on-media layout.
//!
//! Layout (little-endian, 34 bytes):
//!
//! | off | field          | type |
//! |-----|----------------|------|
//! | 0   | magic          | u32  |
//! | 4   | version        | u8   |
//! | 5   | seq            | u8   |
//! | 6   | tare_offset    | i32  |
//! | 10  | backup_offset  | i32  |
//! | 14  | last_weight    | f32  |
//! | 18  | cal_factor     | f32  |
//! | 22  | backup_weight  | f32  |
//! | 26  | brightness     | u8   |
//! | 27  | auto_off       | u8   |
//! | 28  | auto_dim       | u8   |
//! | 29  | auto_zero      | u8   |
//! | 30  | units          | u8   |
//! | 31  | tare_lock      | u8   |
//! | 32  | crc16          | u16  |
//!
//! The CRC covers every byte before it.

use thiserror::Error;

use crate::checksum::crc16_ccitt;
use crate::config::StoreCfg;

pub const MAGIC: u32 = 0x002A_2B3C;
pub const VERSION: u8 = 4;
pub const RECORD_LEN: usize = 34;

/// Bytes between the header (magic, version, seq) and the checksum.
pub const PAYLOAD_LEN: usize = RECORD_LEN - 6 - 2;

pub const BRIGHTNESS_LEVELS: u8 = 3;
pub const AUTO_OFF_MODES: u8 = 4;
pub const AUTO_DIM_MODES: u8 = 3;
pub const UNIT_MODES: u8 = 2;

/// Why a slot did not yield a usable record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SlotError {
    #[error("slot is erased")]
    Erased,
    #[error("slot shorter than the layout ({0} bytes)")]
    Truncated(usize),
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("schema version {0} does not match")]
    BadVersion(u8),
    #[error("checksum mismatch (stored {stored:#06x}, computed {computed:#06x})")]
    BadChecksum { stored: u16, computed: u16 },
    #[error("calibration factor {0} out of range")]
    CalFactorOutOfRange(f32),
    #[error("last weight is not finite")]
    NonFiniteWeight,
    #[error("read failed: {0}")]
    Read(String),
}

/// User settings carried in the record. Values are raw indices; [`Settings::clamped`]
/// brings them back into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub brightness: u8,
    pub auto_off: u8,
    pub auto_dim: u8,
    pub auto_zero: u8,
    pub units: u8,
    pub tare_lock: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brightness: 2,
            auto_off: 1,
            auto_dim: 1,
            auto_zero: 1,
            units: 0,
            tare_lock: 0,
        }
    }
}

impl Settings {
    pub fn clamped(self) -> Self {
        Self {
            brightness: self.brightness.min(BRIGHTNESS_LEVELS - 1),
            auto_off: self.auto_off.min(AUTO_OFF_MODES - 1),
            auto_dim: self.auto_dim.min(AUTO_DIM_MODES - 1),
            auto_zero: u8::from(self.auto_zero != 0),
            units: self.units.min(UNIT_MODES - 1),
            tare_lock: u8::from(self.tare_lock != 0),
        }
    }

    pub fn auto_zero_on(&self) -> bool {
        self.auto_zero != 0
    }

    pub fn tare_lock_on(&self) -> bool {
        self.tare_lock != 0
    }
}

/// The single owned copy of persisted state.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    pub seq: u8,
    pub tare_offset: i32,
    pub backup_offset: i32,
    pub last_weight: f32,
    pub cal_factor: f32,
    pub backup_weight: f32,
    pub settings: Settings,
}

impl CalibrationRecord {
    /// Factory state: zero offsets and weights, default factor and settings, seq 0.
    pub fn factory(cal_factor: f32) -> Self {
        Self {
            seq: 0,
            tare_offset: 0,
            backup_offset: 0,
            last_weight: 0.0,
            cal_factor,
            backup_weight: 0.0,
            settings: Settings::default(),
        }
    }

    /// Field bytes between header and checksum; equal payloads mean nothing to save.
    pub fn payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        let mut w = Writer::new(&mut out);
        w.i32(self.tare_offset);
        w.i32(self.backup_offset);
        w.f32(self.last_weight);
        w.f32(self.cal_factor);
        w.f32(self.backup_weight);
        w.u8(self.settings.brightness);
        w.u8(self.settings.auto_off);
        w.u8(self.settings.auto_dim);
        w.u8(self.settings.auto_zero);
        w.u8(self.settings.units);
        w.u8(self.settings.tare_lock);
        out
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        {
            let mut w = Writer::new(&mut out);
            w.u32(MAGIC);
            w.u8(VERSION);
            w.u8(self.seq);
            w.bytes(&self.payload());
        }
        let crc = crc16_ccitt(&out[..RECORD_LEN - 2]);
        out[RECORD_LEN - 2..].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Integrity check (magic, version, checksum) and field decode.
    pub fn decode(bytes: &[u8]) -> Result<Self, SlotError> {
        let bytes = bytes
            .get(..RECORD_LEN)
            .ok_or(SlotError::Truncated(bytes.len()))?;
        let mut r = Reader::new(bytes);
        r.header(VERSION)?;
        verify_crc16(bytes)?;
        let seq = r.u8();
        Ok(Self {
            seq,
            tare_offset: r.i32(),
            backup_offset: r.i32(),
            last_weight: r.f32(),
            cal_factor: r.f32(),
            backup_weight: r.f32(),
            settings: Settings {
                brightness: r.u8(),
                auto_off: r.u8(),
                auto_dim: r.u8(),
                auto_zero: r.u8(),
                units: r.u8(),
                tare_lock: r.u8(),
            },
        })
    }

    /// Value checks shared by every layout.
    pub fn check_values(&self, cfg: &StoreCfg) -> Result<(), SlotError> {
        if !cfg.accepts_cal_factor(self.cal_factor) {
            return Err(SlotError::CalFactorOutOfRange(self.cal_factor));
        }
        if !self.last_weight.is_finite() {
            return Err(SlotError::NonFiniteWeight);
        }
        Ok(())
    }

    /// Replace a non-finite backup weight with 0.
    pub fn sanitize(&mut self) {
        if !self.backup_weight.is_finite() {
            self.backup_weight = 0.0;
        }
    }
}

pub(crate) fn verify_crc16(bytes: &[u8]) -> Result<(), SlotError> {
    let n = bytes.len();
    let stored = u16::from_le_bytes([bytes[n - 2], bytes[n - 1]]);
    let computed = crc16_ccitt(&bytes[..n - 2]);
    if stored != computed {
        return Err(SlotError::BadChecksum { stored, computed });
    }
    Ok(())
}

/// Little-endian field reader over a slice already checked for length.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    pub(crate) fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub(crate) fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub(crate) fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    pub(crate) fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    /// Magic and version; an all-erased header is reported as such.
    pub(crate) fn header(&mut self, version: u8) -> Result<(), SlotError> {
        if self.buf.iter().all(|&b| b == 0xFF) {
            return Err(SlotError::Erased);
        }
        let magic = self.u32();
        if magic != MAGIC {
            return Err(SlotError::BadMagic(magic));
        }
        let v = self.u8();
        if v != version {
            return Err(SlotError::BadVersion(v));
        }
        Ok(())
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, b: &[u8]) {
        self.buf[self.pos..self.pos + b.len()].copy_from_slice(b);
        self.pos += b.len();
    }

    fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.bytes(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.bytes(&v.to_le_bytes());
    }
}
