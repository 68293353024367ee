//! Decoders for the layouts written by earlier firmware.
//!
//! - v3 (32 bytes): current layout without `units` and `tare_lock`, CRC-16.
//! - v2 (28 bytes): no settings at all, 16-bit byte-sum checksum.
//!
//! Fields a layout lacks take their factory defaults on translation.

use crate::checksum::{crc16_ccitt, sum16};
use crate::record::{CalibrationRecord, MAGIC, Reader, Settings, SlotError, verify_crc16};

/// Known legacy layouts, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacySchema {
    V3,
    V2,
}

impl LegacySchema {
    /// Migration order: newest schema first.
    pub const ALL: [Self; 2] = [Self::V3, Self::V2];

    pub fn version(self) -> u8 {
        match self {
            Self::V3 => 3,
            Self::V2 => 2,
        }
    }

    /// Slot stride on media.
    pub fn record_len(self) -> usize {
        match self {
            Self::V3 => 32,
            Self::V2 => 28,
        }
    }

    /// Integrity check and translation to the current record.
    pub fn decode(self, bytes: &[u8]) -> Result<CalibrationRecord, SlotError> {
        let len = self.record_len();
        let bytes = bytes.get(..len).ok_or(SlotError::Truncated(bytes.len()))?;
        let mut r = Reader::new(bytes);
        r.header(self.version())?;
        match self {
            Self::V3 => verify_crc16(bytes)?,
            Self::V2 => {
                let stored = u16::from_le_bytes([bytes[len - 2], bytes[len - 1]]);
                let computed = sum16(&bytes[..len - 2]);
                if stored != computed {
                    return Err(SlotError::BadChecksum { stored, computed });
                }
            }
        }
        let seq = r.u8();
        let tare_offset = r.i32();
        let backup_offset = r.i32();
        let last_weight = r.f32();
        let cal_factor = r.f32();
        let backup_weight = r.f32();
        let settings = match self {
            Self::V3 => Settings {
                brightness: r.u8(),
                auto_off: r.u8(),
                auto_dim: r.u8(),
                auto_zero: r.u8(),
                units: 0,
                tare_lock: 0,
            },
            Self::V2 => Settings::default(),
        };
        Ok(CalibrationRecord {
            seq,
            tare_offset,
            backup_offset,
            last_weight,
            cal_factor,
            backup_weight,
            settings,
        })
    }

    /// Serialise `rec` the way the old firmware did (media fixtures, fuzz seeds).
    pub fn encode(self, rec: &CalibrationRecord) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.record_len());
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.push(self.version());
        out.push(rec.seq);
        out.extend_from_slice(&rec.tare_offset.to_le_bytes());
        out.extend_from_slice(&rec.backup_offset.to_le_bytes());
        out.extend_from_slice(&rec.last_weight.to_le_bytes());
        out.extend_from_slice(&rec.cal_factor.to_le_bytes());
        out.extend_from_slice(&rec.backup_weight.to_le_bytes());
        let sum = match self {
            Self::V3 => {
                let s = &rec.settings;
                out.extend_from_slice(&[s.brightness, s.auto_off, s.auto_dim, s.auto_zero]);
                crc16_ccitt(&out)
            }
            Self::V2 => sum16(&out),
        };
        out.extend_from_slice(&sum.to_le_bytes());
        out
    }
}
