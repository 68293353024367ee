//! Wear-leveled, checksum-verified calibration store.
//!
//! The record lives in one of `slots` fixed locations of `RECORD_LEN` bytes.
//! Every write goes to the slot after the current one with the next sequence
//! number, so the previous copy survives until the ring comes back around and
//! a torn write only ever damages the newest slot.

use std::sync::Arc;
use std::time::Instant;

use scale_traits::{Clock, Storage};

use crate::config::StoreCfg;
use crate::error::{Result, ScaleError};
use crate::hw_error::map_storage_error;
use crate::legacy::LegacySchema;
use crate::record::{CalibrationRecord, PAYLOAD_LEN, RECORD_LEN, SlotError};
use crate::util::{elapsed_at_least, seq_newer, wrap_next};

/// Spare bytes reserved after the slot ring.
pub const SPARE_BYTES: usize = 16;

/// Device size for a ring of `slots` records plus the spare area.
pub fn image_len(slots: usize) -> usize {
    slots * RECORD_LEN + SPARE_BYTES
}

/// Where the record in RAM came from at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSource {
    /// Newest valid slot in the current layout.
    Current,
    /// Translated from a legacy layout and rewritten to slot 0.
    Migrated { from_version: u8 },
    /// Nothing usable on media; factory record written to slot 0.
    FactoryDefaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootReport {
    pub source: BootSource,
    pub slot: usize,
    pub seq: u8,
    /// Slots that held something other than erased cells but failed validation.
    pub corrupt_slots: Vec<usize>,
}

/// Result of a save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { slot: usize, seq: u8 },
    /// Throttled save inside the minimum interval.
    Throttled,
    /// Payload matches what is on media and nothing was marked dirty.
    Unchanged,
    /// Device write or commit failed; the error was logged.
    Failed,
}

impl SaveOutcome {
    pub fn written(self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Per-slot diagnostics for the current layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    pub slot: usize,
    pub addr: usize,
    pub seq: Option<u8>,
    pub error: Option<SlotError>,
    pub current: bool,
}

pub struct CalibrationStore<S: Storage> {
    storage: S,
    cfg: StoreCfg,
    record: CalibrationRecord,
    snapshot: [u8; PAYLOAD_LEN],
    current_slot: usize,
    dirty: bool,
    last_write_ms: u64,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    report: BootReport,
}

impl<S: Storage> core::fmt::Debug for CalibrationStore<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CalibrationStore")
            .field("record", &self.record)
            .field("current_slot", &self.current_slot)
            .field("dirty", &self.dirty)
            .finish()
    }
}

fn read_slot<S: Storage>(
    storage: &mut S,
    addr: usize,
    len: usize,
) -> std::result::Result<Vec<u8>, SlotError> {
    let mut buf = vec![0u8; len];
    storage
        .read(addr, &mut buf)
        .map_err(|e| SlotError::Read(e.to_string()))?;
    Ok(buf)
}

/// Newest valid record among `slots` locations of `stride` bytes, plus the
/// slots that failed for a reason other than being erased.
fn newest_valid<S, F>(
    storage: &mut S,
    cfg: &StoreCfg,
    stride: usize,
    decode: F,
) -> (Option<(usize, CalibrationRecord)>, Vec<(usize, SlotError)>)
where
    S: Storage,
    F: Fn(&[u8]) -> std::result::Result<CalibrationRecord, SlotError>,
{
    let mut best: Option<(usize, CalibrationRecord)> = None;
    let mut rejected = Vec::new();
    let usable = cfg.slots.min(storage.capacity() / stride);
    for slot in 0..usable {
        let decoded = read_slot(storage, slot * stride, stride).and_then(|b| {
            let rec = decode(&b)?;
            rec.check_values(cfg)?;
            Ok(rec)
        });
        match decoded {
            Ok(rec) => {
                // Ties keep the lower slot.
                if best.as_ref().is_none_or(|(_, b)| seq_newer(rec.seq, b.seq)) {
                    best = Some((slot, rec));
                }
            }
            Err(SlotError::Erased) => {}
            Err(e) => rejected.push((slot, e)),
        }
    }
    (best, rejected)
}

/// Per-slot diagnostics without booting; `current` marks one slot as in use.
pub fn scan_slots<S: Storage>(
    storage: &mut S,
    cfg: &StoreCfg,
    current: Option<usize>,
) -> Vec<SlotInfo> {
    let usable = cfg.slots.min(storage.capacity() / RECORD_LEN);
    (0..usable)
        .map(|slot| {
            let addr = slot * RECORD_LEN;
            let decoded = read_slot(storage, addr, RECORD_LEN).and_then(|b| {
                let rec = CalibrationRecord::decode(&b)?;
                rec.check_values(cfg)?;
                Ok(rec)
            });
            let (seq, error) = match decoded {
                Ok(rec) => (Some(rec.seq), None),
                Err(e) => (None, Some(e)),
            };
            SlotInfo {
                slot,
                addr,
                seq,
                error,
                current: current == Some(slot),
            }
        })
        .collect()
}

impl<S: Storage> CalibrationStore<S> {
    /// Load the newest valid record, migrating or factory-resetting as needed.
    ///
    /// Only a device too small for the slot ring is an error; unreadable or
    /// corrupt media falls through to migration and then to factory defaults.
    pub fn boot(
        mut storage: S,
        cfg: StoreCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        if cfg.slots == 0 {
            return Err(eyre::Report::new(ScaleError::Config(
                "storage needs at least one slot".into(),
            )));
        }
        let needed = cfg.slots * RECORD_LEN;
        if storage.capacity() < needed {
            return Err(eyre::Report::new(ScaleError::Config(format!(
                "storage capacity {} is smaller than {} slots x {} bytes",
                storage.capacity(),
                cfg.slots,
                RECORD_LEN
            ))));
        }

        let (found, rejected) =
            newest_valid(&mut storage, &cfg, RECORD_LEN, CalibrationRecord::decode);
        for (slot, e) in &rejected {
            let err = ScaleError::StorageCorruption {
                slot: *slot,
                reason: e.to_string(),
            };
            tracing::debug!(error = %err, "slot rejected");
        }
        let corrupt_slots: Vec<usize> = rejected.iter().map(|(s, _)| *s).collect();

        let (source, slot, record, needs_write) = match found {
            Some((slot, rec)) => (BootSource::Current, slot, rec, false),
            None => match Self::find_legacy(&mut storage, &cfg) {
                Some((schema, rec)) => (
                    BootSource::Migrated {
                        from_version: schema.version(),
                    },
                    0,
                    rec,
                    true,
                ),
                None => (
                    BootSource::FactoryDefaults,
                    0,
                    CalibrationRecord::factory(cfg.default_cal_factor),
                    true,
                ),
            },
        };

        let epoch = clock.now();
        let mut store = Self {
            storage,
            cfg,
            record,
            snapshot: [0u8; PAYLOAD_LEN],
            current_slot: slot,
            dirty: false,
            last_write_ms: 0,
            clock,
            epoch,
            report: BootReport {
                source,
                slot,
                seq: 0,
                corrupt_slots,
            },
        };

        let mut write_failed = false;
        if needs_write {
            let rec = store.record.clone();
            if let Err(e) = store.write_slot(0, &rec) {
                tracing::warn!(error = %e, "initial record write failed");
                write_failed = true;
            }
        }
        store.record.sanitize();
        store.snapshot = store.record.payload();
        // Retry on the next save opportunity.
        store.dirty = write_failed;
        store.report.seq = store.record.seq;
        store.last_write_ms = store.now_ms();

        tracing::info!(
            source = ?store.report.source,
            slot = store.report.slot,
            seq = store.report.seq,
            corrupt = store.report.corrupt_slots.len(),
            "calibration store booted"
        );
        Ok(store)
    }

    fn find_legacy(storage: &mut S, cfg: &StoreCfg) -> Option<(LegacySchema, CalibrationRecord)> {
        LegacySchema::ALL.into_iter().find_map(|schema| {
            let (found, _) = newest_valid(storage, cfg, schema.record_len(), |b| schema.decode(b));
            found.map(|(slot, rec)| {
                tracing::info!(from = schema.version(), slot, seq = rec.seq, "migrating record");
                (schema, rec)
            })
        })
    }

    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    fn write_slot(
        &mut self,
        slot: usize,
        rec: &CalibrationRecord,
    ) -> std::result::Result<(), ScaleError> {
        let bytes = rec.encode();
        self.storage
            .write(slot * RECORD_LEN, &bytes)
            .map_err(|e| map_storage_error(&*e))?;
        self.storage.commit().map_err(|e| map_storage_error(&*e))
    }

    fn write_next(&mut self) -> SaveOutcome {
        let slot = wrap_next(self.current_slot, self.cfg.slots);
        let mut rec = self.record.clone();
        rec.seq = rec.seq.wrapping_add(1);
        match self.write_slot(slot, &rec) {
            Ok(()) => {
                self.record.seq = rec.seq;
                self.current_slot = slot;
                self.snapshot = self.record.payload();
                self.dirty = false;
                self.last_write_ms = self.now_ms();
                tracing::info!(slot, seq = rec.seq, "calibration saved");
                SaveOutcome::Written { slot, seq: rec.seq }
            }
            Err(e) => {
                tracing::warn!(error = %e, slot, "calibration write failed");
                SaveOutcome::Failed
            }
        }
    }

    fn unchanged(&self) -> bool {
        !self.dirty && self.record.payload() == self.snapshot
    }

    /// Throttled save: skipped inside the minimum write interval.
    pub fn save(&mut self) -> SaveOutcome {
        if !elapsed_at_least(self.now_ms(), self.last_write_ms, self.cfg.min_interval_ms) {
            tracing::debug!("save throttled");
            return SaveOutcome::Throttled;
        }
        if self.unchanged() {
            return SaveOutcome::Unchanged;
        }
        self.write_next()
    }

    /// Immediate save; only an unchanged, clean record is skipped.
    pub fn force_save(&mut self) -> SaveOutcome {
        if self.unchanged() {
            return SaveOutcome::Unchanged;
        }
        self.write_next()
    }

    /// Critical-power path: persist whatever is pending right now.
    pub fn flush(&mut self) -> SaveOutcome {
        let out = self.force_save();
        tracing::info!(outcome = ?out, "flush");
        out
    }

    /// Request persistence of an in-place change at the next save opportunity.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut CalibrationRecord {
        &mut self.record
    }

    pub fn cfg(&self) -> &StoreCfg {
        &self.cfg
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn boot_report(&self) -> &BootReport {
        &self.report
    }

    /// Decode every slot of the current layout as it is on the device now.
    pub fn scan(&mut self) -> Vec<SlotInfo> {
        scan_slots(&mut self.storage, &self.cfg, Some(self.current_slot))
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}
