#![allow(dead_code)]

use std::sync::Arc;

use scale_core::mocks::ScriptedCell;
use scale_core::{CalibrationStore, ConditioningPipeline, PipelineCfg, StoreCfg, image_len};
use scale_hardware::MemEeprom;
use scale_traits::{LoadCell, ManualClock};

/// Four slots plus the spare area.
pub fn eeprom() -> MemEeprom {
    MemEeprom::new(image_len(4))
}

pub fn boot(dev: MemEeprom, clock: &ManualClock) -> CalibrationStore<MemEeprom> {
    CalibrationStore::boot(dev, StoreCfg::default(), Arc::new(clock.clone())).expect("boot")
}

pub fn pipeline_with<L: LoadCell>(
    cell: L,
    cfg: PipelineCfg,
    clock: &ManualClock,
) -> ConditioningPipeline<L> {
    ConditioningPipeline::new(cell, cfg, Arc::new(clock.clone()))
}

pub fn pipeline(cell: ScriptedCell, clock: &ManualClock) -> ConditioningPipeline<ScriptedCell> {
    pipeline_with(cell, PipelineCfg::default(), clock)
}
