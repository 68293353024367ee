#![no_main]
use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use scale_core::{CalibrationStore, StoreCfg, image_len};
use scale_hardware::{ERASED, MemEeprom};
use scale_traits::ManualClock;

fuzz_target!(|data: &[u8]| {
    let mut image = data.to_vec();
    image.resize(image_len(4), ERASED);
    let dev = MemEeprom::from_image(image);
    // Any image boots: current, migrated or factory.
    let clock = Arc::new(ManualClock::new());
    let Ok(mut store) = CalibrationStore::boot(dev, StoreCfg::default(), clock) else {
        return;
    };
    let before = store.record().seq;
    store.mark_dirty();
    let _ = store.force_save();
    assert_eq!(store.record().seq, before.wrapping_add(1));
});
