#![no_main]
use libfuzzer_sys::fuzz_target;
use scale_core::{CalibrationRecord, LegacySchema, StoreCfg};

fuzz_target!(|data: &[u8]| {
    let cfg = StoreCfg::default();
    if let Ok(mut rec) = CalibrationRecord::decode(data) {
        // Bytes, not fields: NaN weights compare unequal to themselves.
        let bytes = rec.encode();
        let again = CalibrationRecord::decode(&bytes).expect("re-encoded record decodes");
        assert_eq!(again.encode(), bytes);
        let _ = rec.check_values(&cfg);
        rec.sanitize();
    }
    for schema in LegacySchema::ALL {
        let _ = schema.decode(data);
    }
});
