#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse or validation errors are fine; panics are not.
    if let Ok(cfg) = scale_config::load_toml(data) {
        if cfg.validate().is_ok() {
            let pipeline: scale_core::PipelineCfg = (&cfg).into();
            let store: scale_core::StoreCfg = (&cfg.storage).into();
            let _ = scale_core::validate_cfg(&pipeline, &store);
        }
    }
});
