#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse, validate and map to the runtime config; none of it may panic.
    let Ok(cfg) = thermo_config::load_toml(data) else {
        return;
    };
    let valid = cfg.validate().is_ok();
    let core = thermo_core::StabilizationConfig::from(&cfg);
    let _ = thermo_core::RampParams::from(&cfg);
    if valid {
        assert!(core.validate().is_ok(), "validated file produced invalid runtime config");
    }
});
