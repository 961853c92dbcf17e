//! Open the configured instrument backend.

use std::time::Duration;

use eyre::WrapErr;
use thermo_config::{Backend, Config};
use thermo_hardware::{SimulatedController, SimulatedLockIn};
use thermo_traits::{LockIn, TemperatureController};

pub type Instruments = (Box<dyn TemperatureController>, Box<dyn LockIn>);

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Simulated pair; `THERMO_TEST_SIM_*` variables shape the thermal model.
fn simulated() -> Instruments {
    let mut ctrl =
        SimulatedController::new(env_parse("THERMO_TEST_SIM_START_K").unwrap_or(295.0));
    if let Some(f) = env_parse::<f64>("THERMO_TEST_SIM_APPROACH") {
        ctrl = ctrl.with_approach(f);
    }
    if let Some(n) = env_parse::<u64>("THERMO_TEST_SIM_FAIL_AFTER") {
        ctrl = ctrl.with_fail_after(n);
    }
    if let Some(n) = env_parse::<u64>("THERMO_TEST_SIM_NAN_EVERY") {
        ctrl = ctrl.with_nan_every(n);
    }
    (Box::new(ctrl), Box::new(SimulatedLockIn::new()))
}

pub fn open(cfg: &Config) -> eyre::Result<Instruments> {
    let ins = &cfg.instruments;
    match ins.backend {
        Backend::Sim => {
            tracing::info!(backend = "sim", "instruments ready");
            Ok(simulated())
        }
        Backend::Tcp => {
            let timeout = Duration::from_millis(ins.io_timeout_ms);
            let delay = Duration::from_millis(ins.query_delay_ms);
            let ctrl = thermo_hardware::connect_lakeshore(&ins.lakeshore_address, timeout, delay)
                .wrap_err_with(|| format!("connect controller at {}", ins.lakeshore_address))?;
            let lockin = thermo_hardware::connect_sr860(&ins.lockin_address, timeout, delay)
                .wrap_err_with(|| format!("connect lock-in at {}", ins.lockin_address))?;
            tracing::info!(backend = "tcp", "instruments ready");
            Ok((Box::new(ctrl), Box::new(lockin)))
        }
    }
}
