//! Command implementations: engine assembly from config, runs and reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::{Report, WrapErr};
use serde_json::json;
use thermo_config::Config;
use thermo_core::conversions;
use thermo_core::hw_error::map_hw_error;
use thermo_core::{
    JsonFilePersister, MeasurementRecord, RampParams, RecordLog, StabilizationConfig,
    StabilizationStatus, Stabilizer, Sweep, check_ramp_rate, check_setpoint, go_to_temperature,
    load_state,
};
use thermo_traits::MonotonicClock;

use crate::cli::{CliRun, LAST_RUN};
use crate::instruments;

fn device_err(e: thermo_traits::DeviceError) -> Report {
    Report::new(map_hw_error(&*e))
}

fn build_engine(
    cfg: &Config,
    setpoint: f64,
    max_cycles: Option<u32>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<Stabilizer> {
    let mut config = StabilizationConfig::from(cfg);
    if max_cycles.is_some() {
        config.max_cycles = max_cycles;
    }
    let _ = LAST_RUN.set(CliRun {
        setpoint,
        slope_tolerance: config.slope_tolerance,
        intercept_tolerance: config.intercept_tolerance,
        points_per_cycle: config.points_per_cycle,
        max_cycles: config.max_cycles,
    });
    let state_file = &cfg.output.state_file;
    let persister = JsonFilePersister::create(state_file)
        .wrap_err_with(|| format!("prepare state file {}", state_file.display()))?;
    tracing::debug!(state_file = %state_file.display(), "state persister ready");
    Stabilizer::builder()
        .with_config(config)
        .with_persister(persister)
        .with_setpoint(setpoint)
        .with_cancel_check(move || shutdown.load(Ordering::Relaxed))
        .build()
}

pub fn stabilize(
    cfg: &Config,
    setpoint: f64,
    max_cycles: Option<u32>,
    record: bool,
    json: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    check_setpoint(setpoint)?;
    let (mut ctrl, mut lockin) = instruments::open(cfg)?;
    ctrl.set_setpoint(setpoint).map_err(device_err)?;
    let mut engine = build_engine(cfg, setpoint, max_cycles, shutdown)?;

    tracing::info!(setpoint, "stabilize start");
    let report = match engine.check_stabilization(ctrl.as_mut()) {
        StabilizationStatus::Stable(r) => r,
        StabilizationStatus::Aborted(e) => return Err(Report::new(e)),
    };

    if record {
        let mut log = RecordLog::open(&cfg.output.data_file)?;
        let rec = MeasurementRecord::acquire(ctrl.as_mut(), lockin.as_mut(), 1)?;
        log.append(&rec)?;
    }

    if json {
        println!(
            "{}",
            json!({
                "event": "stable",
                "setpoint": report.setpoint,
                "cycles": report.cycles,
                "slope": report.fit.slope,
                "intercept": report.fit.intercept,
            })
        );
    } else {
        println!(
            "stable at {:.3} K after {} cycle(s) (slope {:.6}, intercept {:.4})",
            report.setpoint, report.cycles, report.fit.slope, report.fit.intercept
        );
    }
    Ok(())
}

pub fn sweep(
    cfg: &Config,
    start: Option<f64>,
    end: Option<f64>,
    points: Option<usize>,
    ramp_rate: Option<f64>,
    json: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let base = cfg.sweep.as_ref();
    let (Some(start), Some(end), Some(points)) = (
        start.or(base.map(|s| s.start_k)),
        end.or(base.map(|s| s.end_k)),
        points.or(base.map(|s| s.points)),
    ) else {
        eyre::bail!("sweep needs --start, --end and --points or a [sweep] section");
    };
    if points == 0 {
        eyre::bail!("sweep needs points >= 1");
    }
    check_setpoint(start).wrap_err("sweep start")?;
    check_setpoint(end).wrap_err("sweep end")?;

    let mut plan = Sweep::new(start, end, points);
    if let Some(rate) = ramp_rate.or(base.and_then(|s| s.ramp_rate_k_per_min)) {
        check_ramp_rate(rate).wrap_err("sweep ramp rate")?;
        plan = plan.with_ramp_rate(rate);
    }

    let (mut ctrl, mut lockin) = instruments::open(cfg)?;
    let mut engine = build_engine(cfg, start, None, shutdown)?;
    let mut log = RecordLog::open(&cfg.output.data_file)?;

    let total = plan.setpoints.len();
    let completed = plan.run(&mut engine, ctrl.as_mut(), lockin.as_mut(), &mut log)?;

    if json {
        println!(
            "{}",
            json!({
                "event": "sweep_complete",
                "steps": completed,
                "data_file": log.path().display().to_string(),
            })
        );
    } else {
        println!(
            "sweep complete: {}/{} setpoints recorded to {}",
            completed,
            total,
            log.path().display()
        );
    }
    Ok(())
}

pub fn go_to(
    cfg: &Config,
    target: f64,
    rate: Option<f64>,
    tolerance: Option<f64>,
    json: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let mut params = RampParams::from(cfg);
    if let Some(r) = rate {
        params.ramp_rate_k_per_min = r;
    }
    check_setpoint(target)?;
    check_ramp_rate(params.ramp_rate_k_per_min).wrap_err("--rate")?;
    if let Some(t) = tolerance {
        if !(t.is_finite() && t > 0.0) {
            eyre::bail!("--tolerance must be > 0");
        }
        params.control_tolerance_k = t;
    }

    let (mut ctrl, mut lockin) = instruments::open(cfg)?;
    let mut log = RecordLog::open(&cfg.output.data_file)?;
    let clock = MonotonicClock::new();
    let written = go_to_temperature(
        ctrl.as_mut(),
        lockin.as_mut(),
        &mut log,
        target,
        &params,
        &clock,
        &|| shutdown.load(Ordering::Relaxed),
    )?;

    if json {
        println!(
            "{}",
            json!({ "event": "target_reached", "target": target, "records": written })
        );
    } else {
        println!("reached {target:.3} K ({written} record(s) logged)");
    }
    Ok(())
}

pub fn status(cfg: &Config, state: Option<PathBuf>, json: bool) -> eyre::Result<()> {
    let path = state.unwrap_or_else(|| cfg.output.state_file.clone());
    let st = load_state(&path)?;
    let last = st.last_cycle();

    if json {
        println!(
            "{}",
            json!({
                "setpoint": st.setpoint,
                "cycles": st.cycles_history.len(),
                "last_slope": last.map(|c| c.slope),
                "last_intercept": last.map(|c| c.intercept),
                "stable": st.last_cycle_stable(),
                "pending": st.current_measurements.len(),
            })
        );
        return Ok(());
    }

    println!("setpoint: {:.3} K", st.setpoint);
    match last {
        Some(c) => println!(
            "cycles: {} (last: slope {:.6}, intercept {:.4}, {})",
            st.cycles_history.len(),
            c.slope,
            c.intercept,
            if st.last_cycle_stable() == Some(true) {
                "stable"
            } else {
                "not stable"
            }
        ),
        None => println!("cycles: 0"),
    }
    println!("pending samples: {}", st.current_measurements.len());
    Ok(())
}

pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let (mut ctrl, mut lockin) = instruments::open(cfg)?;
    let channel = conversions::channel(cfg.instruments.control_channel);
    let kelvin = ctrl.read_temperature(channel).map_err(device_err)?;
    let snap = lockin.snapshot().map_err(device_err)?;
    if json {
        println!(
            "{}",
            json!({ "ok": true, "channel": channel.as_str(), "kelvin": kelvin, "lockin_mag_v": snap.magnitude_v })
        );
    } else {
        println!(
            "ok: channel {channel} reads {kelvin:.3} K, lock-in magnitude {:.6} V",
            snap.magnitude_v
        );
    }
    Ok(())
}
