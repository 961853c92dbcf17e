//! Temperature sweeps and ramped moves built on the stabilization engine.

use std::time::Duration;

use thermo_traits::{Channel, Clock, LockIn, TemperatureController};

use crate::config::{check_ramp_rate, check_setpoint};
use crate::engine::Stabilizer;
use crate::error::{AbortReason, Result, ThermoError};
use crate::hw_error::map_hw_error;
use crate::record::{MeasurementRecord, RecordLog};
use crate::status::StabilizationStatus;

/// `points` evenly spaced setpoints from `start_k` to `end_k` inclusive,
/// followed by the same points in reverse without repeating the turning point.
pub fn sweep_plan(start_k: f64, end_k: f64, points: usize) -> Vec<f64> {
    let forward: Vec<f64> = match points {
        0 => Vec::new(),
        1 => vec![start_k],
        n => {
            let step = (end_k - start_k) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end_k } else { start_k + step * i as f64 })
                .collect()
        }
    };
    let back = forward.iter().rev().skip(1).copied();
    let mut plan = forward.clone();
    plan.extend(back);
    plan
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub setpoints: Vec<f64>,
    /// Applied once before the first step
    pub ramp_rate_k_per_min: Option<f64>,
}

impl Sweep {
    pub fn new(start_k: f64, end_k: f64, points: usize) -> Self {
        Self {
            setpoints: sweep_plan(start_k, end_k, points),
            ramp_rate_k_per_min: None,
        }
    }

    pub fn with_ramp_rate(mut self, kelvin_per_min: f64) -> Self {
        self.ramp_rate_k_per_min = Some(kelvin_per_min);
        self
    }

    /// Step through every setpoint: drive the controller, reset the engine,
    /// wait for stability and log one record. Stops at the first failure;
    /// the error names the failing step and how many steps completed.
    ///
    /// The ramp rate and every setpoint are checked before anything is sent
    /// to the controller. Returns the number of completed steps.
    pub fn run<C, L>(
        &self,
        stabilizer: &mut Stabilizer,
        controller: &mut C,
        lockin: &mut L,
        log: &mut RecordLog,
    ) -> Result<usize>
    where
        C: TemperatureController + ?Sized,
        L: LockIn + ?Sized,
    {
        if let Some(rate) = self.ramp_rate_k_per_min {
            check_ramp_rate(rate)?;
        }
        for &kelvin in &self.setpoints {
            check_setpoint(kelvin)?;
        }

        let total = self.setpoints.len();
        tracing::info!(total, "sweep start");
        if let Some(rate) = self.ramp_rate_k_per_min {
            controller
                .set_ramp_rate(rate)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
        }

        for (i, &kelvin) in self.setpoints.iter().enumerate() {
            let step = i + 1;
            tracing::info!(step, total, setpoint = kelvin, "sweep step");
            if let Err(e) = run_step(stabilizer, controller, lockin, log, step, kelvin) {
                tracing::error!(step, total, setpoint = kelvin, "sweep stopped");
                return Err(e.wrap_err(format!(
                    "sweep stopped at step {step}/{total} ({kelvin} K), {i} completed"
                )));
            }
        }

        tracing::info!(total, "sweep complete");
        Ok(total)
    }
}

fn run_step<C, L>(
    stabilizer: &mut Stabilizer,
    controller: &mut C,
    lockin: &mut L,
    log: &mut RecordLog,
    step: usize,
    kelvin: f64,
) -> Result<()>
where
    C: TemperatureController + ?Sized,
    L: LockIn + ?Sized,
{
    controller
        .set_setpoint(kelvin)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
    stabilizer.set_setpoint(kelvin)?;

    match stabilizer.check_stabilization(controller) {
        StabilizationStatus::Stable(report) => {
            tracing::info!(step, cycles = report.cycles, "setpoint reached");
        }
        StabilizationStatus::Aborted(e) => return Err(eyre::Report::new(e)),
    }

    let record = MeasurementRecord::acquire(controller, lockin, step)?;
    log.append(&record)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampParams {
    pub ramp_rate_k_per_min: f64,
    /// Done once the control channel is within this band of the target (K)
    pub control_tolerance_k: f64,
    /// Delay between logged records
    pub interval: Duration,
    pub channel: Channel,
}

impl Default for RampParams {
    fn default() -> Self {
        Self {
            ramp_rate_k_per_min: 4.0,
            control_tolerance_k: 0.5,
            interval: Duration::from_secs(5),
            channel: Channel::B,
        }
    }
}

/// Ramp the controller to `target_k`, logging a record every interval until
/// the control channel is within tolerance. Returns the number of records.
///
/// A non-physical target or ramp rate is rejected before any device write.
pub fn go_to_temperature<C, L>(
    controller: &mut C,
    lockin: &mut L,
    log: &mut RecordLog,
    target_k: f64,
    params: &RampParams,
    clock: &dyn Clock,
    cancelled: &dyn Fn() -> bool,
) -> Result<usize>
where
    C: TemperatureController + ?Sized,
    L: LockIn + ?Sized,
{
    check_setpoint(target_k)?;
    check_ramp_rate(params.ramp_rate_k_per_min)?;
    tracing::info!(
        target_k,
        rate = params.ramp_rate_k_per_min,
        "ramping to target"
    );
    controller
        .set_ramp_rate(params.ramp_rate_k_per_min)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
    controller
        .set_setpoint(target_k)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;

    let mut written = 0;
    loop {
        if cancelled() {
            return Err(eyre::Report::new(ThermoError::Abort(AbortReason::Cancelled)));
        }
        let kelvin = controller
            .read_temperature(params.channel)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
        if kelvin.is_finite() && (kelvin - target_k).abs() <= params.control_tolerance_k {
            tracing::info!(kelvin, records = written, "target reached");
            return Ok(written);
        }
        written += 1;
        let record = MeasurementRecord::acquire(controller, lockin, written)?;
        log.append(&record)?;
        clock.sleep(params.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_goes_out_and_back() {
        assert_eq!(
            sweep_plan(300.0, 310.0, 3),
            vec![300.0, 305.0, 310.0, 305.0, 300.0]
        );
    }

    #[test]
    fn plan_handles_degenerate_counts() {
        assert!(sweep_plan(300.0, 310.0, 0).is_empty());
        assert_eq!(sweep_plan(300.0, 310.0, 1), vec![300.0]);
        assert_eq!(sweep_plan(300.0, 310.0, 2), vec![300.0, 310.0, 300.0]);
    }

    #[test]
    fn plan_can_sweep_downward() {
        let p = sweep_plan(310.0, 300.0, 11);
        assert_eq!(p.len(), 21);
        assert_eq!(p[10], 300.0);
        assert!((p[1] - 309.0).abs() < 1e-9);
    }
}
