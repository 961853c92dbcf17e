//! Simulated instruments for development and tests.

use thermo_traits::{
    Channel, DeviceError, LockIn, LockInSnapshot, TemperatureController, Thermometer,
};

use crate::error::HwError;

/// First-order thermal model: every reading moves the control sensor a fixed
/// fraction of the remaining distance toward the setpoint.
#[derive(Debug, Clone)]
pub struct SimulatedController {
    temp_b: f64,
    /// Sample sensor reads this much above the control sensor.
    sample_offset: f64,
    setpoint: f64,
    ramp_rate: Option<f64>,
    approach: f64,
    reads: u64,
    fail_after: Option<u64>,
    nan_every: Option<u64>,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new(295.0)
    }
}

impl SimulatedController {
    pub fn new(start_k: f64) -> Self {
        Self {
            temp_b: start_k,
            sample_offset: 0.05,
            setpoint: start_k,
            ramp_rate: None,
            approach: 0.5,
            reads: 0,
            fail_after: None,
            nan_every: None,
        }
    }

    /// Fraction of the remaining error closed per reading, clamped to [0, 1].
    pub fn with_approach(mut self, fraction: f64) -> Self {
        self.approach = fraction.clamp(0.0, 1.0);
        self
    }

    /// Fail every read after `n` successful ones.
    pub fn with_fail_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Report NaN on every `n`-th read.
    pub fn with_nan_every(mut self, n: u64) -> Self {
        self.nan_every = Some(n.max(1));
        self
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn ramp_rate(&self) -> Option<f64> {
        self.ramp_rate
    }
}

impl Thermometer for SimulatedController {
    fn read_temperature(&mut self, channel: Channel) -> Result<f64, DeviceError> {
        if self.fail_after.is_some_and(|n| self.reads >= n) {
            return Err(Box::new(HwError::Timeout));
        }
        self.reads += 1;
        self.temp_b += (self.setpoint - self.temp_b) * self.approach;
        if self.nan_every.is_some_and(|n| self.reads % n == 0) {
            return Ok(f64::NAN);
        }
        Ok(match channel {
            Channel::A => self.temp_b + self.sample_offset,
            Channel::B => self.temp_b,
        })
    }
}

impl TemperatureController for SimulatedController {
    fn set_setpoint(&mut self, kelvin: f64) -> Result<(), DeviceError> {
        tracing::debug!(kelvin, "sim setpoint");
        self.setpoint = kelvin;
        Ok(())
    }
    fn set_ramp_rate(&mut self, kelvin_per_min: f64) -> Result<(), DeviceError> {
        self.ramp_rate = Some(kelvin_per_min);
        Ok(())
    }
    fn setpoint(&mut self) -> Result<f64, DeviceError> {
        Ok(self.setpoint)
    }
    fn heater_output(&mut self) -> Result<String, DeviceError> {
        let pct = ((self.setpoint - self.temp_b) * 10.0).clamp(0.0, 100.0);
        Ok(format!("{pct:.1}"))
    }
}

/// Deterministic lock-in whose outputs drift slowly with each snapshot.
#[derive(Debug, Default, Clone)]
pub struct SimulatedLockIn {
    n: u64,
}

impl SimulatedLockIn {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockIn for SimulatedLockIn {
    fn snapshot(&mut self) -> Result<LockInSnapshot, DeviceError> {
        self.n += 1;
        let t = self.n as f64 * 0.1;
        let x = 1.0e-3 * t.cos();
        let y = 1.0e-3 * t.sin();
        Ok(LockInSnapshot {
            x_v: x,
            y_v: y,
            frequency_hz: 1000.0,
            sine_amplitude_v: 0.1,
            theta_deg: y.atan2(x).to_degrees(),
            phase_deg: 0.0,
            magnitude_v: x.hypot(y),
        })
    }
}
