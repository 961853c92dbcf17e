//! Runtime configuration for the stabilization loop.

use std::time::Duration;

use thermo_traits::Channel;

use crate::error::{BuildError, ThermoError};
use crate::regression::LinearFit;

const DEFAULT_INVALID_CYCLES: usize = 10;

/// Parameters fixed for the lifetime of a [`Stabilizer`](crate::Stabilizer).
///
/// The setpoint is not part of this struct; it changes between sweep steps
/// and is owned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizationConfig {
    /// Max |slope| (K per sampling interval)
    pub slope_tolerance: f64,
    /// Max |intercept - setpoint| (K)
    pub intercept_tolerance: f64,
    /// Readings per regression cycle (>= 2)
    pub points_per_cycle: usize,
    /// Delay after each reading
    pub sampling_interval: Duration,
    /// Abort after this many unstable cycles; `None` = unbounded
    pub max_cycles: Option<u32>,
    /// Abort after this many consecutive non-finite readings; `None` means
    /// ten cycles' worth of readings
    pub max_invalid_streak: Option<u32>,
    /// Sensor input the loop regresses on
    pub channel: Channel,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            slope_tolerance: 0.001,
            intercept_tolerance: 0.1,
            points_per_cycle: 10,
            sampling_interval: Duration::from_secs(5),
            max_cycles: None,
            max_invalid_streak: None,
            channel: Channel::B,
        }
    }
}

impl StabilizationConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.slope_tolerance.is_finite() || self.slope_tolerance < 0.0 {
            return Err(BuildError::InvalidConfig(
                "slope tolerance must be finite and >= 0",
            ));
        }
        if !self.intercept_tolerance.is_finite() || self.intercept_tolerance < 0.0 {
            return Err(BuildError::InvalidConfig(
                "intercept tolerance must be finite and >= 0",
            ));
        }
        if self.points_per_cycle < 2 {
            return Err(BuildError::InvalidConfig("points per cycle must be >= 2"));
        }
        if self.sampling_interval.is_zero() {
            return Err(BuildError::InvalidConfig("sampling interval must be > 0"));
        }
        if self.max_cycles == Some(0) {
            return Err(BuildError::InvalidConfig("max cycles must be >= 1"));
        }
        if self.max_invalid_streak == Some(0) {
            return Err(BuildError::InvalidConfig("max invalid streak must be >= 1"));
        }
        Ok(())
    }

    /// Consecutive non-finite readings tolerated before the check aborts.
    pub fn invalid_streak_limit(&self) -> u32 {
        self.max_invalid_streak.unwrap_or_else(|| {
            u32::try_from(self.points_per_cycle.saturating_mul(DEFAULT_INVALID_CYCLES))
                .unwrap_or(u32::MAX)
        })
    }

    /// Both tolerances are inclusive.
    pub fn is_stable(&self, fit: &LinearFit, setpoint: f64) -> bool {
        fit.slope.abs() <= self.slope_tolerance
            && (fit.intercept - setpoint).abs() <= self.intercept_tolerance
    }
}

/// Setpoints are absolute temperatures: finite and above 0 K.
pub fn check_setpoint(kelvin: f64) -> Result<(), ThermoError> {
    if kelvin.is_finite() && kelvin > 0.0 {
        Ok(())
    } else {
        Err(ThermoError::Config(format!(
            "setpoint must be finite and > 0 K, got {kelvin}"
        )))
    }
}

pub fn check_ramp_rate(kelvin_per_min: f64) -> Result<(), ThermoError> {
    if kelvin_per_min.is_finite() && kelvin_per_min > 0.0 {
        Ok(())
    } else {
        Err(ThermoError::Config(format!(
            "ramp rate must be finite and > 0 K/min, got {kelvin_per_min}"
        )))
    }
}
