//! Device seams shared by the stabilization core, the instrument drivers and
//! the simulators.
//!
//! Every fallible call returns `Box<dyn Error + Send + Sync>` so drivers can
//! surface their own error types; `thermo_core` maps them to typed errors.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::fmt;

/// Boxed error used at every trait boundary.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Sensor input of a temperature controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    /// Sample sensor.
    A,
    /// Control sensor; the stabilization loop regresses on this one.
    #[default]
    B,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::A => "A",
            Channel::B => "B",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Thermometer {
    /// Blocking read of one temperature in kelvin.
    ///
    /// Implementations own any settling delay the instrument needs between a
    /// write and the following query.
    fn read_temperature(&mut self, channel: Channel) -> Result<f64, DeviceError>;
}

pub trait TemperatureController: Thermometer {
    /// Command the control loop setpoint (K). Fire-and-forget.
    fn set_setpoint(&mut self, kelvin: f64) -> Result<(), DeviceError>;
    /// Command the setpoint ramp rate (K/min). Fire-and-forget.
    fn set_ramp_rate(&mut self, kelvin_per_min: f64) -> Result<(), DeviceError>;
    /// Setpoint as reported back by the instrument.
    fn setpoint(&mut self) -> Result<f64, DeviceError>;
    /// Heater output, verbatim as the instrument reports it.
    fn heater_output(&mut self) -> Result<String, DeviceError>;
}

/// One coherent set of lock-in amplifier outputs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LockInSnapshot {
    pub x_v: f64,
    pub y_v: f64,
    pub frequency_hz: f64,
    pub sine_amplitude_v: f64,
    pub theta_deg: f64,
    pub phase_deg: f64,
    pub magnitude_v: f64,
}

pub trait LockIn {
    fn snapshot(&mut self) -> Result<LockInSnapshot, DeviceError>;
}

impl<T: Thermometer + ?Sized> Thermometer for Box<T> {
    fn read_temperature(&mut self, channel: Channel) -> Result<f64, DeviceError> {
        (**self).read_temperature(channel)
    }
}

impl<T: TemperatureController + ?Sized> TemperatureController for Box<T> {
    fn set_setpoint(&mut self, kelvin: f64) -> Result<(), DeviceError> {
        (**self).set_setpoint(kelvin)
    }
    fn set_ramp_rate(&mut self, kelvin_per_min: f64) -> Result<(), DeviceError> {
        (**self).set_ramp_rate(kelvin_per_min)
    }
    fn setpoint(&mut self) -> Result<f64, DeviceError> {
        (**self).setpoint()
    }
    fn heater_output(&mut self) -> Result<String, DeviceError> {
        (**self).heater_output()
    }
}

impl<T: LockIn + ?Sized> LockIn for Box<T> {
    fn snapshot(&mut self) -> Result<LockInSnapshot, DeviceError> {
        (**self).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_channel_is_default() {
        assert_eq!(Channel::default(), Channel::B);
        assert_eq!(Channel::A.to_string(), "A");
    }
}
