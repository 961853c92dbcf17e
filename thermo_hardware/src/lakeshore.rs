//! Lakeshore 331 temperature controller, control loop 1.

use thermo_traits::{Channel, DeviceError, TemperatureController, Thermometer};

use crate::error::Result;
use crate::link::{Link, Session};

pub struct Lakeshore331<L: Link> {
    session: Session<L>,
}

impl<L: Link> Lakeshore331<L> {
    pub fn new(session: Session<L>) -> Self {
        Self { session }
    }

    pub fn kelvin(&mut self, channel: Channel) -> Result<f64> {
        let t = self.session.query_f64(&format!("KRDG? {channel}"))?;
        tracing::debug!(%channel, kelvin = t, "lakeshore reading");
        Ok(t)
    }

    pub fn write_setpoint(&mut self, kelvin: f64) -> Result<()> {
        self.session.write(&format!("SETP 1,{kelvin}"))
    }

    /// Enable the setpoint ramp on loop 1 at `kelvin_per_min`.
    pub fn write_ramp(&mut self, kelvin_per_min: f64) -> Result<()> {
        self.session.write(&format!("RAMP 1,1,{kelvin_per_min}"))
    }

    pub fn read_setpoint(&mut self) -> Result<f64> {
        self.session.query_f64("SETP? 1")
    }

    pub fn read_heater(&mut self) -> Result<String> {
        Ok(self.session.query("HTR?")?.trim().to_string())
    }
}

impl<L: Link> Thermometer for Lakeshore331<L> {
    fn read_temperature(&mut self, channel: Channel) -> std::result::Result<f64, DeviceError> {
        Ok(self.kelvin(channel)?)
    }
}

impl<L: Link> TemperatureController for Lakeshore331<L> {
    fn set_setpoint(&mut self, kelvin: f64) -> std::result::Result<(), DeviceError> {
        Ok(self.write_setpoint(kelvin)?)
    }
    fn set_ramp_rate(&mut self, kelvin_per_min: f64) -> std::result::Result<(), DeviceError> {
        Ok(self.write_ramp(kelvin_per_min)?)
    }
    fn setpoint(&mut self) -> std::result::Result<f64, DeviceError> {
        Ok(self.read_setpoint()?)
    }
    fn heater_output(&mut self) -> std::result::Result<String, DeviceError> {
        Ok(self.read_heater()?)
    }
}
