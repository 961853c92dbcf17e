//! SR860 lock-in amplifier.

use thermo_traits::{DeviceError, LockIn, LockInSnapshot};

use crate::error::Result;
use crate::link::{Link, Session};

pub struct Sr860<L: Link> {
    session: Session<L>,
}

impl<L: Link> Sr860<L> {
    pub fn new(session: Session<L>) -> Self {
        Self { session }
    }

    fn output(&mut self, index: u8) -> Result<f64> {
        self.session.query_f64(&format!("OUTP? {index}"))
    }

    pub fn read_all(&mut self) -> Result<LockInSnapshot> {
        Ok(LockInSnapshot {
            x_v: self.output(0)?,
            y_v: self.output(1)?,
            magnitude_v: self.output(2)?,
            theta_deg: self.output(3)?,
            frequency_hz: self.session.query_f64("FREQ?")?,
            sine_amplitude_v: self.session.query_f64("SLVL?")?,
            phase_deg: self.session.query_f64("PHAS?")?,
        })
    }
}

impl<L: Link> LockIn for Sr860<L> {
    fn snapshot(&mut self) -> std::result::Result<LockInSnapshot, DeviceError> {
        Ok(self.read_all()?)
    }
}
