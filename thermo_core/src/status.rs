use crate::error::ThermoError;
use crate::regression::LinearFit;

/// Where the engine is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    CollectingCycle,
    Evaluating,
    Retrying,
    Stable,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableReport {
    pub setpoint: f64,
    /// Cycles taken, including the stable one
    pub cycles: u32,
    pub fit: LinearFit,
}

/// Outcome of one `check_stabilization` call.
#[derive(Debug, Clone, PartialEq)]
pub enum StabilizationStatus {
    Stable(StableReport),
    Aborted(ThermoError),
}

impl StabilizationStatus {
    pub fn is_stable(&self) -> bool {
        matches!(self, StabilizationStatus::Stable(_))
    }
}
