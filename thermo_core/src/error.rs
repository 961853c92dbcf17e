use thiserror::Error;

/// Why a stabilization attempt ended without reaching the stable state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    #[error("cycle budget of {max} exhausted")]
    MaxCycles { max: u32 },
    #[error("{streak} consecutive invalid readings")]
    InvalidSamples { streak: u32 },
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThermoError {
    #[error("communication error: {0}")]
    Communication(String),
    #[error("communication fault: {0}")]
    CommunicationFault(String),
    #[error("timeout waiting for instrument")]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("aborted: {0}")]
    Abort(AbortReason),
}

impl ThermoError {
    /// True for failures reported by the instrument link.
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            ThermoError::Communication(_) | ThermoError::CommunicationFault(_) | ThermoError::Timeout
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing stabilization config")]
    MissingConfig,
    #[error("missing state persister")]
    MissingPersister,
    #[error("missing setpoint")]
    MissingSetpoint,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
