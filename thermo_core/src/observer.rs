//! Engine events and the default tracing sink.

use crate::error::ThermoError;
use crate::regression::LinearFit;
use crate::status::Phase;

#[derive(Debug)]
pub enum StabilizationEvent<'a> {
    PhaseChanged { from: Phase, to: Phase },
    SetpointChanged { setpoint: f64 },
    SampleAccepted { cycle: u32, index: usize, kelvin: f64 },
    SampleRejected { cycle: u32, value: f64, streak: u32 },
    CycleClosed { cycle: u32, fit: LinearFit, stable: bool },
    Retrying { cycle: u32, fit: LinearFit },
    Stable { cycles: u32, fit: LinearFit },
    Aborted { error: &'a ThermoError },
    PersistFailed { error: &'a std::io::Error },
}

/// Receives every event the engine emits, in order.
pub trait StabilizationObserver {
    fn on_event(&self, event: &StabilizationEvent<'_>);
}

/// Structured `tracing` output for every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StabilizationObserver for TracingObserver {
    fn on_event(&self, event: &StabilizationEvent<'_>) {
        match *event {
            StabilizationEvent::PhaseChanged { from, to } => {
                tracing::trace!(?from, ?to, "phase");
            }
            StabilizationEvent::SetpointChanged { setpoint } => {
                tracing::info!(setpoint, "setpoint changed, history cleared");
            }
            StabilizationEvent::SampleAccepted {
                cycle,
                index,
                kelvin,
            } => {
                tracing::debug!(cycle, index, kelvin, "sample");
            }
            StabilizationEvent::SampleRejected {
                cycle,
                value,
                streak,
            } => {
                tracing::warn!(cycle, %value, streak, "discarding non-finite reading");
            }
            StabilizationEvent::CycleClosed {
                cycle,
                fit,
                stable,
            } => {
                tracing::info!(
                    cycle,
                    slope = fit.slope,
                    intercept = fit.intercept,
                    stable,
                    "cycle closed"
                );
            }
            StabilizationEvent::Retrying { cycle, fit } => {
                tracing::warn!(
                    cycle,
                    slope = fit.slope,
                    intercept = fit.intercept,
                    "temperature not stable yet, starting a new cycle"
                );
            }
            StabilizationEvent::Stable { cycles, fit } => {
                tracing::info!(
                    cycles,
                    slope = fit.slope,
                    intercept = fit.intercept,
                    "temperature stable"
                );
            }
            StabilizationEvent::Aborted { error } => {
                tracing::error!(error = %error, "stabilization aborted");
            }
            StabilizationEvent::PersistFailed { error } => {
                tracing::error!(error = %error, "failed to persist state; continuing");
            }
        }
    }
}
