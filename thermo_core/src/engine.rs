//! The stabilization loop.
//!
//! A check gathers `points_per_cycle` readings, fits a line through them and
//! accepts the temperature as stable when both the slope and the offset of
//! the fit from the setpoint are within tolerance. Unstable cycles are
//! retried until the cycle budget (if any) runs out.

use std::sync::Arc;

use thermo_traits::{Clock, Thermometer};

use crate::config::{StabilizationConfig, check_setpoint};
use crate::error::{AbortReason, ThermoError};
use crate::hw_error::map_hw_error;
use crate::observer::{StabilizationEvent, StabilizationObserver};
use crate::persist::{Persister, Snapshot};
use crate::recorder::{Cycle, CycleRecorder};
use crate::regression::{self, LinearFit};
use crate::status::{Phase, StabilizationStatus, StableReport};

pub struct Stabilizer {
    pub(crate) config: StabilizationConfig,
    pub(crate) setpoint: f64,
    pub(crate) recorder: CycleRecorder,
    pub(crate) persister: Box<dyn Persister>,
    pub(crate) observer: Box<dyn StabilizationObserver>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) cancel_check: Option<Box<dyn Fn() -> bool>>,
    pub(crate) phase: Phase,
}

impl core::fmt::Debug for Stabilizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stabilizer")
            .field("setpoint", &self.setpoint)
            .field("phase", &self.phase)
            .field("cycles", &self.recorder.history().len())
            .field("pending", &self.recorder.current().len())
            .finish_non_exhaustive()
    }
}

impl Stabilizer {
    pub fn config(&self) -> &StabilizationConfig {
        &self.config
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Closed cycles since the last setpoint change.
    pub fn history(&self) -> &[Cycle] {
        self.recorder.history()
    }

    pub fn current_measurements(&self) -> &[f64] {
        self.recorder.current()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_check.as_ref().is_some_and(|f| f())
    }

    /// Change the target temperature.
    ///
    /// Clears the cycle history and current buffer and persists the empty
    /// state under the new setpoint.
    pub fn set_setpoint(&mut self, kelvin: f64) -> Result<(), ThermoError> {
        check_setpoint(kelvin)?;
        self.setpoint = kelvin;
        self.recorder.reset();
        self.enter(Phase::Idle);
        self.observer
            .on_event(&StabilizationEvent::SetpointChanged { setpoint: kelvin });
        self.persist();
        Ok(())
    }

    /// Block until the device reading settles at the setpoint, the cycle
    /// budget runs out, the device fails, or the run is cancelled.
    ///
    /// History accumulated by earlier calls at the same setpoint is kept.
    pub fn check_stabilization<T>(&mut self, device: &mut T) -> StabilizationStatus
    where
        T: Thermometer + ?Sized,
    {
        let _span = tracing::info_span!("stabilize", setpoint = self.setpoint).entered();
        let mut cycle: u32 = 0;
        loop {
            cycle += 1;
            self.recorder.discard_current();
            self.enter(Phase::CollectingCycle);
            if let Err(e) = self.collect_cycle(device, cycle) {
                return self.abort(e);
            }

            self.enter(Phase::Evaluating);
            let fit = match regression::fit(self.recorder.current()) {
                Ok(f) => f,
                Err(e) => return self.abort(ThermoError::State(e.to_string())),
            };
            self.recorder.close_cycle(fit);
            self.persist();

            let stable = self.config.is_stable(&fit, self.setpoint);
            self.observer.on_event(&StabilizationEvent::CycleClosed {
                cycle,
                fit,
                stable,
            });
            if stable {
                self.enter(Phase::Stable);
                self.observer
                    .on_event(&StabilizationEvent::Stable { cycles: cycle, fit });
                return StabilizationStatus::Stable(StableReport {
                    setpoint: self.setpoint,
                    cycles: cycle,
                    fit,
                });
            }

            if let Some(max) = self.config.max_cycles.filter(|&m| cycle >= m) {
                return self.abort(ThermoError::Abort(AbortReason::MaxCycles { max }));
            }

            self.enter(Phase::Retrying);
            self.observer
                .on_event(&StabilizationEvent::Retrying { cycle, fit });
            if let Err(e) = self.pause() {
                return self.abort(e);
            }
        }
    }

    fn collect_cycle<T>(&mut self, device: &mut T, cycle: u32) -> Result<(), ThermoError>
    where
        T: Thermometer + ?Sized,
    {
        let mut invalid_streak: u32 = 0;
        while self.recorder.current().len() < self.config.points_per_cycle {
            self.check_cancelled()?;
            let kelvin = device
                .read_temperature(self.config.channel)
                .map_err(|e| map_hw_error(&*e))?;
            if kelvin.is_finite() {
                invalid_streak = 0;
                self.recorder.add_sample(kelvin);
                self.observer.on_event(&StabilizationEvent::SampleAccepted {
                    cycle,
                    index: self.recorder.current().len() - 1,
                    kelvin,
                });
                self.persist();
            } else {
                invalid_streak += 1;
                self.observer.on_event(&StabilizationEvent::SampleRejected {
                    cycle,
                    value: kelvin,
                    streak: invalid_streak,
                });
                if invalid_streak >= self.config.invalid_streak_limit() {
                    return Err(ThermoError::Abort(AbortReason::InvalidSamples {
                        streak: invalid_streak,
                    }));
                }
            }
            self.clock.sleep(self.config.sampling_interval);
        }
        Ok(())
    }

    /// One sampling interval between an unstable cycle and the next.
    fn pause(&self) -> Result<(), ThermoError> {
        self.check_cancelled()?;
        self.clock.sleep(self.config.sampling_interval);
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), ThermoError> {
        if self.is_cancelled() {
            return Err(ThermoError::Abort(AbortReason::Cancelled));
        }
        Ok(())
    }

    fn abort(&mut self, error: ThermoError) -> StabilizationStatus {
        self.enter(Phase::Aborted);
        self.observer
            .on_event(&StabilizationEvent::Aborted { error: &error });
        StabilizationStatus::Aborted(error)
    }

    fn enter(&mut self, to: Phase) {
        let from = self.phase;
        if from != to {
            self.phase = to;
            self.observer
                .on_event(&StabilizationEvent::PhaseChanged { from, to });
        }
    }

    /// Write the current state; failures are reported and otherwise ignored.
    pub(crate) fn persist(&mut self) {
        let snapshot = Snapshot {
            tolerance_a: self.config.slope_tolerance,
            tolerance_b: self.config.intercept_tolerance,
            setpoint: self.setpoint,
            cycles_history: self.recorder.history(),
            current_measurements: self.recorder.current(),
        };
        if let Err(error) = self.persister.save(&snapshot) {
            self.observer
                .on_event(&StabilizationEvent::PersistFailed { error: &error });
        }
    }

    /// Fit of the most recent closed cycle, if any.
    pub fn last_fit(&self) -> Option<LinearFit> {
        self.recorder.history().last().map(|c| LinearFit {
            slope: c.slope,
            intercept: c.intercept,
        })
    }
}
