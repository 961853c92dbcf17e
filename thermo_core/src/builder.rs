//! Type-state builder for `Stabilizer`.
//!
//! `build()` is only available once the config, the persister and the initial
//! setpoint are provided. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use thermo_traits::Channel;
use thermo_traits::clock::{Clock, MonotonicClock};

use crate::config::StabilizationConfig;
use crate::engine::Stabilizer;
use crate::error::{BuildError, Result};
use crate::observer::{StabilizationObserver, TracingObserver};
use crate::persist::Persister;
use crate::recorder::CycleRecorder;
use crate::status::Phase;

pub struct Missing;
pub struct Set;

pub struct StabilizerBuilder<C, P, T> {
    config: Option<StabilizationConfig>,
    persister: Option<Box<dyn Persister>>,
    setpoint: Option<f64>,
    observer: Option<Box<dyn StabilizationObserver>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    cancel_check: Option<Box<dyn Fn() -> bool>>,
    _c: PhantomData<C>,
    _p: PhantomData<P>,
    _t: PhantomData<T>,
}

impl Default for StabilizerBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            config: None,
            persister: None,
            setpoint: None,
            observer: None,
            clock: None,
            cancel_check: None,
            _c: PhantomData,
            _p: PhantomData,
            _t: PhantomData,
        }
    }
}

impl Stabilizer {
    pub fn builder() -> StabilizerBuilder<Missing, Missing, Missing> {
        StabilizerBuilder::default()
    }
}

impl<C, P, T> StabilizerBuilder<C, P, T> {
    /// Fallible build available in any type-state.
    ///
    /// Writes the initial (empty) snapshot before returning.
    pub fn try_build(self) -> Result<Stabilizer> {
        let config = self
            .config
            .ok_or_else(|| eyre::Report::new(BuildError::MissingConfig))?;
        let persister = self
            .persister
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPersister))?;
        let setpoint = self
            .setpoint
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSetpoint))?;

        config.validate().map_err(eyre::Report::new)?;
        if !(setpoint.is_finite() && setpoint > 0.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "setpoint must be finite and > 0 K",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        let mut stabilizer = Stabilizer {
            config,
            setpoint,
            recorder: CycleRecorder::new(),
            persister,
            observer: self
                .observer
                .unwrap_or_else(|| Box::new(TracingObserver)),
            clock,
            cancel_check: self.cancel_check,
            phase: Phase::Idle,
        };
        stabilizer.persist();
        Ok(stabilizer)
    }
}

/// Chainable setters that do not affect type-state.
impl<C, P, T> StabilizerBuilder<C, P, T> {
    pub fn with_observer(mut self, observer: impl StabilizationObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }
    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Polled before every reading and before each retry pause.
    pub fn with_cancel_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.cancel_check = Some(Box::new(f));
        self
    }
}

impl<P, T> StabilizerBuilder<Missing, P, T> {
    pub fn with_config(self, config: StabilizationConfig) -> StabilizerBuilder<Set, P, T> {
        StabilizerBuilder {
            config: Some(config),
            persister: self.persister,
            setpoint: self.setpoint,
            observer: self.observer,
            clock: self.clock,
            cancel_check: self.cancel_check,
            _c: PhantomData,
            _p: PhantomData,
            _t: PhantomData,
        }
    }
}

impl<P, T> StabilizerBuilder<Set, P, T> {
    /// Override the sensor input on an already supplied config.
    pub fn with_channel(mut self, channel: Channel) -> Self {
        if let Some(cfg) = self.config.as_mut() {
            cfg.channel = channel;
        }
        self
    }
}

impl<C, T> StabilizerBuilder<C, Missing, T> {
    pub fn with_persister(
        self,
        persister: impl Persister + 'static,
    ) -> StabilizerBuilder<C, Set, T> {
        StabilizerBuilder {
            config: self.config,
            persister: Some(Box::new(persister)),
            setpoint: self.setpoint,
            observer: self.observer,
            clock: self.clock,
            cancel_check: self.cancel_check,
            _c: PhantomData,
            _p: PhantomData,
            _t: PhantomData,
        }
    }
}

impl<C, P> StabilizerBuilder<C, P, Missing> {
    pub fn with_setpoint(self, kelvin: f64) -> StabilizerBuilder<C, P, Set> {
        StabilizerBuilder {
            config: self.config,
            persister: self.persister,
            setpoint: Some(kelvin),
            observer: self.observer,
            clock: self.clock,
            cancel_check: self.cancel_check,
            _c: PhantomData,
            _p: PhantomData,
            _t: PhantomData,
        }
    }
}

impl StabilizerBuilder<Set, Set, Set> {
    /// Validate and build. Only available when config, persister and setpoint are set.
    pub fn build(self) -> Result<Stabilizer> {
        self.try_build()
    }
}
