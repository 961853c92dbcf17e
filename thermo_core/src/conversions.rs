//! Bridges from `thermo_config` types to runtime types.

use std::time::Duration;

use thermo_traits::Channel;

use crate::config::StabilizationConfig;
use crate::sweep::{RampParams, Sweep};

/// Negative, NaN or overflowing inputs map to zero; the builder then rejects
/// a zero sampling interval.
fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO)
}

/// Sensor input named in the config file.
pub fn channel(c: thermo_config::ChannelName) -> Channel {
    match c {
        thermo_config::ChannelName::A => Channel::A,
        thermo_config::ChannelName::B => Channel::B,
    }
}

// ── StabilizationConfig ──────────────────────────────────────────────────────

impl From<&thermo_config::StabilizationCfg> for StabilizationConfig {
    fn from(c: &thermo_config::StabilizationCfg) -> Self {
        Self {
            slope_tolerance: c.slope_tolerance,
            intercept_tolerance: c.intercept_tolerance,
            points_per_cycle: c.stabilization_points,
            sampling_interval: secs(c.sampling_interval_s),
            max_cycles: c.max_cycles,
            max_invalid_streak: c.max_invalid_streak,
            channel: Channel::default(),
        }
    }
}

impl From<&thermo_config::Config> for StabilizationConfig {
    fn from(c: &thermo_config::Config) -> Self {
        Self {
            channel: channel(c.instruments.control_channel),
            ..Self::from(&c.stabilization)
        }
    }
}

// ── Sweep / ramp ─────────────────────────────────────────────────────────────

impl From<&thermo_config::SweepCfg> for Sweep {
    fn from(c: &thermo_config::SweepCfg) -> Self {
        let sweep = Sweep::new(c.start_k, c.end_k, c.points);
        match c.ramp_rate_k_per_min {
            Some(rate) => sweep.with_ramp_rate(rate),
            None => sweep,
        }
    }
}

impl From<&thermo_config::Config> for RampParams {
    fn from(c: &thermo_config::Config) -> Self {
        Self {
            ramp_rate_k_per_min: c.ramp.ramp_rate_k_per_min,
            control_tolerance_k: c.ramp.control_tolerance_k,
            interval: secs(c.ramp.interval_s),
            channel: channel(c.instruments.control_channel),
        }
    }
}
