#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the stabilization workspace.
//!
//! `Config` and its sections are deserialized from TOML and checked with
//! `Config::validate()`. Runtime types live in `thermo_core`; the `From`
//! bridges are in `thermo_core::conversions`.
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process simulated controller and lock-in.
    #[default]
    Sim,
    /// Line-oriented instrument protocol over TCP (GPIB/Ethernet bridge).
    Tcp,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelName {
    A,
    #[default]
    B,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Instruments {
    pub backend: Backend,
    /// host:port of the temperature controller bridge (tcp backend)
    pub lakeshore_address: String,
    /// host:port of the lock-in amplifier bridge (tcp backend)
    pub lockin_address: String,
    /// Settling delay between a command and the following query (ms)
    pub query_delay_ms: u64,
    /// Socket read/write timeout (ms)
    pub io_timeout_ms: u64,
    /// Sensor input the stabilization loop regresses on
    pub control_channel: ChannelName,
}

impl Default for Instruments {
    fn default() -> Self {
        Self {
            backend: Backend::Sim,
            lakeshore_address: String::new(),
            lockin_address: String::new(),
            query_delay_ms: 200,
            io_timeout_ms: 2000,
            control_channel: ChannelName::B,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StabilizationCfg {
    /// Max |slope| in K per sampling interval for the trend to count as flat
    pub slope_tolerance: f64,
    /// Max |intercept - setpoint| in K
    pub intercept_tolerance: f64,
    /// Readings per regression cycle
    pub stabilization_points: usize,
    /// Delay between readings (s)
    pub sampling_interval_s: f64,
    /// Give up after this many cycles (absent = unbounded)
    #[serde(default)]
    pub max_cycles: Option<u32>,
    /// Abort after this many consecutive non-finite readings
    /// (absent = ten cycles' worth of readings)
    #[serde(default)]
    pub max_invalid_streak: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweepCfg {
    pub start_k: f64,
    pub end_k: f64,
    pub points: usize,
    /// Optional ramp rate applied once before the first setpoint (K/min)
    #[serde(default)]
    pub ramp_rate_k_per_min: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RampCfg {
    pub ramp_rate_k_per_min: f64,
    /// Stop logging once the control channel is within this band (K)
    pub control_tolerance_k: f64,
    /// Delay between logged records while ramping (s)
    pub interval_s: f64,
}

impl Default for RampCfg {
    fn default() -> Self {
        Self {
            ramp_rate_k_per_min: 4.0,
            control_tolerance_k: 0.5,
            interval_s: 5.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Output {
    /// Persisted stabilization snapshot polled by monitors
    pub state_file: PathBuf,
    /// Space-delimited measurement records
    pub data_file: PathBuf,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("UtilityFiles/Stabilization.json"),
            data_file: PathBuf::from("data/measurement.dat"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub instruments: Instruments,
    pub stabilization: StabilizationCfg,
    /// Default sweep plan; CLI flags take precedence
    #[serde(default)]
    pub sweep: Option<SweepCfg>,
    #[serde(default)]
    pub ramp: RampCfg,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}

fn finite_non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn finite_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stabilization
        let s = &self.stabilization;
        if !finite_non_negative(s.slope_tolerance) {
            eyre::bail!("stabilization.slope_tolerance must be finite and >= 0");
        }
        if !finite_non_negative(s.intercept_tolerance) {
            eyre::bail!("stabilization.intercept_tolerance must be finite and >= 0");
        }
        if s.stabilization_points < 2 {
            eyre::bail!("stabilization.stabilization_points must be >= 2");
        }
        if !finite_positive(s.sampling_interval_s) {
            eyre::bail!("stabilization.sampling_interval_s must be > 0");
        }
        if s.sampling_interval_s < 0.001 {
            eyre::bail!("stabilization.sampling_interval_s must be >= 0.001 (1 ms)");
        }
        if s.sampling_interval_s > 3600.0 {
            eyre::bail!("stabilization.sampling_interval_s is unreasonably large (>1h)");
        }
        if s.max_cycles == Some(0) {
            eyre::bail!("stabilization.max_cycles must be >= 1 when set");
        }
        if s.max_invalid_streak == Some(0) {
            eyre::bail!("stabilization.max_invalid_streak must be >= 1 when set");
        }

        // Instruments
        let i = &self.instruments;
        if i.backend == Backend::Tcp {
            if i.lakeshore_address.trim().is_empty() {
                eyre::bail!("instruments.lakeshore_address is required for the tcp backend");
            }
            if i.lockin_address.trim().is_empty() {
                eyre::bail!("instruments.lockin_address is required for the tcp backend");
            }
        }
        if i.io_timeout_ms == 0 {
            eyre::bail!("instruments.io_timeout_ms must be >= 1");
        }
        if i.query_delay_ms > 10_000 {
            eyre::bail!("instruments.query_delay_ms is unreasonably large (>10s)");
        }

        // Sweep
        if let Some(sw) = &self.sweep {
            if !(sw.start_k.is_finite() && sw.end_k.is_finite()) {
                eyre::bail!("sweep.start_k and sweep.end_k must be finite");
            }
            if sw.start_k <= 0.0 || sw.end_k <= 0.0 {
                eyre::bail!("sweep temperatures must be > 0 K");
            }
            if sw.points == 0 {
                eyre::bail!("sweep.points must be >= 1");
            }
            if let Some(rate) = sw.ramp_rate_k_per_min
                && !finite_positive(rate)
            {
                eyre::bail!("sweep.ramp_rate_k_per_min must be > 0");
            }
        }

        // Ramp
        if !finite_positive(self.ramp.ramp_rate_k_per_min) {
            eyre::bail!("ramp.ramp_rate_k_per_min must be > 0");
        }
        if !finite_non_negative(self.ramp.control_tolerance_k) {
            eyre::bail!("ramp.control_tolerance_k must be >= 0");
        }
        if !finite_positive(self.ramp.interval_s) {
            eyre::bail!("ramp.interval_s must be > 0");
        }

        // Output
        if self.output.state_file.as_os_str().is_empty() {
            eyre::bail!("output.state_file must not be empty");
        }
        if self.output.data_file.as_os_str().is_empty() {
            eyre::bail!("output.data_file must not be empty");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
