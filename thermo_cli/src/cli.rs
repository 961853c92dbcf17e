//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Effective stabilization knobs for the current run (for JSON error details).
pub static LAST_RUN: OnceLock<CliRun> = OnceLock::new();

#[derive(Copy, Clone, Debug)]
pub struct CliRun {
    pub setpoint: f64,
    pub slope_tolerance: f64,
    pub intercept_tolerance: f64,
    pub points_per_cycle: usize,
    pub max_cycles: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(name = "thermo", version, about = "Temperature stabilization CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/thermo_config.toml")]
    pub config: PathBuf,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins if set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the controller to a setpoint and wait until it is stable
    Stabilize {
        /// Target temperature (K)
        #[arg(long)]
        setpoint: f64,
        /// Override stabilization.max_cycles
        #[arg(long, value_name = "N")]
        max_cycles: Option<u32>,
        /// Append one measurement record once stable
        #[arg(long, action = ArgAction::SetTrue)]
        record: bool,
    },
    /// Step through a setpoint ramp and back, logging one record per step
    Sweep {
        /// First setpoint (K); overrides [sweep]
        #[arg(long, value_name = "K")]
        start: Option<f64>,
        /// Turning point (K); overrides [sweep]
        #[arg(long, value_name = "K")]
        end: Option<f64>,
        /// Setpoints on the way up, including both ends
        #[arg(long, value_name = "N")]
        points: Option<usize>,
        /// Controller ramp rate applied before the first step (K/min)
        #[arg(long, value_name = "K_PER_MIN")]
        ramp_rate: Option<f64>,
    },
    /// Ramp to a temperature, logging records until within tolerance
    GoTo {
        /// Target temperature (K)
        #[arg(long)]
        target: f64,
        /// Override ramp.ramp_rate_k_per_min
        #[arg(long, value_name = "K_PER_MIN")]
        rate: Option<f64>,
        /// Override ramp.control_tolerance_k
        #[arg(long, value_name = "K")]
        tolerance: Option<f64>,
    },
    /// Summarize the persisted stabilization state
    Status {
        /// State file to read; defaults to output.state_file
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,
    },
    /// Quick health check (instruments reachable / sim ok)
    SelfCheck,
}
