#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `thermo`: stabilize, sweep and ramp a temperature controller.

mod cli;
mod commands;
mod error_fmt;
mod instruments;
mod logging;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

/// Ctrl-C sets the flag; engines poll it between readings.
fn install_shutdown() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler; runs cannot be cancelled");
    }
    flag
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = thermo_config::load_file(&cli.config)?;
    logging::init(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");
    let shutdown = install_shutdown();

    match cli.cmd {
        Commands::Stabilize {
            setpoint,
            max_cycles,
            record,
        } => commands::stabilize(&cfg, setpoint, max_cycles, record, cli.json, shutdown),
        Commands::Sweep {
            start,
            end,
            points,
            ramp_rate,
        } => commands::sweep(&cfg, start, end, points, ramp_rate, cli.json, shutdown),
        Commands::GoTo {
            target,
            rate,
            tolerance,
        } => commands::go_to(&cfg, target, rate, tolerance, cli.json, shutdown),
        Commands::Status { state } => commands::status(&cfg, state, cli.json),
        Commands::SelfCheck => commands::self_check(&cfg, cli.json),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            println!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}
