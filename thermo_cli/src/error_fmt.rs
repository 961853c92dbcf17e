//! Human-readable error descriptions and structured JSON error formatting.

use thermo_core::error::{AbortReason, BuildError, ThermoError};

use crate::cli::LAST_RUN;

pub fn abort_reason_name(r: &AbortReason) -> &'static str {
    match r {
        AbortReason::MaxCycles { .. } => "MaxCycles",
        AbortReason::InvalidSamples { .. } => "InvalidSamples",
        AbortReason::Cancelled => "Cancelled",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingConfig | BuildError::MissingPersister | BuildError::MissingSetpoint => format!(
                "What happened: The stabilization engine was not fully configured ({be}).\nLikely causes: Internal wiring bug in the CLI.\nHow to fix: Re-run with --log-level=debug and report the output."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the [stabilization] section.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<ThermoError>() {
        return match te {
            ThermoError::Timeout => "What happened: Instrument read timed out.\nLikely causes: Controller powered off, bridge unreachable, or io_timeout_ms too low.\nHow to fix: Check the GPIB/Ethernet bridge and cabling, then raise instruments.io_timeout_ms if the link is slow.".to_string(),
            ThermoError::Communication(m) | ThermoError::CommunicationFault(m) => format!(
                "What happened: Lost communication with an instrument ({m}).\nLikely causes: Bridge restarted, connection dropped, or an unexpected reply.\nHow to fix: Run `thermo self-check`, verify instruments.*_address, then start a new run."
            ),
            ThermoError::Abort(AbortReason::MaxCycles { max }) => format!(
                "What happened: Temperature did not stabilize within {max} cycles.\nLikely causes: Tolerances too tight for the sensor noise, or the controller is still ramping.\nHow to fix: Raise stabilization.max_cycles, loosen slope_tolerance/intercept_tolerance, or check the heater range."
            ),
            ThermoError::Abort(AbortReason::InvalidSamples { streak }) => format!(
                "What happened: {streak} consecutive readings were not finite.\nLikely causes: Sensor disconnected or out of its calibrated range.\nHow to fix: Check the sensor wiring and curve on the controller."
            ),
            ThermoError::Abort(AbortReason::Cancelled) => "What happened: Run cancelled.\nLikely causes: Ctrl-C was pressed.\nHow to fix: Start a new run when ready; the state file holds the last complete snapshot.".to_string(),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("connect controller") || lower.contains("connect lock-in") {
        let cause = err.root_cause();
        return format!(
            "What happened: Could not open an instrument link ({msg}: {cause}).\nLikely causes: Wrong host:port or bridge offline.\nHow to fix: Fix instruments.lakeshore_address / lockin_address in the config."
        );
    }

    if lower.contains("invalid configuration") || lower.contains("read config") {
        return format!(
            "What happened: Configuration is invalid or missing ({msg}).\nLikely causes: Wrong --config path, missing [stabilization] section, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per failure class; anything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ThermoError>() {
        Some(ThermoError::Abort(reason)) => match reason {
            AbortReason::Cancelled => 2,
            AbortReason::MaxCycles { .. } => 3,
            AbortReason::InvalidSamples { .. } => 4,
        },
        Some(e) if e.is_communication() => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    match err.downcast_ref::<ThermoError>() {
        Some(ThermoError::Abort(reason)) => {
            let details = LAST_RUN.get().map(|r| match reason {
                AbortReason::MaxCycles { max } => json!({
                    "max_cycles": r.max_cycles.unwrap_or(*max),
                    "points_per_cycle": r.points_per_cycle,
                    "setpoint": r.setpoint,
                    "slope_tolerance": r.slope_tolerance,
                    "intercept_tolerance": r.intercept_tolerance,
                }),
                _ => json!({ "setpoint": r.setpoint }),
            });
            let reason_name = abort_reason_name(reason);
            let obj = match details {
                Some(d) => json!({ "reason": reason_name, "details": d, "message": msg }),
                None => json!({ "reason": reason_name, "message": msg }),
            };
            obj.to_string()
        }
        Some(e) if e.is_communication() => {
            json!({ "reason": "Communication", "message": msg }).to_string()
        }
        _ => json!({ "reason": "Error", "message": msg }).to_string(),
    }
}
