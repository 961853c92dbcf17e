#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Temperature stabilization engine (hardware-agnostic).
//!
//! All instrument access goes through the `thermo_traits` seams.
//!
//! - `engine`: the cycle/regress/decide loop (`Stabilizer`)
//! - `builder`: type-state construction with config, persister and setpoint
//! - `regression`: least-squares line fit over sample index
//! - `recorder`: current cycle buffer and closed-cycle history
//! - `persist`: atomic JSON snapshot written after every state change
//! - `observer`: event stream; `TracingObserver` is the default sink
//! - `sweep`: sweep plans, sweep runs and ramped moves
//! - `record`: measurement records and the space-delimited data file

pub mod builder;
pub mod config;
pub mod conversions;
pub mod engine;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod observer;
pub mod persist;
pub mod record;
pub mod recorder;
pub mod regression;
pub mod status;
pub mod sweep;

pub use builder::StabilizerBuilder;
pub use config::{StabilizationConfig, check_ramp_rate, check_setpoint};
pub use engine::Stabilizer;
pub use error::{AbortReason, BuildError, Report, Result, ThermoError};
pub use observer::{StabilizationEvent, StabilizationObserver, TracingObserver};
pub use persist::{JsonFilePersister, NullPersister, PersistedState, Persister, load_state};
pub use record::{MeasurementRecord, RecordLog};
pub use recorder::Cycle;
pub use regression::{LinearFit, fit};
pub use status::{Phase, StabilizationStatus, StableReport};
pub use sweep::{RampParams, Sweep, go_to_temperature, sweep_plan};
