//! Instrument drivers and simulators.
//!
//! - `link`: newline-terminated command/query transport (`Link`, `TcpLink`, `Session`)
//! - `lakeshore`: Lakeshore 331 controller (`Thermometer` + `TemperatureController`)
//! - `sr860`: SR860 lock-in amplifier (`LockIn`)
//! - `sim`: in-process simulators used by the CLI `sim` backend and tests
pub mod error;
pub mod lakeshore;
pub mod link;
pub mod sim;
pub mod sr860;

pub use lakeshore::Lakeshore331;
pub use link::{Link, Session, TcpLink};
pub use sim::{SimulatedController, SimulatedLockIn};
pub use sr860::Sr860;

use std::time::Duration;

/// Open the controller behind a TCP bridge.
pub fn connect_lakeshore(
    addr: &str,
    io_timeout: Duration,
    query_delay: Duration,
) -> error::Result<Lakeshore331<TcpLink>> {
    let link = TcpLink::connect(addr, io_timeout)?;
    Ok(Lakeshore331::new(Session::new(link, query_delay)))
}

/// Open the lock-in behind a TCP bridge.
pub fn connect_sr860(
    addr: &str,
    io_timeout: Duration,
    query_delay: Duration,
) -> error::Result<Sr860<TcpLink>> {
    let link = TcpLink::connect(addr, io_timeout)?;
    Ok(Sr860::new(Session::new(link, query_delay)))
}
