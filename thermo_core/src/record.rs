//! Measurement records: one line of controller and lock-in readings per
//! logged point, appended to a space-delimited data file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use eyre::WrapErr;
use thermo_traits::{Channel, LockIn, LockInSnapshot, TemperatureController};

use crate::error::{Result, ThermoError};
use crate::hw_error::map_hw_error;

pub const HEADER: [&str; 13] = [
    "T_A[K]",
    "T_B[K]",
    "Setpoint[K]",
    "SR860x[V]",
    "SR860y[V]",
    "SR860f[Hz]",
    "SR860sin[V]",
    "SR860theta[deg]",
    "SR860phase[deg]",
    "SR860mag[V]",
    "HTR",
    "CNT",
    "DateTime",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S%.6f";

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub t_a: f64,
    pub t_b: f64,
    pub setpoint: f64,
    pub lockin: LockInSnapshot,
    /// Heater output exactly as the controller reported it
    pub heater: String,
    /// Running count within the current run, starting at 1
    pub index: usize,
    pub timestamp: DateTime<Local>,
}

impl MeasurementRecord {
    /// Read both sensors, the active setpoint, the heater and a lock-in snapshot.
    pub fn acquire<C, L>(
        controller: &mut C,
        lockin: &mut L,
        index: usize,
    ) -> std::result::Result<Self, ThermoError>
    where
        C: TemperatureController + ?Sized,
        L: LockIn + ?Sized,
    {
        let t_a = controller
            .read_temperature(Channel::A)
            .map_err(|e| map_hw_error(&*e))?;
        let t_b = controller
            .read_temperature(Channel::B)
            .map_err(|e| map_hw_error(&*e))?;
        let setpoint = controller.setpoint().map_err(|e| map_hw_error(&*e))?;
        let lockin = lockin.snapshot().map_err(|e| map_hw_error(&*e))?;
        let heater = controller.heater_output().map_err(|e| map_hw_error(&*e))?;
        Ok(Self {
            t_a,
            t_b,
            setpoint,
            lockin,
            heater,
            index,
            timestamp: Local::now(),
        })
    }

    /// Columns in [`HEADER`] order.
    pub fn fields(&self) -> [String; 13] {
        let li = &self.lockin;
        [
            format!("{:.6}", self.t_a),
            format!("{:.6}", self.t_b),
            format!("{:.6}", self.setpoint),
            format!("{:.6}", li.x_v),
            format!("{:.6}", li.y_v),
            format!("{:.2}", li.frequency_hz),
            format!("{:.6}", li.sine_amplitude_v),
            format!("{:.2}", li.theta_deg),
            format!("{:.2}", li.phase_deg),
            format!("{:.6}", li.magnitude_v),
            self.heater.trim().to_string(),
            self.index.to_string(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ]
    }
}

/// Append-only data file. The header is written once, when the file is new
/// or empty.
pub struct RecordLog {
    path: PathBuf,
    writer: csv::Writer<std::fs::File>,
}

impl core::fmt::Debug for RecordLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordLog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RecordLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("creating {}", dir.display()))?;
        }
        let fresh = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .wrap_err_with(|| format!("opening {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &MeasurementRecord) -> Result<()> {
        self.writer
            .write_record(record.fields())
            .wrap_err_with(|| format!("writing record to {}", self.path.display()))?;
        self.writer.flush()?;
        tracing::debug!(index = record.index, t_b = record.t_b, "record written");
        Ok(())
    }
}
