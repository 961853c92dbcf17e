//! Durable snapshot of the stabilization state.
//!
//! Every write goes to a temp file in the destination directory, is synced,
//! then renamed over the target, so a concurrent reader sees either the old
//! or the new document and never a partial one.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::recorder::Cycle;

/// Write `bytes` to `path` atomically.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    write_atomic_with(path, |f| f.write_all(bytes))
}

/// Atomic write where the caller streams into the temp file.
pub fn write_atomic_with<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Document written after every state change.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    #[serde(rename = "tolerance_A")]
    pub tolerance_a: f64,
    #[serde(rename = "tolerance_B")]
    pub tolerance_b: f64,
    pub setpoint: f64,
    pub cycles_history: &'a [Cycle],
    pub current_measurements: &'a [f64],
}

/// Owned form of [`Snapshot`], as read back by monitors and `status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersistedState {
    #[serde(rename = "tolerance_A")]
    pub tolerance_a: f64,
    #[serde(rename = "tolerance_B")]
    pub tolerance_b: f64,
    pub setpoint: f64,
    pub cycles_history: Vec<Cycle>,
    #[serde(default)]
    pub current_measurements: Vec<f64>,
}

impl PersistedState {
    pub fn last_cycle(&self) -> Option<&Cycle> {
        self.cycles_history.last()
    }

    /// Whether the most recent closed cycle met both tolerances.
    pub fn last_cycle_stable(&self) -> Option<bool> {
        self.last_cycle().map(|c| {
            c.slope.abs() <= self.tolerance_a
                && (c.intercept - self.setpoint).abs() <= self.tolerance_b
        })
    }
}

pub fn load_state(path: &Path) -> crate::Result<PersistedState> {
    use eyre::WrapErr;
    let bytes = std::fs::read(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).wrap_err_with(|| format!("parsing {}", path.display()))
}

/// Destination for snapshots.
pub trait Persister {
    fn save(&mut self, snapshot: &Snapshot<'_>) -> io::Result<()>;

    fn location(&self) -> Option<&Path> {
        None
    }
}

impl<P: Persister + ?Sized> Persister for Box<P> {
    fn save(&mut self, snapshot: &Snapshot<'_>) -> io::Result<()> {
        (**self).save(snapshot)
    }
    fn location(&self) -> Option<&Path> {
        (**self).location()
    }
}

#[derive(Debug, Clone)]
pub struct JsonFilePersister {
    path: PathBuf,
}

impl JsonFilePersister {
    /// Persister for `path`; the parent directory must already exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Like [`new`](Self::new) but creates missing parent directories.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persister for JsonFilePersister {
    fn save(&mut self, snapshot: &Snapshot<'_>) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot).map_err(io::Error::other)?;
        write_atomic(&self.path, &bytes)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersister;

impl Persister for NullPersister {
    fn save(&mut self, _snapshot: &Snapshot<'_>) -> io::Result<()> {
        Ok(())
    }
}
