//! Test and helper mocks for thermo_core.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use thermo_traits::{Channel, DeviceError, Thermometer};

use crate::observer::{StabilizationEvent, StabilizationObserver};
use crate::persist::{Persister, Snapshot};

type Script = Box<dyn FnMut(usize) -> f64>;

/// Thermometer whose `n`-th reading (0-based) comes from a script.
///
/// Every read is counted, including failed ones, and the channel asked for
/// is recorded.
pub struct ScriptedThermometer {
    script: Script,
    reads: usize,
    fail_on: Option<(usize, String)>,
    channels: Vec<Channel>,
}

impl ScriptedThermometer {
    /// Replay `values`, repeating the last one once exhausted.
    pub fn new(values: Vec<f64>) -> Self {
        Self::from_fn(move |n| {
            values
                .get(n)
                .or_else(|| values.last())
                .copied()
                .unwrap_or(f64::NAN)
        })
    }

    pub fn constant(kelvin: f64) -> Self {
        Self::from_fn(move |_| kelvin)
    }

    pub fn from_fn(f: impl FnMut(usize) -> f64 + 'static) -> Self {
        Self {
            script: Box::new(f),
            reads: 0,
            fail_on: None,
            channels: Vec::new(),
        }
    }

    /// Make read number `n` (1-based) fail with `message`.
    pub fn fail_on(mut self, n: usize, message: impl Into<String>) -> Self {
        self.fail_on = Some((n, message.into()));
        self
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }
}

impl Thermometer for ScriptedThermometer {
    fn read_temperature(&mut self, channel: Channel) -> Result<f64, DeviceError> {
        self.reads += 1;
        self.channels.push(channel);
        if let Some((_, msg)) = self.fail_on.as_ref().filter(|(n, _)| *n == self.reads) {
            return Err(Box::new(io::Error::other(msg.clone())));
        }
        Ok((self.script)(self.reads - 1))
    }
}

/// Keeps every snapshot as a JSON value; clones share the same store.
#[derive(Debug, Default, Clone)]
pub struct MemoryPersister {
    saved: Rc<RefCell<Vec<serde_json::Value>>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<serde_json::Value> {
        self.saved.borrow().clone()
    }

    pub fn last(&self) -> Option<serde_json::Value> {
        self.saved.borrow().last().cloned()
    }
}

impl Persister for MemoryPersister {
    fn save(&mut self, snapshot: &Snapshot<'_>) -> io::Result<()> {
        let v = serde_json::to_value(snapshot).map_err(io::Error::other)?;
        self.saved.borrow_mut().push(v);
        Ok(())
    }
}

/// Fails every save.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingPersister;

impl Persister for FailingPersister {
    fn save(&mut self, _snapshot: &Snapshot<'_>) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }
}

/// Records a short label per event; clones share the log.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<String>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events.borrow().iter().filter(|e| *e == label).count()
    }
}

impl StabilizationObserver for RecordingObserver {
    fn on_event(&self, event: &StabilizationEvent<'_>) {
        let label = match event {
            StabilizationEvent::PhaseChanged { to, .. } => format!("phase:{to:?}"),
            StabilizationEvent::SetpointChanged { .. } => "setpoint".to_string(),
            StabilizationEvent::SampleAccepted { .. } => "sample".to_string(),
            StabilizationEvent::SampleRejected { .. } => "rejected".to_string(),
            StabilizationEvent::CycleClosed { .. } => "cycle".to_string(),
            StabilizationEvent::Retrying { .. } => "retry".to_string(),
            StabilizationEvent::Stable { .. } => "stable".to_string(),
            StabilizationEvent::Aborted { .. } => "aborted".to_string(),
            StabilizationEvent::PersistFailed { .. } => "persist_failed".to_string(),
        };
        self.events.borrow_mut().push(label);
    }
}
