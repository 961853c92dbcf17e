//! Accumulates readings for the cycle in progress and keeps the closed-cycle
//! history for the current setpoint.

use serde::{Deserialize, Serialize};

use crate::regression::LinearFit;

/// One completed regression window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub measurements: Vec<f64>,
    #[serde(rename = "slope_A")]
    pub slope: f64,
    #[serde(rename = "intercept_B")]
    pub intercept: f64,
}

#[derive(Debug, Default, Clone)]
pub struct CycleRecorder {
    current: Vec<f64>,
    history: Vec<Cycle>,
}

impl CycleRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, kelvin: f64) {
        self.current.push(kelvin);
    }

    /// Readings gathered so far in the open cycle.
    pub fn current(&self) -> &[f64] {
        &self.current
    }

    /// Drop a partially filled cycle without touching the history.
    pub fn discard_current(&mut self) {
        self.current.clear();
    }

    /// Move the open cycle into the history with its fit.
    pub fn close_cycle(&mut self, fit: LinearFit) -> &Cycle {
        let measurements = std::mem::take(&mut self.current);
        self.history.push(Cycle {
            measurements,
            slope: fit.slope,
            intercept: fit.intercept,
        });
        &self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[Cycle] {
        &self.history
    }

    /// Forget everything; used when the setpoint changes.
    pub fn reset(&mut self) {
        self.current.clear();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_moves_samples_into_history() {
        let mut r = CycleRecorder::new();
        r.add_sample(300.0);
        r.add_sample(300.1);
        let c = r.close_cycle(LinearFit {
            slope: 0.1,
            intercept: 300.0,
        });
        assert_eq!(c.measurements, vec![300.0, 300.1]);
        assert!(r.current().is_empty());
        assert_eq!(r.history().len(), 1);
    }

    #[test]
    fn reset_clears_both_buffers() {
        let mut r = CycleRecorder::new();
        r.add_sample(1.0);
        r.add_sample(2.0);
        r.close_cycle(LinearFit {
            slope: 1.0,
            intercept: 1.0,
        });
        r.add_sample(3.0);
        r.reset();
        assert!(r.current().is_empty());
        assert!(r.history().is_empty());
    }

    #[test]
    fn cycle_serializes_with_legacy_keys() {
        let c = Cycle {
            measurements: vec![300.0],
            slope: 0.0,
            intercept: 300.0,
        };
        let v = serde_json::to_value(&c).unwrap();
        assert!(v.get("slope_A").is_some());
        assert!(v.get("intercept_B").is_some());
        assert!(v.get("measurements").is_some());
    }
}
