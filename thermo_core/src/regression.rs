//! Ordinary least-squares line fit over sample index.
//!
//! Samples are treated as `y[i]` at `x = i` for `i = 0..n`, so the slope is in
//! kelvin per sampling interval and the intercept is the fitted value at the
//! first sample of the cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// K per sampling interval
    pub slope: f64,
    /// Fitted temperature at the first sample (K)
    pub intercept: f64,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FitError {
    #[error("need at least 2 samples for a fit, got {0}")]
    TooFewSamples(usize),
    #[error("sample {0} is not finite")]
    NonFinite(usize),
}

/// Fit `y = slope * i + intercept`.
///
/// Residuals are centered on the means before accumulating, which keeps
/// precision for readings around 300 K with sub-millikelvin spread.
pub fn fit(samples: &[f64]) -> Result<LinearFit, FitError> {
    let n = samples.len();
    if n < 2 {
        return Err(FitError::TooFewSamples(n));
    }
    if let Some(i) = samples.iter().position(|y| !y.is_finite()) {
        return Err(FitError::NonFinite(i));
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = samples.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in samples.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    // sxx > 0 for n >= 2
    let slope = sxy / sxx;
    Ok(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}
