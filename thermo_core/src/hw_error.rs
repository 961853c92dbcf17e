//! Maps `Box<dyn Error>` from trait boundaries to typed `ThermoError`.
//!
//! The traits in `thermo_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our error enum, with an optional feature-gated
//! path for `thermo_hardware::HwError` downcasting.

use crate::error::ThermoError;

/// Map a trait-boundary error to a typed `ThermoError`.
///
/// Known hardware error types are downcast first, then we fall back to
/// string heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ThermoError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<thermo_hardware::error::HwError>() {
            return match hw {
                thermo_hardware::error::HwError::Timeout => ThermoError::Timeout,
                other => ThermoError::CommunicationFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        ThermoError::Timeout
    } else {
        ThermoError::Communication(s)
    }
}
