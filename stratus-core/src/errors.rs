//! Error Types for the Core Runtime
//!
//! ## Design Philosophy
//!
//! Core errors follow the same rules as everything else that can run on the
//! node itself:
//!
//! 1. **Small Size**: variants carry only `Copy` data and `&'static str` reasons,
//!    so an error can be returned from a timer path without allocating.
//!
//! 2. **Never Fatal**: none of these errors stop the telemetry loop. They are
//!    reported at the call site (a `false` return or a log line) and the loop
//!    moves on.
//!
//! ## Error Categories
//!
//! ### Data Errors
//! - `InvalidValue`: a reading that is not a finite number (NaN, infinity)
//!
//! ### Configuration Errors
//! - `UnknownPattern`: an indicator mode that is not in the pattern table
//! - `InvalidPattern`: a pattern whose timing cannot be scheduled
//! - `InvalidConfig`: any other rejected setting
//!
//! ### Arbitration Outcomes
//! - `PatternSuppressed`: a data-class request arrived while an alert is showing
//!
//! ### Setup Errors
//! - `WorkerUnavailable`: the indicator timer thread could not be spawned
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use stratus_core::{CoreError, TrendPredictor};
//!
//! let mut predictor: TrendPredictor = TrendPredictor::default();
//! match predictor.add_reading(f32::NAN) {
//!     Ok(()) => {}
//!     Err(CoreError::InvalidValue) => {
//!         // Count it as a sensor miss and keep going
//!     }
//!     Err(_) => {}
//! }
//! ```

use thiserror_no_std::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Core errors - kept small for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CoreError {
    /// Value makes no physical sense (NaN, infinity, etc)
    #[error("Invalid value: not a finite number")]
    InvalidValue,

    /// Indicator mode missing from the loaded pattern table
    #[error("Unknown indicator pattern")]
    UnknownPattern,

    /// Data-class pattern requested while an alert-class pattern is active
    #[error("Pattern suppressed: an alert is active")]
    PatternSuppressed,

    /// Pattern timing cannot be scheduled (negative, non-finite or zero period)
    #[error("Invalid pattern timing: on={on_secs}s off={off_secs}s")]
    InvalidPattern {
        /// Requested on-duration in seconds
        on_secs: f32,
        /// Requested off-duration in seconds
        off_secs: f32,
    },

    /// The indicator timer worker thread could not be started
    #[error("Indicator timer worker unavailable")]
    WorkerUnavailable,

    /// Configuration value rejected
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Which setting was rejected and why
        reason: &'static str,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for CoreError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InvalidValue => defmt::write!(fmt, "Invalid value"),
            Self::UnknownPattern => defmt::write!(fmt, "Unknown pattern"),
            Self::PatternSuppressed => defmt::write!(fmt, "Pattern suppressed by alert"),
            Self::InvalidPattern { on_secs, off_secs } => {
                defmt::write!(fmt, "Invalid pattern on={} off={}", on_secs, off_secs)
            }
            Self::WorkerUnavailable => defmt::write!(fmt, "Timer worker unavailable"),
            Self::InvalidConfig { reason } => defmt::write!(fmt, "Invalid config: {}", reason),
        }
    }
}

impl CoreError {
    /// Configuration failures are rejected at the call site and must never
    /// be retried with the same input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownPattern | Self::InvalidPattern { .. } | Self::InvalidConfig { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size_stays_small() {
        assert!(core::mem::size_of::<CoreError>() <= 24);
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(CoreError::UnknownPattern.is_configuration());
        assert!(CoreError::InvalidPattern { on_secs: -1.0, off_secs: 0.0 }.is_configuration());
        assert!(!CoreError::PatternSuppressed.is_configuration());
        assert!(!CoreError::InvalidValue.is_configuration());
    }

    #[cfg(feature = "std")]
    #[test]
    fn display_messages() {
        let err = CoreError::InvalidConfig { reason: "interval must be positive" };
        assert_eq!(err.to_string(), "Invalid configuration: interval must be positive");
    }
}
