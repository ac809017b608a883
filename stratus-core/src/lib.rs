//! Core runtime for Stratus
//!
//! Holds the parts of the sensor node that carry real state:
//! - A bounded sample history with oldest-first eviction
//! - The trend predictor (EMA over consecutive deltas, clamped projections)
//! - The status indicator arbitration state machine (std only)
//!
//! Key constraints:
//! - Predictor and history work without heap allocation
//! - Predictions never fail; degenerate input is signalled with `Trend::NoData`
//! - Indicator state is owned by the indicator alone and mutated under one lock
//!
//! ```rust
//! use stratus_core::predictor::{TrendPredictor, Trend};
//!
//! let mut predictor: TrendPredictor = TrendPredictor::default();
//! for value in [19.0, 19.1, 19.2] {
//!     predictor.add_reading(value).unwrap();
//! }
//!
//! let prediction = predictor.predict(5.0);
//! assert_eq!(prediction.trend, Trend::Rising);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Macros for optional logging
#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

pub mod buffer;
pub mod constants;
pub mod errors;
pub mod predictor;
pub mod time;
pub mod traits;

#[cfg(feature = "std")]
pub mod indicator;

// Public API
pub use errors::{CoreError, CoreResult};
pub use predictor::{Prediction, PredictorConfig, Trend, TrendPredictor};
pub use traits::{IndicatorOutput, Sensor, SensorReading};

#[cfg(feature = "std")]
pub use indicator::{
    ErrorCodeTiming, IndicatorConfig, IndicatorPattern, IndicatorStatus, PatternClass, PatternTable,
    StatusIndicator,
};

/// Crate version, reported in the metrics summary
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
