//! Constants for the Stratus Core
//!
//! Centralized numeric defaults used across the runtime. Every value here is
//! a deployment default, not a physical law: the agent configuration can
//! override each of them.
//!
//! ## Organization
//!
//! Constants are grouped by domain:
//! - **Time**: unit conversions and loop cadences
//! - **Predictor**: window size, smoothing, clamps and thresholds
//! - **Indicator**: arbitration and blink timing
//! - **Connectivity**: timeouts, polling and retry caps
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Use descriptive names that include units
//! 3. Keep defaults identical to the values the firmware shipped with

/// Time-related constants for intervals and unit conversions.
pub mod time;

/// Trend predictor defaults.
pub mod predictor;

/// Status indicator timing and arbitration constants.
pub mod indicator;

/// Network and broker lifecycle defaults.
pub mod connectivity;

// Re-export commonly used constants for convenience
pub use time::{
    MS_PER_SECOND, SECONDS_PER_MINUTE, SECONDS_PER_HOUR,
    DEFAULT_PUBLISH_INTERVAL_S, DEFAULT_PREDICTION_EVERY, DEFAULT_HORIZONS_MIN,
};

pub use predictor::{
    DEFAULT_WINDOW_SIZE, DEFAULT_EMA_ALPHA, DEFAULT_MAX_CHANGE,
    DEFAULT_TREND_THRESHOLD, NO_DATA_CONFIDENCE,
};

pub use indicator::{ALERT_EXTENSION_FACTOR, SOLID_ON_MODE, SOLID_OFF_MODE};

pub use connectivity::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS};
