//! Time-Related Constants
//!
//! Time intervals, cadences and conversion factors used by the telemetry loop
//! and the predictor.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: u32 = 60;

/// Minutes per hour.
pub const MINUTES_PER_HOUR: u32 = 60;

/// Seconds per hour.
pub const SECONDS_PER_HOUR: u32 = SECONDS_PER_MINUTE * MINUTES_PER_HOUR;

// ===== LOOP CADENCE =====

/// Seconds between sensor reads (and between raw publishes).
///
/// Also the nominal sampling interval the predictor divides deltas by.
pub const DEFAULT_PUBLISH_INTERVAL_S: u32 = 5;

/// Prediction publish cadence in successful readings.
///
/// Six readings at the default 5 s interval gives one prediction round
/// every 30 seconds.
pub const DEFAULT_PREDICTION_EVERY: u32 = 6;

/// Prediction horizons published every prediction round (minutes).
pub const DEFAULT_HORIZONS_MIN: [u32; 3] = [5, 15, 30];

/// Granularity of the loop's inter-cycle sleep (milliseconds).
///
/// The stop flag is checked between slices so Ctrl-C ends a run promptly
/// even with long publish intervals.
pub const SLEEP_SLICE_MS: u64 = 100;
