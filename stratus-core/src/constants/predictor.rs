//! Trend Predictor Defaults
//!
//! The predictor is a bounded incremental estimator. These constants define
//! its window, smoothing and the clamps that keep extrapolation sane.

/// History capacity in samples.
///
/// 50 samples at 5 s covers a little over four minutes of history.
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// EMA smoothing factor applied to consecutive deltas.
pub const DEFAULT_EMA_ALPHA: f32 = 0.2;

/// Minimum samples before a non-zero rate is reported.
pub const MIN_SAMPLES_FOR_RATE: usize = 3;

/// Absolute clamp on projected change (°C).
pub const DEFAULT_MAX_CHANGE: f32 = 3.0;

/// Lower bound of the plausible projected value (°C, indoor node).
pub const DEFAULT_MIN_VALUE: f32 = 0.0;

/// Upper bound of the plausible projected value (°C, indoor node).
pub const DEFAULT_MAX_VALUE: f32 = 40.0;

/// Trend classification threshold applied to the smoothed hourly rate.
///
/// Tunable, not physically derived. Readings are rounded to 0.1 °C, so any
/// non-zero smoothed delta lands far above it.
pub const DEFAULT_TREND_THRESHOLD: f32 = 0.0005;

/// Clamp on the reported hourly rate (°C/hour).
pub const HOURLY_RATE_LIMIT: f32 = 5.0;

/// Clamp on the reported per-minute rate (°C/min).
pub const MINUTE_RATE_LIMIT: f32 = 1.0;

/// Confidence reported when there is not enough data to predict.
pub const NO_DATA_CONFIDENCE: f32 = 0.1;

/// Confidence floor for a prediction backed by data.
pub const CONFIDENCE_BASE: f32 = 0.2;

/// Weight of the combined data/stability factor in the confidence blend.
pub const CONFIDENCE_SPAN: f32 = 0.7;
