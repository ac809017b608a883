//! Short-Horizon Trend Prediction
//!
//! ## Overview
//!
//! The node publishes where the temperature is heading over the next 5, 15 and
//! 30 minutes. It has no room for a trained time-series model, so the
//! predictor is a bounded incremental estimator:
//!
//! 1. Keep the last N readings (oldest evicted first)
//! 2. Smooth the per-reading deltas with an exponential moving average
//! 3. Extrapolate linearly, then clamp twice: the change, then the result
//!
//! ## Rate Estimation
//!
//! Deltas are divided by the nominal sampling interval, not by timestamp
//! differences, so a late sample does not produce a spike:
//!
//! ```text
//! rate₁ = (x₁ - x₀) / Δt
//! rateᵢ = α × (xᵢ - xᵢ₋₁) / Δt + (1 - α) × rateᵢ₋₁      for i ≥ 2
//! ```
//!
//! With fewer than three samples the rate is reported as zero: one delta is
//! not enough to tell a trend from sensor quantization.
//!
//! ## Projection
//!
//! ```text
//! change    = clamp(rate × horizon_min × 60, ±max_change)
//! predicted = clamp(current + change, [min_value, max_value])
//! ```
//!
//! ## Confidence
//!
//! Two bounded factors, blended so the result always lands in [0.2, 0.9] for
//! a prediction backed by data (0.1 when there is none):
//!
//! ```text
//! data_factor      = min(1, len / capacity)
//! stability_factor = 1 - min(1, |hourly rate| / 5)
//! confidence       = 0.2 + 0.7 × data_factor × stability_factor
//! ```
//!
//! ## Prediction Identifiers
//!
//! Every `predict()` call takes the next value of a monotonic counter, whether
//! or not it had data. Consumers use it to order and de-duplicate predictions;
//! it only resets with the process.

use crate::buffer::{Sample, SampleRing};
use crate::constants::predictor::{
    CONFIDENCE_BASE, CONFIDENCE_SPAN, DEFAULT_EMA_ALPHA, DEFAULT_MAX_CHANGE, DEFAULT_MAX_VALUE,
    DEFAULT_MIN_VALUE, DEFAULT_TREND_THRESHOLD, DEFAULT_WINDOW_SIZE, HOURLY_RATE_LIMIT,
    MINUTE_RATE_LIMIT, MIN_SAMPLES_FOR_RATE, NO_DATA_CONFIDENCE,
};
use crate::constants::time::{DEFAULT_PUBLISH_INTERVAL_S, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};
use crate::errors::{CoreError, CoreResult};
use crate::time::Timestamp;

/// Direction of the smoothed rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Trend {
    /// Hourly rate above the threshold
    Rising,
    /// Hourly rate below the negative threshold
    Falling,
    /// Hourly rate within the threshold band
    Stable,
    /// Not enough history to say anything
    NoData,
}

impl Trend {
    /// Wire name of the trend
    pub const fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
            Trend::NoData => "no_data",
        }
    }
}

impl core::fmt::Display for Trend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one `predict()` call. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Prediction {
    /// Most recent reading (1 dp), or 0 with no history
    pub current: f32,
    /// Projected value at the horizon (1 dp), always within the configured bounds
    pub predicted: f32,
    /// Requested horizon in minutes
    pub horizon_minutes: f32,
    /// Trend classification
    pub trend: Trend,
    /// Confidence in [0.1, 0.9] (2 dp)
    pub confidence: f32,
    /// Smoothed rate in units per second (4 dp)
    pub change_per_sec: f32,
    /// Smoothed rate in units per minute, clamped to ±1 (2 dp)
    pub change_per_min: f32,
    /// Smoothed rate in units per hour, clamped to ±5 (2 dp)
    pub change_per_hour: f32,
    /// Monotonic identifier of this prediction
    pub prediction_id: u64,
    /// Samples in the history when the prediction was made
    pub data_points: usize,
}

impl Prediction {
    /// Check if this is the `no_data` sentinel
    pub fn is_degenerate(&self) -> bool {
        self.trend == Trend::NoData
    }
}

/// Predictor tuning. Defaults match the shipped firmware.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PredictorConfig {
    /// Nominal sampling interval the deltas are divided by (seconds)
    pub reading_interval_secs: f32,
    /// EMA smoothing factor in (0, 1]
    pub alpha: f32,
    /// Absolute clamp on the projected change
    pub max_change: f32,
    /// Lowest plausible projected value
    pub min_value: f32,
    /// Highest plausible projected value
    pub max_value: f32,
    /// Hourly-rate band treated as stable
    pub trend_threshold: f32,
    /// Absolute clamp on the reported hourly rate
    pub hourly_rate_limit: f32,
    /// Absolute clamp on the reported per-minute rate
    pub minute_rate_limit: f32,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            reading_interval_secs: DEFAULT_PUBLISH_INTERVAL_S as f32,
            alpha: DEFAULT_EMA_ALPHA,
            max_change: DEFAULT_MAX_CHANGE,
            min_value: DEFAULT_MIN_VALUE,
            max_value: DEFAULT_MAX_VALUE,
            trend_threshold: DEFAULT_TREND_THRESHOLD,
            hourly_rate_limit: HOURLY_RATE_LIMIT,
            minute_rate_limit: MINUTE_RATE_LIMIT,
        }
    }
}

impl PredictorConfig {
    /// Reject settings the estimator cannot work with
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.reading_interval_secs.is_finite() && self.reading_interval_secs > 0.0) {
            return Err(CoreError::InvalidConfig {
                reason: "reading interval must be positive",
            });
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(CoreError::InvalidConfig {
                reason: "alpha must be in (0, 1]",
            });
        }
        if !(self.max_change.is_finite() && self.max_change >= 0.0) {
            return Err(CoreError::InvalidConfig {
                reason: "max change must be non-negative",
            });
        }
        if !(self.min_value.is_finite() && self.max_value.is_finite() && self.min_value <= self.max_value) {
            return Err(CoreError::InvalidConfig {
                reason: "value bounds must be finite and ordered",
            });
        }
        if !(self.trend_threshold.is_finite() && self.trend_threshold >= 0.0) {
            return Err(CoreError::InvalidConfig {
                reason: "trend threshold must be non-negative",
            });
        }
        if !(self.hourly_rate_limit.is_finite() && self.hourly_rate_limit > 0.0)
            || !(self.minute_rate_limit.is_finite() && self.minute_rate_limit > 0.0)
        {
            return Err(CoreError::InvalidConfig {
                reason: "rate limits must be positive",
            });
        }
        Ok(())
    }

    fn interval_ms(&self) -> u64 {
        libm::roundf(self.reading_interval_secs * 1000.0) as u64
    }
}

/// Bounded EMA trend predictor over the last `N` readings
#[derive(Clone)]
pub struct TrendPredictor<const N: usize = DEFAULT_WINDOW_SIZE> {
    history: SampleRing<N>,
    config: PredictorConfig,
    prediction_count: u64,
}

impl<const N: usize> Default for TrendPredictor<N> {
    fn default() -> Self {
        Self {
            history: SampleRing::new(),
            config: PredictorConfig::default(),
            prediction_count: 0,
        }
    }
}

impl<const N: usize> TrendPredictor<N> {
    /// Create a predictor with validated settings
    pub fn new(config: PredictorConfig) -> CoreResult<Self> {
        config.validate()?;
        log_debug!(
            "Trend predictor ready (window={}, interval={}s)",
            N,
            config.reading_interval_secs
        );
        Ok(Self {
            history: SampleRing::new(),
            config,
            prediction_count: 0,
        })
    }

    /// Record a reading stamped one nominal interval after the previous one
    pub fn add_reading(&mut self, value: f32) -> CoreResult<()> {
        let timestamp = self
            .history
            .last()
            .map(|last| last.timestamp + self.config.interval_ms())
            .unwrap_or(0);
        self.add_reading_at(value, timestamp)
    }

    /// Record a reading taken at `timestamp`
    ///
    /// The value is rounded to one decimal before storage. Non-finite values
    /// are rejected and leave the history untouched.
    pub fn add_reading_at(&mut self, value: f32, timestamp: Timestamp) -> CoreResult<()> {
        if !value.is_finite() {
            log_warn!("Rejected non-finite reading");
            return Err(CoreError::InvalidValue);
        }

        self.history.push(Sample::new(round_to(value, 1), timestamp));
        Ok(())
    }

    /// Smoothed rate of change in units per second
    pub fn smoothed_rate_per_sec(&self) -> f32 {
        if self.history.len() < MIN_SAMPLES_FOR_RATE {
            return 0.0;
        }

        let interval = self.config.reading_interval_secs;
        let alpha = self.config.alpha;

        let mut deltas = self
            .history
            .iter()
            .zip(self.history.iter().skip(1))
            .map(|(prev, next)| (next.value - prev.value) / interval);

        // First delta seeds the estimate
        let seed = deltas.next().unwrap_or(0.0);
        deltas.fold(seed, |rate, delta| alpha * delta + (1.0 - alpha) * rate)
    }

    /// Smoothed rate in units per hour, clamped to the hourly limit
    pub fn change_per_hour(&self) -> f32 {
        let limit = self.config.hourly_rate_limit;
        let per_hour = self.smoothed_rate_per_sec() * SECONDS_PER_HOUR as f32;
        per_hour.clamp(-limit, limit)
    }

    /// Smoothed rate in units per minute, clamped to the minute limit
    pub fn change_per_min(&self) -> f32 {
        let limit = self.config.minute_rate_limit;
        let per_min = self.smoothed_rate_per_sec() * SECONDS_PER_MINUTE as f32;
        per_min.clamp(-limit, limit)
    }

    /// Predict the value `horizon_minutes` ahead
    ///
    /// Never fails. With fewer than two samples the result carries
    /// `Trend::NoData` and confidence 0.1.
    pub fn predict(&mut self, horizon_minutes: f32) -> Prediction {
        self.prediction_count += 1;

        let horizon_minutes = if horizon_minutes.is_finite() {
            horizon_minutes.max(0.0)
        } else {
            0.0
        };
        let data_points = self.history.len();
        let last = self.history.last().map(|s| s.value);

        if data_points <= 1 {
            let current = last.unwrap_or(0.0);
            return Prediction {
                current: round_to(current, 1),
                predicted: round_to(self.clamp_value(current), 1),
                horizon_minutes,
                trend: Trend::NoData,
                confidence: NO_DATA_CONFIDENCE,
                change_per_sec: 0.0,
                change_per_min: 0.0,
                change_per_hour: 0.0,
                prediction_id: self.prediction_count,
                data_points,
            };
        }

        let current = last.unwrap_or(0.0);
        let rate_per_sec = self.smoothed_rate_per_sec();
        let per_hour = self.change_per_hour();

        let max_change = self.config.max_change;
        let change = (rate_per_sec * horizon_minutes * SECONDS_PER_MINUTE as f32)
            .clamp(-max_change, max_change);
        let predicted = self.clamp_value(current + change);

        let threshold = self.config.trend_threshold;
        let trend = if per_hour > threshold {
            Trend::Rising
        } else if per_hour < -threshold {
            Trend::Falling
        } else {
            Trend::Stable
        };

        Prediction {
            current: round_to(current, 1),
            predicted: round_to(predicted, 1),
            horizon_minutes,
            trend,
            confidence: self.confidence(per_hour),
            change_per_sec: round_to(rate_per_sec, 4),
            change_per_min: round_to(self.change_per_min(), 2),
            change_per_hour: round_to(per_hour, 2),
            prediction_id: self.prediction_count,
            data_points,
        }
    }

    /// Blend data sufficiency and rate stability into [0.2, 0.9]
    fn confidence(&self, per_hour: f32) -> f32 {
        let data_factor = (self.history.len() as f32 / N as f32).min(1.0);
        let stability_factor =
            1.0 - (libm::fabsf(per_hour) / self.config.hourly_rate_limit).min(1.0);

        round_to(CONFIDENCE_BASE + CONFIDENCE_SPAN * data_factor * stability_factor, 2)
    }

    fn clamp_value(&self, value: f32) -> f32 {
        value.clamp(self.config.min_value, self.config.max_value)
    }

    /// Read-only view of the history
    pub fn history(&self) -> &SampleRing<N> {
        &self.history
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Check if no samples are stored
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// History capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Predictions issued so far
    pub fn prediction_count(&self) -> u64 {
        self.prediction_count
    }

    /// Active settings
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Drop the history. The prediction counter keeps counting.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f32, decimals: u32) -> f32 {
    let factor = match decimals {
        0 => 1.0,
        1 => 10.0,
        2 => 100.0,
        3 => 1_000.0,
        _ => 10_000.0,
    };
    libm::roundf(value * factor) / factor
}
