//! Indicator pattern table
//!
//! A pattern is a named (on, off) pair in seconds plus a priority class. The
//! table is loaded once at startup and never mutated by the runtime.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::constants::indicator::{
    ALERT_EXTENSION_FACTOR, ERROR_BLINK_MS, ERROR_DIGIT_GAP_MS, MIN_PERIOD_MS,
};
use crate::errors::{CoreError, CoreResult};

/// Priority class of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PatternClass {
    /// Ordinary status (connection progress, manual blink)
    #[default]
    Standard,
    /// Urgent condition: preempts data patterns, runs with extended timing
    Alert,
    /// Routine activity flash, suppressed while an alert is showing
    Data,
}

/// On/off timing of one named mode
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndicatorPattern {
    /// Seconds the output stays on each period
    pub on_secs: f32,
    /// Seconds the output stays off each period
    pub off_secs: f32,
    /// Priority class
    #[cfg_attr(feature = "serde", serde(default))]
    pub class: PatternClass,
}

impl IndicatorPattern {
    /// Standard-class pattern
    pub const fn new(on_secs: f32, off_secs: f32) -> Self {
        Self { on_secs, off_secs, class: PatternClass::Standard }
    }

    /// Alert-class pattern
    pub const fn alert(on_secs: f32, off_secs: f32) -> Self {
        Self { on_secs, off_secs, class: PatternClass::Alert }
    }

    /// Data-class pattern
    pub const fn data(on_secs: f32, off_secs: f32) -> Self {
        Self { on_secs, off_secs, class: PatternClass::Data }
    }

    /// Check the timing can be scheduled
    pub fn validate(&self) -> CoreResult<()> {
        let sane = |v: f32| v.is_finite() && v >= 0.0;
        if !sane(self.on_secs) || !sane(self.off_secs) || self.on_secs + self.off_secs <= 0.0 {
            return Err(CoreError::InvalidPattern {
                on_secs: self.on_secs,
                off_secs: self.off_secs,
            });
        }
        Ok(())
    }

    /// Effective (on, off) durations, with the alert extension applied
    pub fn timing(&self) -> (Duration, Duration) {
        let factor = match self.class {
            PatternClass::Alert => ALERT_EXTENSION_FACTOR,
            _ => 1.0,
        };
        (
            secs_to_duration(self.on_secs * factor),
            secs_to_duration(self.off_secs * factor),
        )
    }

    /// Effective toggle period, never shorter than the worker's minimum
    pub fn period(&self) -> Duration {
        let (on, off) = self.timing();
        (on + off).max(Duration::from_millis(MIN_PERIOD_MS))
    }

    /// Fraction of the period spent on
    pub fn duty_cycle(&self) -> f32 {
        let total = self.on_secs + self.off_secs;
        if total > 0.0 {
            self.on_secs / total
        } else {
            0.0
        }
    }
}

fn secs_to_duration(secs: f32) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f32(secs)
    } else {
        Duration::ZERO
    }
}

/// Named patterns available to `StatusIndicator::set_mode`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PatternTable {
    patterns: BTreeMap<String, IndicatorPattern>,
}

impl PatternTable {
    /// Empty table; every `set_mode` will be rejected
    pub fn empty() -> Self {
        Self { patterns: BTreeMap::new() }
    }

    /// Table shipped with the node
    pub fn with_defaults() -> Self {
        let entries = [
            ("WIFI_CONNECTING", IndicatorPattern::new(0.2, 0.2)),
            ("WIFI_CONNECTED", IndicatorPattern::new(0.05, 1.0)),
            ("WIFI_ERROR", IndicatorPattern::new(0.3, 0.3)),
            ("BROKER_CONNECTING", IndicatorPattern::new(0.1, 0.3)),
            ("BROKER_CONNECTED", IndicatorPattern::new(0.05, 1.0)),
            ("BLINK", IndicatorPattern::new(0.5, 0.5)),
            ("COMFORTABLE", IndicatorPattern::alert(0.05, 0.95)),
            ("UNCOMFORTABLE", IndicatorPattern::alert(0.15, 0.15)),
            ("ALERT", IndicatorPattern::alert(0.05, 0.05)),
            ("ERROR", IndicatorPattern::alert(0.1, 0.1)),
            ("SENSOR_READING", IndicatorPattern::data(0.02, 0.08)),
            ("DATA_SENT", IndicatorPattern::data(0.05, 0.05)),
        ];

        Self {
            patterns: entries
                .into_iter()
                .map(|(name, pattern)| (String::from(name), pattern))
                .collect(),
        }
    }

    /// Add or replace a pattern after validating its timing
    pub fn insert(&mut self, name: &str, pattern: IndicatorPattern) -> CoreResult<()> {
        pattern.validate()?;
        self.patterns.insert(String::from(name), pattern);
        Ok(())
    }

    /// Builder form of `insert`
    pub fn with(mut self, name: &str, pattern: IndicatorPattern) -> CoreResult<Self> {
        self.insert(name, pattern)?;
        Ok(self)
    }

    /// Look up a pattern
    pub fn get(&self, name: &str) -> Option<&IndicatorPattern> {
        self.patterns.get(name)
    }

    /// Check if a mode name is known
    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Known mode names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Validate every entry; used after deserializing a table from config
    pub fn validate(&self) -> CoreResult<()> {
        self.patterns.values().try_for_each(IndicatorPattern::validate)
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Timing of the digit-coded error blink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ErrorCodeTiming {
    /// On and off time of each blink
    pub blink_ms: u64,
    /// Pause after each digit
    pub digit_gap_ms: u64,
}

impl Default for ErrorCodeTiming {
    fn default() -> Self {
        Self {
            blink_ms: ERROR_BLINK_MS,
            digit_gap_ms: ERROR_DIGIT_GAP_MS,
        }
    }
}

/// Everything the indicator is configured with
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IndicatorConfig {
    /// Named patterns
    pub patterns: PatternTable,
    /// Error-code blink timing
    pub error_timing: ErrorCodeTiming,
}
