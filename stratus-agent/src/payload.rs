//! JSON shapes published to downstream consumers
//!
//! Dashboards and the time-series store key on these field names, so they
//! are part of the wire contract. Timestamps are Unix seconds with
//! millisecond precision.

use serde::Serialize;
use stratus_core::time::{as_secs_f64, SystemTime, TimeSource};
use stratus_core::{Prediction, Trend};
use stratus_ml::ComfortAssessment;

use crate::telemetry::LoopStats;

/// Current wall-clock time in payload units
pub fn now_secs() -> f64 {
    as_secs_f64(SystemTime.now())
}

/// Primary temperature publish
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperaturePayload {
    /// Message sequence number
    pub id: u64,
    /// Reading in °C
    pub temperature: f32,
    /// Unix seconds
    pub timestamp: f64,
    /// Prediction fields, present only in rich-payload mode
    #[serde(flatten)]
    pub details: Option<PredictionDetails>,
}

/// Extra fields attached to the temperature payload in rich mode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionDetails {
    /// Projection at the shortest horizon
    pub predicted: f32,
    /// Trend label
    pub trend: Trend,
    /// Confidence of the projection
    pub confidence: f32,
    /// °C per second
    pub change_per_sec: f32,
    /// °C per minute
    pub change_per_min: f32,
    /// °C per hour
    pub change_per_hour: f32,
    /// History length
    pub data_points: usize,
}

impl From<&Prediction> for PredictionDetails {
    fn from(p: &Prediction) -> Self {
        Self {
            predicted: p.predicted,
            trend: p.trend,
            confidence: p.confidence,
            change_per_sec: p.change_per_sec,
            change_per_min: p.change_per_min,
            change_per_hour: p.change_per_hour,
            data_points: p.data_points,
        }
    }
}

/// Combined reading record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatePayload<'a> {
    /// °C
    pub temperature: f32,
    /// hPa, absent when the pressure channel missed
    pub pressure: Option<f32>,
    /// Successful reading count
    pub reading: u64,
    /// Unix seconds
    pub timestamp: f64,
    /// Sensor model
    pub sensor: &'a str,
}

/// Comfort classification result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComfortPayload<'a> {
    /// Registered user
    pub user: &'a str,
    /// 1 comfortable, 0 uncomfortable
    pub label: u8,
    /// Model probability of comfort
    pub probability: f32,
    /// COMFORTABLE / UNCOMFORTABLE
    pub status: &'static str,
    /// Input temperature in °C
    pub temperature: f32,
    /// Unix seconds
    pub timestamp: f64,
}

impl<'a> ComfortPayload<'a> {
    /// Payload for one assessment
    pub fn new(user: &'a str, assessment: &ComfortAssessment, temperature: f32, timestamp: f64) -> Self {
        Self {
            user,
            label: assessment.label.as_u8(),
            probability: assessment.probability,
            status: assessment.label.as_str(),
            temperature,
            timestamp,
        }
    }
}

/// One horizon's prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionPayload {
    /// Every prediction field
    #[serde(flatten)]
    pub prediction: Prediction,
    /// Horizon label, e.g. `15min`
    pub timeframe: String,
    /// Unix seconds
    pub timestamp: f64,
}

impl PredictionPayload {
    /// Wrap a prediction for `horizon_minutes`
    pub fn new(prediction: Prediction, horizon_minutes: u32, timestamp: f64) -> Self {
        Self {
            prediction,
            timeframe: format!("{}min", horizon_minutes),
            timestamp,
        }
    }
}

/// End-of-run summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsPayload<'a> {
    /// Reporting device
    pub device: &'a str,
    /// Agent version
    pub version: &'static str,
    /// Raw counters
    #[serde(flatten)]
    pub stats: &'a LoopStats,
    /// Mean published payload size in bytes
    pub payload_avg_bytes: f64,
    /// Messages published per minute of run time
    pub throughput_per_min: f64,
    /// Unix seconds
    pub timestamp: f64,
}

impl<'a> MetricsPayload<'a> {
    /// Summary of `stats` for `device`
    pub fn new(device: &'a str, stats: &'a LoopStats) -> Self {
        Self {
            device,
            version: stratus_core::VERSION,
            stats,
            payload_avg_bytes: stats.payload_avg_bytes(),
            throughput_per_min: stats.throughput_per_min(),
            timestamp: now_secs(),
        }
    }
}
