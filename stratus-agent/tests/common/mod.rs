//! Shared fixtures for the agent integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use stratus_agent::config::{LinkSettings, TelemetrySettings};
use stratus_agent::{LinkModes, LinkSupervisor};
use stratus_connectors::{MemoryBroker, MemoryBrokerHandle};
use stratus_core::{IndicatorOutput, PatternTable, Sensor, SensorReading, StatusIndicator};

/// Sensor that replays a fixed script, then misses forever
pub struct ScriptedSensor {
    readings: VecDeque<SensorReading>,
    pub connected: bool,
}

impl ScriptedSensor {
    pub fn new(readings: impl IntoIterator<Item = SensorReading>) -> Self {
        Self { readings: readings.into_iter().collect(), connected: true }
    }

    /// Temperatures only, constant pressure
    pub fn temperatures(values: &[f32]) -> Self {
        Self::new(values.iter().map(|&t| SensorReading::new(t, 1013.0)))
    }
}

impl Sensor for ScriptedSensor {
    fn read(&mut self) -> SensorReading {
        self.readings.pop_front().unwrap_or_else(SensorReading::missed)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn describe(&self) -> &str {
        "scripted"
    }
}

/// Indicator output that records every level it is driven to
#[derive(Clone, Default)]
pub struct RecordingOutput {
    events: Arc<Mutex<Vec<bool>>>,
}

impl RecordingOutput {
    pub fn events(&self) -> Vec<bool> {
        self.events.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<bool> {
        self.events().last().copied()
    }
}

impl IndicatorOutput for RecordingOutput {
    fn set(&mut self, on: bool) {
        self.events.lock().unwrap().push(on);
    }
}

/// Indicator with the shipped pattern table on a recording output
pub fn recording_indicator() -> (StatusIndicator, RecordingOutput) {
    let output = RecordingOutput::default();
    let indicator = StatusIndicator::new(output.clone(), PatternTable::with_defaults()).unwrap();
    (indicator, output)
}

/// Retry policy that keeps failing tests short
pub fn fast_link() -> LinkSettings {
    LinkSettings {
        timeout_secs: 1,
        max_attempts: 1,
        poll_interval_ms: 1,
        backoff_base_ms: 1,
        backoff_max_ms: 1,
    }
}

/// Connected in-memory broker under supervision
pub fn connected_broker() -> (LinkSupervisor<MemoryBroker>, MemoryBrokerHandle) {
    let broker = MemoryBroker::new();
    let handle = broker.handle();
    let mut supervisor = LinkSupervisor::new(broker, fast_link(), LinkModes::broker());
    assert!(supervisor.connect(std::time::Duration::from_secs(1)));
    (supervisor, handle)
}

/// Millisecond cadence, no activity flashes, no band alerts
pub fn quick_settings(cycles: u64) -> TelemetrySettings {
    TelemetrySettings {
        publish_interval_secs: 0.001,
        max_cycles: Some(cycles),
        activity_flashes: false,
        temperature_alerts: false,
        ..TelemetrySettings::default()
    }
}

pub fn json(payload: &[u8]) -> serde_json::Value {
    serde_json::from_slice(payload).unwrap()
}
