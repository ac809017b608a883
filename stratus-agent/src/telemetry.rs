//! The telemetry loop
//!
//! One thread, one cycle at a time:
//!
//! ```text
//! ┌────────────┐   miss   ┌──────────────┐
//! │ read sensor├─────────▶│ count error  ├──────────────────────┐
//! └─────┬──────┘          └──────────────┘                      │
//!       │ ok                                                    ▼
//!       ▼                                                ┌─────────────┐
//! feed predictor ─▶ comfort / band ─▶ publish readings ─▶│ drain one   │─▶ sleep
//!                                     (+ predictions     │ control msg │
//!                                      every Kth read)   └─────────────┘
//! ```
//!
//! A cycle never overlaps the next. A failed read or publish is logged and
//! counted; only an exhausted broker reconnect budget ends the loop early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;
use stratus_connectors::BrokerTransport;
use stratus_core::constants::time::SLEEP_SLICE_MS;
use stratus_core::{
    IndicatorOutput, Prediction, PredictorConfig, Sensor, StatusIndicator, TrendPredictor,
};
use stratus_ml::{ComfortAssessment, ComfortClassifier, ComfortLamp, ComfortProfile};

use crate::commands::ControlCommand;
use crate::config::{AgentConfig, TelemetrySettings, Topics};
use crate::payload::{
    now_secs, AggregatePayload, ComfortPayload, MetricsPayload, PredictionDetails,
    PredictionPayload, TemperaturePayload,
};
use crate::supervisor::LinkSupervisor;
use crate::{AgentError, AgentResult};

const SENSOR_READING_MODE: &str = "SENSOR_READING";
const DATA_SENT_MODE: &str = "DATA_SENT";

/// Lamp outputs chosen at runtime
pub type BoxedOutput = Box<dyn IndicatorOutput + Send>;

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoopStats {
    /// Cycles started
    pub cycles: u64,
    /// Successful sensor reads
    pub readings: u64,
    /// Failed sensor reads
    pub read_errors: u64,
    /// Publishes accepted by the transport
    pub published: u64,
    /// Publishes the transport refused
    pub publish_failures: u64,
    /// Prediction sets published
    pub prediction_rounds: u64,
    /// Control messages applied to the indicator
    pub commands_applied: u64,
    /// Control messages dropped
    pub commands_dropped: u64,
    /// Bytes across accepted publishes
    pub bytes_published: u64,
    /// Smallest accepted payload
    pub payload_min_bytes: Option<usize>,
    /// Largest accepted payload
    pub payload_max_bytes: usize,
    /// Wall-clock run time
    pub elapsed_secs: f64,
}

impl LoopStats {
    fn record_payload(&mut self, bytes: usize) {
        self.published += 1;
        self.bytes_published += bytes as u64;
        self.payload_min_bytes = Some(self.payload_min_bytes.map_or(bytes, |min| min.min(bytes)));
        self.payload_max_bytes = self.payload_max_bytes.max(bytes);
    }

    /// Mean accepted payload size
    pub fn payload_avg_bytes(&self) -> f64 {
        if self.published == 0 {
            0.0
        } else {
            self.bytes_published as f64 / self.published as f64
        }
    }

    /// Accepted publishes per minute of run time
    pub fn throughput_per_min(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.published as f64 * 60.0 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Temperature band shown on the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    High,
    Normal,
    Low,
}

impl Band {
    fn mode(self) -> &'static str {
        match self {
            Band::High => "ALERT",
            Band::Normal => "COMFORTABLE",
            Band::Low => "UNCOMFORTABLE",
        }
    }
}

/// Per-reading comfort classification for one registered user
pub struct ComfortStage {
    user: String,
    profile: ComfortProfile,
    classifier: ComfortClassifier,
    lamp: Option<ComfortLamp<BoxedOutput, BoxedOutput>>,
    last: Option<ComfortAssessment>,
}

impl ComfortStage {
    /// Classify readings for `user`
    pub fn new(user: impl Into<String>, profile: ComfortProfile, classifier: ComfortClassifier) -> Self {
        Self {
            user: user.into(),
            profile,
            classifier,
            lamp: None,
            last: None,
        }
    }

    /// Drive a green/red lamp with each result
    pub fn with_lamp(mut self, green: BoxedOutput, red: BoxedOutput) -> Self {
        self.lamp = Some(ComfortLamp::new(green, red));
        self
    }

    /// Most recent assessment
    pub fn last(&self) -> Option<&ComfortAssessment> {
        self.last.as_ref()
    }
}

/// Sequential read → predict → publish → drain loop
pub struct TelemetryLoop {
    device_id: String,
    settings: TelemetrySettings,
    topics: Topics,
    predictor: TrendPredictor,
    indicator: Option<StatusIndicator>,
    comfort: Option<ComfortStage>,
    band: Option<Band>,
    message_id: u64,
    stats: LoopStats,
}

impl TelemetryLoop {
    /// Build a loop with no indicator and no comfort stage
    pub fn new(
        device_id: impl Into<String>,
        settings: TelemetrySettings,
        topics: Topics,
        predictor: PredictorConfig,
    ) -> AgentResult<Self> {
        Ok(Self {
            device_id: device_id.into(),
            settings,
            topics,
            predictor: TrendPredictor::new(predictor)?,
            indicator: None,
            comfort: None,
            band: None,
            message_id: 0,
            stats: LoopStats::default(),
        })
    }

    /// Build from the relevant configuration sections
    pub fn from_config(config: &AgentConfig) -> AgentResult<Self> {
        Self::new(
            config.device_id.clone(),
            config.telemetry.clone(),
            config.topics.clone(),
            config.predictor,
        )
    }

    /// Report activity and bands on `indicator`
    pub fn with_indicator(mut self, indicator: StatusIndicator) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Classify each reading; takes the indicator over from the band alerts
    pub fn with_comfort(mut self, comfort: ComfortStage) -> Self {
        self.comfort = Some(comfort);
        self
    }

    /// Counters so far
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// The predictor fed by this loop
    pub fn predictor(&self) -> &TrendPredictor {
        &self.predictor
    }

    /// Comfort stage, when enabled
    pub fn comfort(&self) -> Option<&ComfortStage> {
        self.comfort.as_ref()
    }

    /// Run until `stop` is set, the cycle cap or the duration bound is hit
    ///
    /// # Errors
    ///
    /// - `Setup` when the sensor is not connected; no cycle runs
    /// - `AttemptsExhausted` when the broker could not be brought back
    pub fn run<S, B>(
        &mut self,
        sensor: &mut S,
        broker: &mut LinkSupervisor<B>,
        stop: &AtomicBool,
    ) -> AgentResult<LoopStats>
    where
        S: Sensor,
        B: BrokerTransport,
    {
        if !sensor.is_connected() {
            return Err(AgentError::Setup(format!("sensor {} not connected", sensor.describe())));
        }

        if let Err(e) = broker.link_mut().subscribe(&self.topics.control) {
            warn!("Subscribing to {} failed: {}", self.topics.control, e);
        }

        let interval = self.settings.publish_interval();
        let deadline = self.settings.duration().map(|d| Instant::now() + d);
        let started = Instant::now();
        info!(
            "Telemetry loop started (interval {:.1}s, predictions every {} readings)",
            interval.as_secs_f32(),
            self.settings.prediction_every
        );

        let outcome = loop {
            if self.should_stop(stop, deadline) {
                break Ok(());
            }

            let cycle_started = Instant::now();
            if let Err(e) = self.step(sensor, broker) {
                break Err(e);
            }

            if self.should_stop(stop, deadline) {
                break Ok(());
            }
            let wake = cycle_started + interval;
            sleep_until(wake.min(deadline.unwrap_or(wake)), stop);
        };

        self.stats.elapsed_secs = started.elapsed().as_secs_f64();
        self.publish_metrics(broker.link_mut());
        info!(
            "Telemetry loop finished: {} cycles, {} readings, {} read errors, {} published",
            self.stats.cycles, self.stats.readings, self.stats.read_errors, self.stats.published
        );

        outcome.map(|()| self.stats.clone())
    }

    fn should_stop(&self, stop: &AtomicBool, deadline: Option<Instant>) -> bool {
        if stop.load(Ordering::SeqCst) {
            info!("Stop requested");
            return true;
        }
        if matches!(self.settings.max_cycles, Some(max) if self.stats.cycles >= max) {
            return true;
        }
        matches!(deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// One cycle
    pub fn step<S, B>(&mut self, sensor: &mut S, broker: &mut LinkSupervisor<B>) -> AgentResult<()>
    where
        S: Sensor,
        B: BrokerTransport,
    {
        self.stats.cycles += 1;

        if !broker.is_connected() {
            match broker.try_reconnect() {
                Ok(()) => {}
                Err(e @ AgentError::AttemptsExhausted { .. }) => return Err(e),
                Err(e) => warn!("Broker still down: {}", e),
            }
        }

        let reading = sensor.read();
        match reading.temperature {
            Some(temperature) if self.predictor.add_reading(temperature).is_ok() => {
                self.handle_reading(temperature, reading.pressure, sensor.describe(), broker.link_mut());
            }
            _ => {
                self.stats.read_errors += 1;
                warn!("Sensor read failed ({} so far)", self.stats.read_errors);
            }
        }

        self.drain_control(broker.link_mut());
        Ok(())
    }

    fn handle_reading<B: BrokerTransport>(
        &mut self,
        temperature: f32,
        pressure: Option<f32>,
        sensor: &str,
        broker: &mut B,
    ) {
        self.stats.readings += 1;
        self.message_id += 1;
        self.flash(SENSOR_READING_MODE, self.settings.sensor_flash_ms);

        let timestamp = now_secs();
        if self.comfort.is_some() {
            self.classify(temperature, timestamp, broker);
        } else if self.settings.temperature_alerts {
            self.update_band(temperature);
        }

        let details = if self.settings.rich_payload {
            let horizon = self.settings.horizons_min.first().copied().unwrap_or(5);
            Some(PredictionDetails::from(&self.predictor.predict(horizon as f32)))
        } else {
            None
        };

        let published_before = self.stats.published;
        let topics = self.topics.clone();
        self.publish(
            broker,
            &topics.temperature,
            &TemperaturePayload { id: self.message_id, temperature, timestamp, details },
        );
        if let Some(pressure) = pressure {
            self.publish(broker, &topics.pressure, &pressure);
        }
        self.publish(
            broker,
            &topics.aggregate,
            &AggregatePayload { temperature, pressure, reading: self.stats.readings, timestamp, sensor },
        );

        if self.stats.readings % u64::from(self.settings.prediction_every) == 0 {
            self.publish_predictions(broker, timestamp);
        }

        if self.stats.published > published_before {
            self.flash(DATA_SENT_MODE, self.settings.data_sent_flash_ms);
        }
    }

    fn classify<B: BrokerTransport>(&mut self, temperature: f32, timestamp: f64, broker: &mut B) {
        let Some(stage) = self.comfort.as_mut() else {
            return;
        };

        let assessment = match stage.classifier.classify(&stage.profile, temperature) {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!("Comfort classification failed: {}", e);
                return;
            }
        };

        if let Some(lamp) = stage.lamp.as_mut() {
            lamp.show(Some(&assessment));
        }

        let changed = stage.last.map(|prev| prev.label) != Some(assessment.label);
        stage.last = Some(assessment);
        if changed {
            debug!("Comfort for {} -> {}", stage.user, assessment.label.as_str());
            if let Some(indicator) = &self.indicator {
                indicator.set_mode(assessment.label.as_str(), None);
            }
        }

        let payload = ComfortPayload::new(&stage.user, &assessment, temperature, timestamp);
        let topic = self.topics.comfort.clone();
        match serde_json::to_vec(&payload) {
            Ok(bytes) => self.publish_bytes(broker, &topic, &bytes),
            Err(e) => warn!("Encoding comfort payload failed: {}", e),
        }
    }

    fn update_band(&mut self, temperature: f32) {
        let band = if temperature > self.settings.band_high {
            Band::High
        } else if temperature < self.settings.band_low {
            Band::Low
        } else {
            Band::Normal
        };
        if self.band == Some(band) {
            return;
        }
        if let Some(indicator) = &self.indicator {
            if indicator.set_mode(band.mode(), None) {
                self.band = Some(band);
            }
        }
    }

    fn publish_predictions<B: BrokerTransport>(&mut self, broker: &mut B, timestamp: f64) {
        let horizons = self.settings.horizons_min.clone();
        let predictions: Vec<(u32, Prediction)> = horizons
            .iter()
            .map(|&h| (h, self.predictor.predict(h as f32)))
            .collect();

        for (horizon, prediction) in predictions {
            debug!(
                "{}min: {:.1} ({}, confidence {:.2})",
                horizon, prediction.predicted, prediction.trend, prediction.confidence
            );
            let topic = self.topics.prediction_topic(horizon);
            self.publish(broker, &topic, &PredictionPayload::new(prediction, horizon, timestamp));
        }
        self.stats.prediction_rounds += 1;
    }

    fn drain_control<B: BrokerTransport>(&mut self, broker: &mut B) {
        let Some(message) = broker.poll_message() else {
            return;
        };

        if message.topic != self.topics.control {
            debug!("Ignoring message on {}", message.topic);
            self.stats.commands_dropped += 1;
            return;
        }

        let Some(indicator) = &self.indicator else {
            debug!("No indicator, dropping control message");
            self.stats.commands_dropped += 1;
            return;
        };

        match ControlCommand::from_message(&message, indicator.patterns()) {
            Ok(command) => {
                if command.apply(indicator) {
                    info!("Applied control command {:?}", command);
                    // Holds until the temperature leaves the current band
                    self.stats.commands_applied += 1;
                } else {
                    self.stats.commands_dropped += 1;
                }
            }
            Err(rejection) => {
                warn!("Dropping control message: {}", rejection);
                self.stats.commands_dropped += 1;
            }
        }
    }

    fn flash(&self, mode: &str, millis: u64) {
        if !self.settings.activity_flashes {
            return;
        }
        if let Some(indicator) = &self.indicator {
            indicator.set_mode(mode, Some(Duration::from_millis(millis)));
        }
    }

    fn publish<B: BrokerTransport, T: Serialize + ?Sized>(&mut self, broker: &mut B, topic: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.publish_bytes(broker, topic, &bytes),
            Err(e) => {
                self.stats.publish_failures += 1;
                warn!("Encoding payload for {} failed: {}", topic, e);
            }
        }
    }

    fn publish_bytes<B: BrokerTransport>(&mut self, broker: &mut B, topic: &str, payload: &[u8]) {
        match broker.publish(topic, payload) {
            Ok(()) => self.stats.record_payload(payload.len()),
            Err(e) => {
                self.stats.publish_failures += 1;
                warn!("Publish to {} failed: {}", topic, e);
            }
        }
    }

    fn publish_metrics<B: BrokerTransport>(&mut self, broker: &mut B) {
        let summary = MetricsPayload::new(&self.device_id, &self.stats);
        match serde_json::to_vec(&summary) {
            Ok(bytes) => {
                if let Err(e) = broker.publish(&self.topics.metrics, &bytes) {
                    debug!("Metrics summary not published: {}", e);
                }
            }
            Err(e) => debug!("Encoding metrics failed: {}", e),
        }
    }
}

/// Sleep in short slices so a stop request is honored promptly
fn sleep_until(wake: Instant, stop: &AtomicBool) {
    let slice = Duration::from_millis(SLEEP_SLICE_MS);
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= wake {
            return;
        }
        thread::sleep(slice.min(wake - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkSettings;
    use crate::supervisor::LinkModes;
    use stratus_connectors::{Link, MemoryBroker, MemoryBrokerHandle};
    use stratus_core::SensorReading;

    struct Scripted(Vec<SensorReading>);

    impl Sensor for Scripted {
        fn read(&mut self) -> SensorReading {
            if self.0.is_empty() {
                SensorReading::missed()
            } else {
                self.0.remove(0)
            }
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn broker() -> (LinkSupervisor<MemoryBroker>, MemoryBrokerHandle) {
        let mut memory = MemoryBroker::new();
        memory.begin().unwrap();
        let handle = memory.handle();
        (LinkSupervisor::new(memory, LinkSettings::broker(), LinkModes::broker()), handle)
    }

    fn quiet() -> TelemetrySettings {
        TelemetrySettings { activity_flashes: false, temperature_alerts: false, ..Default::default() }
    }

    fn telemetry(settings: TelemetrySettings) -> TelemetryLoop {
        TelemetryLoop::new("test-node", settings, Topics::default(), PredictorConfig::default()).unwrap()
    }

    #[test]
    fn read_failure_skips_publish_but_drains() {
        let (mut broker, handle) = broker();
        handle.inject("weather/control", b"ON");
        let mut sensor = Scripted(vec![SensorReading::missed()]);
        let mut lp = telemetry(quiet());

        lp.step(&mut sensor, &mut broker).unwrap();
        assert_eq!(lp.stats().read_errors, 1);
        assert_eq!(lp.stats().readings, 0);
        assert!(handle.published().is_empty());
        assert_eq!(handle.pending_inbound(), 0);
        // No indicator attached
        assert_eq!(lp.stats().commands_dropped, 1);
    }

    #[test]
    fn reading_publishes_three_topics() {
        let (mut broker, handle) = broker();
        let mut sensor = Scripted(vec![SensorReading::new(21.5, 1013.2)]);
        let mut lp = telemetry(quiet());

        lp.step(&mut sensor, &mut broker).unwrap();
        assert_eq!(handle.published_on("weather/temperature").len(), 1);
        assert_eq!(handle.published_on("weather/pressure"), vec![b"1013.2".to_vec()]);
        assert_eq!(handle.published_on("weather/alldata").len(), 1);
        assert_eq!(lp.stats().published, 3);
        assert_eq!(lp.predictor().len(), 1);
    }

    #[test]
    fn missing_pressure_skips_pressure_topic() {
        let (mut broker, handle) = broker();
        let reading = SensorReading { temperature: Some(20.0), pressure: None };
        let mut lp = telemetry(quiet());
        lp.step(&mut Scripted(vec![reading]), &mut broker).unwrap();
        assert!(handle.published_on("weather/pressure").is_empty());
        assert_eq!(handle.published_on("weather/alldata").len(), 1);
    }

    #[test]
    fn non_finite_reading_counts_as_error() {
        let (mut broker, handle) = broker();
        let mut lp = telemetry(quiet());
        lp.step(&mut Scripted(vec![SensorReading::new(f32::NAN, 1000.0)]), &mut broker).unwrap();
        assert_eq!(lp.stats().read_errors, 1);
        assert!(handle.published().is_empty());
    }

    #[test]
    fn publish_failures_counted() {
        let (mut broker, handle) = broker();
        handle.fail_publish(true);
        let mut lp = telemetry(quiet());
        lp.step(&mut Scripted(vec![SensorReading::new(21.0, 1000.0)]), &mut broker).unwrap();
        assert_eq!(lp.stats().publish_failures, 3);
        assert_eq!(lp.stats().readings, 1);
    }

    #[test]
    fn payload_size_stats() {
        let mut stats = LoopStats::default();
        stats.record_payload(10);
        stats.record_payload(30);
        stats.elapsed_secs = 30.0;
        assert_eq!(stats.payload_min_bytes, Some(10));
        assert_eq!(stats.payload_max_bytes, 30);
        assert_eq!(stats.payload_avg_bytes(), 20.0);
        assert_eq!(stats.throughput_per_min(), 4.0);
    }
}
