//! Agent configuration
//!
//! One JSON document, every field optional. Missing sections fall back to the
//! values the node shipped with, so an empty `{}` is a valid configuration
//! that talks to a broker on localhost.
//!
//! ```json
//! {
//!   "device_id": "greenhouse-1",
//!   "network": { "interface": "wlan0", "ssid": "lab" },
//!   "broker": { "host": "broker.local", "port": 1883, "client_id": "greenhouse-1" },
//!   "telemetry": { "publish_interval_secs": 5, "rich_payload": true },
//!   "comfort": { "enabled": true, "user": "alice" }
//! }
//! ```
//!
//! Secrets can stay out of the file: `STRATUS_NETWORK_PASSWORD`,
//! `STRATUS_BROKER_USERNAME` and `STRATUS_BROKER_PASSWORD` override the
//! corresponding fields after parsing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use stratus_connectors::{HostNetworkConfig, MqttConfig};
use stratus_core::constants::connectivity::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_BROKER_TIMEOUT_S,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_NETWORK_TIMEOUT_S, DEFAULT_POLL_INTERVAL_MS,
};
use stratus_core::constants::indicator::{DATA_SENT_FLASH_MS, SENSOR_READING_FLASH_MS};
use stratus_core::constants::time::{
    DEFAULT_HORIZONS_MIN, DEFAULT_PREDICTION_EVERY, DEFAULT_PUBLISH_INTERVAL_S,
};
use stratus_core::indicator::IndicatorConfig;
use stratus_core::PredictorConfig;
use stratus_ml::comfort::DEFAULT_THRESHOLD;

use crate::{AgentError, AgentResult};

/// Environment variable overriding `network.password`
pub const ENV_NETWORK_PASSWORD: &str = "STRATUS_NETWORK_PASSWORD";
/// Environment variable overriding `broker.username`
pub const ENV_BROKER_USERNAME: &str = "STRATUS_BROKER_USERNAME";
/// Environment variable overriding `broker.password`
pub const ENV_BROKER_PASSWORD: &str = "STRATUS_BROKER_PASSWORD";

/// Complete agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Name reported in payloads and logs
    pub device_id: String,
    /// Network attachment
    pub network: NetworkSettings,
    /// Broker session
    pub broker: BrokerSettings,
    /// Topic names
    pub topics: Topics,
    /// Pattern table and error-code timing
    pub indicator: IndicatorConfig,
    /// Loop cadence and payload options
    pub telemetry: TelemetrySettings,
    /// Trend predictor tuning
    pub predictor: PredictorConfig,
    /// Comfort classifier options
    pub comfort: ComfortSettings,
    /// Host hardware bindings
    pub hardware: HardwareSettings,
    /// User registry file
    pub registry_path: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device_id: "stratus-node".into(),
            network: NetworkSettings::default(),
            broker: BrokerSettings::default(),
            topics: Topics::default(),
            indicator: IndicatorConfig::default(),
            telemetry: TelemetrySettings::default(),
            predictor: PredictorConfig::default(),
            comfort: ComfortSettings::default(),
            hardware: HardwareSettings::default(),
            registry_path: PathBuf::from("users_reg.json"),
        }
    }
}

impl AgentConfig {
    /// Read, apply environment overrides and validate
    pub fn load(path: &Path) -> AgentResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| AgentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: AgentConfig =
            serde_json::from_str(&raw).map_err(|source| AgentError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides, validated
    pub fn from_env() -> AgentResult<Self> {
        let mut config = AgentConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace secrets with values from `lookup` where it has one
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(ENV_NETWORK_PASSWORD) {
            self.network.password = Some(password);
        }
        if let Some(username) = lookup(ENV_BROKER_USERNAME) {
            self.broker.mqtt.username = Some(username);
        }
        if let Some(password) = lookup(ENV_BROKER_PASSWORD) {
            self.broker.mqtt.password = Some(password);
        }
    }

    /// Reject settings the runtime cannot honor
    pub fn validate(&self) -> AgentResult<()> {
        if self.device_id.trim().is_empty() {
            return Err(AgentError::Config("device_id is empty".into()));
        }

        self.telemetry.validate()?;
        self.network.link.validate("network")?;
        self.broker.link.validate("broker")?;
        self.broker.mqtt.validate()?;
        self.indicator.patterns.validate()?;
        self.predictor.validate()?;
        self.topics.validate()?;

        if !(self.comfort.threshold > 0.0 && self.comfort.threshold < 1.0) {
            return Err(AgentError::Config("comfort.threshold must be in (0, 1)".into()));
        }
        if self.comfort.enabled && self.comfort.user.is_none() {
            return Err(AgentError::Config("comfort.enabled needs comfort.user".into()));
        }
        Ok(())
    }
}

/// Timeouts and retry policy for one link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// How long one connect attempt may take
    pub timeout_secs: u64,
    /// Reconnect attempts before giving up
    pub max_attempts: u32,
    /// Status poll interval while connecting
    pub poll_interval_ms: u64,
    /// First reconnect delay
    pub backoff_base_ms: u64,
    /// Reconnect delay cap
    pub backoff_max_ms: u64,
}

impl LinkSettings {
    /// Network defaults (20 s timeout)
    pub const fn network() -> Self {
        Self {
            timeout_secs: DEFAULT_NETWORK_TIMEOUT_S,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }

    /// Broker defaults (10 s timeout)
    pub const fn broker() -> Self {
        Self {
            timeout_secs: DEFAULT_BROKER_TIMEOUT_S,
            ..Self::network()
        }
    }

    /// Connect timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Status poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Delay before reconnect attempt `attempt` (1-based): base × 2^(attempt−1), capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }

    fn validate(&self, link: &str) -> AgentResult<()> {
        if self.timeout_secs == 0 {
            return Err(AgentError::Config(format!("{}.link.timeout_secs must be positive", link)));
        }
        if self.max_attempts == 0 {
            return Err(AgentError::Config(format!("{}.link.max_attempts must be positive", link)));
        }
        if self.poll_interval_ms == 0 {
            return Err(AgentError::Config(format!(
                "{}.link.poll_interval_ms must be positive",
                link
            )));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(AgentError::Config(format!(
                "{}.link.backoff_max_ms is below backoff_base_ms",
                link
            )));
        }
        Ok(())
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self::network()
    }
}

/// Network attachment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Interface and procfs/sysfs locations
    #[serde(flatten)]
    pub host: HostNetworkConfig,
    /// Network name, reported in status logs
    pub ssid: Option<String>,
    /// Network secret; normally supplied through the environment
    pub password: Option<String>,
    /// Retry policy
    pub link: LinkSettings,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            host: HostNetworkConfig::default(),
            ssid: None,
            password: None,
            link: LinkSettings::network(),
        }
    }
}

/// Broker session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// Client settings
    #[serde(flatten)]
    pub mqtt: MqttConfig,
    /// Retry policy
    pub link: LinkSettings,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            link: LinkSettings::broker(),
        }
    }
}

/// Topic names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    /// Temperature readings
    pub temperature: String,
    /// Pressure readings (bare number payload)
    pub pressure: String,
    /// Combined reading record
    pub aggregate: String,
    /// Prefix for prediction topics; horizon `h` goes to `<prefix>/<h>min`
    pub predictions: String,
    /// Inbound control commands
    pub control: String,
    /// Comfort classification results
    pub comfort: String,
    /// End-of-run metrics summary
    pub metrics: String,
    /// Reserved for encrypted payloads; nothing publishes here yet
    pub secure: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            temperature: "weather/temperature".into(),
            pressure: "weather/pressure".into(),
            aggregate: "weather/alldata".into(),
            predictions: "weather/predictions".into(),
            control: "weather/control".into(),
            comfort: "weather/comfort".into(),
            metrics: "weather/metrics".into(),
            secure: "weather/secure".into(),
        }
    }
}

impl Topics {
    /// Topic for a prediction horizon
    pub fn prediction_topic(&self, horizon_minutes: u32) -> String {
        format!("{}/{}min", self.predictions, horizon_minutes)
    }

    fn validate(&self) -> AgentResult<()> {
        let all = [
            ("temperature", &self.temperature),
            ("pressure", &self.pressure),
            ("aggregate", &self.aggregate),
            ("predictions", &self.predictions),
            ("control", &self.control),
            ("comfort", &self.comfort),
            ("metrics", &self.metrics),
            ("secure", &self.secure),
        ];
        for (name, topic) in all {
            if topic.is_empty() || topic.contains('#') || topic.contains('+') {
                return Err(AgentError::Config(format!("topics.{} is not a publishable topic", name)));
            }
        }
        Ok(())
    }
}

/// Loop cadence and payload options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Seconds between cycles
    pub publish_interval_secs: f64,
    /// Publish predictions every this many successful readings
    pub prediction_every: u32,
    /// Prediction horizons in minutes
    pub horizons_min: Vec<u32>,
    /// Attach prediction details to the temperature payload
    pub rich_payload: bool,
    /// Stop after this many seconds
    pub duration_secs: Option<u64>,
    /// Stop after this many cycles
    pub max_cycles: Option<u64>,
    /// Switch ALERT / COMFORTABLE / UNCOMFORTABLE on temperature bands
    pub temperature_alerts: bool,
    /// Upper comfort band edge (°C); above it is ALERT
    pub band_high: f32,
    /// Lower comfort band edge (°C); below it is UNCOMFORTABLE
    pub band_low: f32,
    /// Show SENSOR_READING / DATA_SENT flashes
    pub activity_flashes: bool,
    /// SENSOR_READING flash length
    pub sensor_flash_ms: u64,
    /// DATA_SENT flash length
    pub data_sent_flash_ms: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            publish_interval_secs: DEFAULT_PUBLISH_INTERVAL_S as f64,
            prediction_every: DEFAULT_PREDICTION_EVERY,
            horizons_min: DEFAULT_HORIZONS_MIN.to_vec(),
            rich_payload: false,
            duration_secs: None,
            max_cycles: None,
            temperature_alerts: true,
            band_high: 25.0,
            band_low: 18.0,
            activity_flashes: true,
            sensor_flash_ms: SENSOR_READING_FLASH_MS,
            data_sent_flash_ms: DATA_SENT_FLASH_MS,
        }
    }
}

impl TelemetrySettings {
    /// Cycle interval
    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs_f64(self.publish_interval_secs)
    }

    /// Wall-clock run bound
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> AgentResult<()> {
        if !(self.publish_interval_secs.is_finite() && self.publish_interval_secs > 0.0) {
            return Err(AgentError::Config("telemetry.publish_interval_secs must be positive".into()));
        }
        if self.prediction_every == 0 {
            return Err(AgentError::Config("telemetry.prediction_every must be at least 1".into()));
        }
        if self.horizons_min.is_empty() || self.horizons_min.contains(&0) {
            return Err(AgentError::Config(
                "telemetry.horizons_min needs at least one positive horizon".into(),
            ));
        }
        if !(self.band_low < self.band_high) {
            return Err(AgentError::Config("telemetry.band_low must be below band_high".into()));
        }
        Ok(())
    }
}

/// Comfort classifier options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComfortSettings {
    /// Classify every reading and drive the comfort lamp
    pub enabled: bool,
    /// Registered user whose profile is used
    pub user: Option<String>,
    /// Decision threshold
    pub threshold: f32,
}

impl Default for ComfortSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            user: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Host hardware bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareSettings {
    /// sysfs LED class directory
    pub leds_root: PathBuf,
    /// Status LED name under `leds_root`
    pub status_led: Option<String>,
    /// Comfort lamp green LED name
    pub green_led: Option<String>,
    /// Comfort lamp red LED name
    pub red_led: Option<String>,
    /// IIO device directory of the barometer
    pub iio_device: Option<PathBuf>,
    /// Sensor model reported in the aggregate payload
    pub sensor_name: String,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            leds_root: PathBuf::from("/sys/class/leds"),
            status_led: None,
            green_led: None,
            red_led: None,
            iio_device: None,
            sensor_name: "BMP280".into(),
        }
    }
}
