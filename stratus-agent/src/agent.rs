//! Startup, run and shutdown sequencing
//!
//! 1. Build the status indicator (sysfs LED or log output)
//! 2. Bring up network, then broker
//! 3. Run the telemetry loop until stopped or bounded
//! 4. Tear down broker, network and indicator, whatever happened before
//!
//! Setup failures surface before the loop starts; teardown always completes.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{error, info};
use stratus_connectors::{BrokerTransport, HostNetwork, MemoryBroker, MqttBroker, NetworkTransport};
use stratus_core::{Sensor, StatusIndicator};
use stratus_ml::{ComfortAssessment, ComfortClassifier, ComfortProfile};

use crate::config::AgentConfig;
use crate::hardware::{IioBarometer, LogOutput, OfflineNetwork, SimulatedSensor, SysfsLed};
use crate::registry::UserRegistry;
use crate::supervisor::ConnectivitySupervisor;
use crate::telemetry::{BoxedOutput, ComfortStage, LoopStats, TelemetryLoop};
use crate::{AgentError, AgentResult};

/// How `Agent::run` picks its collaborators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Synthetic sensor and log-only outputs
    pub simulate: bool,
    /// In-memory broker and an always-up network
    pub dry_run: bool,
}

/// The configured node
pub struct Agent {
    config: AgentConfig,
    stop: Arc<AtomicBool>,
}

impl Agent {
    /// Agent for a validated configuration
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Flag that ends the loop between cycles once set
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Pick collaborators per `options` and run
    pub fn run(&self, options: RunOptions) -> AgentResult<LoopStats> {
        if options.simulate {
            info!("Using simulated sensor");
            self.run_with_sensor(SimulatedSensor::default(), options)
        } else {
            let device = self.config.hardware.iio_device.as_deref().ok_or_else(|| {
                AgentError::Setup("hardware.iio_device is not set (use --simulate without a sensor)".into())
            })?;
            let sensor = IioBarometer::open(device, &self.config.hardware.sensor_name)?;
            self.run_with_sensor(sensor, options)
        }
    }

    fn run_with_sensor<S: Sensor>(&self, sensor: S, options: RunOptions) -> AgentResult<LoopStats> {
        if options.dry_run {
            info!("Dry run: publishing to the in-memory broker");
            return self.run_with(sensor, OfflineNetwork, MemoryBroker::new(), options.simulate);
        }

        let network = HostNetwork::new(self.config.network.host.clone())?;
        let broker = MqttBroker::new(self.config.broker.mqtt.clone())?;
        self.run_with(sensor, network, broker, options.simulate)
    }

    /// Run with explicit collaborators
    ///
    /// `simulate` swaps every physical output for a log-only one.
    pub fn run_with<S, N, B>(&self, mut sensor: S, network: N, broker: B, simulate: bool) -> AgentResult<LoopStats>
    where
        S: Sensor,
        N: NetworkTransport,
        B: BrokerTransport,
    {
        let indicator = self.build_indicator(simulate)?;
        let result = self.run_session(&mut sensor, network, broker, &indicator, simulate);
        indicator.shutdown();

        if let Err(e) = &result {
            error!("Agent stopped: {}", e);
        }
        result
    }

    fn run_session<S, N, B>(
        &self,
        sensor: &mut S,
        network: N,
        broker: B,
        indicator: &StatusIndicator,
        simulate: bool,
    ) -> AgentResult<LoopStats>
    where
        S: Sensor,
        N: NetworkTransport,
        B: BrokerTransport,
    {
        let mut telemetry = TelemetryLoop::from_config(&self.config)?.with_indicator(indicator.clone());
        if let Some(stage) = self.build_comfort(simulate)? {
            telemetry = telemetry.with_comfort(stage);
        }

        let mut links = ConnectivitySupervisor::new(
            network,
            self.config.network.link,
            broker,
            self.config.broker.link,
            Some(indicator.clone()),
        );
        if let Some(ssid) = &self.config.network.ssid {
            info!("Joining {}", ssid);
        }
        links.connect_all()?;

        let result = telemetry.run(sensor, &mut links.broker, &self.stop);
        links.disconnect_all();
        result
    }

    /// Status indicator on the configured LED, or a log-only output
    pub fn build_indicator(&self, simulate: bool) -> AgentResult<StatusIndicator> {
        let output = self.output(self.config.hardware.status_led.as_deref(), "status", simulate)?;
        Ok(StatusIndicator::with_config(output, self.config.indicator.clone())?)
    }

    /// Comfort stage for the configured user, when enabled
    pub fn build_comfort(&self, simulate: bool) -> AgentResult<Option<ComfortStage>> {
        let comfort = &self.config.comfort;
        if !comfort.enabled {
            return Ok(None);
        }
        let user = comfort
            .user
            .as_deref()
            .ok_or_else(|| AgentError::Config("comfort.enabled needs comfort.user".into()))?;

        let profile = UserRegistry::load(&self.config.registry_path)?.require(user)?;
        let classifier = ComfortClassifier::with_threshold(comfort.threshold)?;
        let mut stage = ComfortStage::new(user, profile, classifier);

        let hardware = &self.config.hardware;
        if hardware.green_led.is_some() || hardware.red_led.is_some() || simulate {
            let green = self.output(hardware.green_led.as_deref(), "comfort-green", simulate)?;
            let red = self.output(hardware.red_led.as_deref(), "comfort-red", simulate)?;
            stage = stage.with_lamp(green, red);
        }
        info!("Comfort classification enabled for {}", user);
        Ok(Some(stage))
    }

    fn output(&self, led: Option<&str>, label: &str, simulate: bool) -> AgentResult<BoxedOutput> {
        match led {
            Some(name) if !simulate => {
                let root: &Path = &self.config.hardware.leds_root;
                Ok(Box::new(SysfsLed::open(root, name)?))
            }
            _ => Ok(Box::new(LogOutput::new(label))),
        }
    }

    /// Add or replace a user in the registry file
    pub fn register_user(&self, name: &str, age: u8, sex: u8) -> AgentResult<ComfortProfile> {
        let mut registry = UserRegistry::load(&self.config.registry_path)?;
        let profile = registry.register(name, age, sex)?;
        registry.save()?;
        Ok(profile)
    }

    /// Classify `temperature` for a registered user
    pub fn classify_user(&self, name: &str, temperature: f32) -> AgentResult<ComfortAssessment> {
        let profile = UserRegistry::load(&self.config.registry_path)?.require(name)?;
        let classifier = ComfortClassifier::with_threshold(self.config.comfort.threshold)?;
        Ok(classifier.classify(&profile, temperature)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn agent_in(dir: &TempDir) -> Agent {
        let mut config = AgentConfig::default();
        config.registry_path = dir.path().join("users_reg.json");
        Agent::new(config)
    }

    #[test]
    fn register_then_classify() {
        let dir = TempDir::new().unwrap();
        let agent = agent_in(&dir);
        agent.register_user("alice", 3, 1).unwrap();

        let assessment = agent.classify_user("alice", 30.0).unwrap();
        assert!(assessment.is_comfortable());
        assert!(matches!(agent.classify_user("bob", 30.0), Err(AgentError::Registry(_))));
    }

    #[test]
    fn hardware_run_needs_a_device() {
        let dir = TempDir::new().unwrap();
        let agent = agent_in(&dir);
        let err = agent.run(RunOptions::default()).unwrap_err();
        assert!(matches!(err, AgentError::Setup(_)));
    }

    #[test]
    fn comfort_stage_requires_registered_user() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent_in(&dir);
        agent.config.comfort.enabled = true;
        agent.config.comfort.user = Some("carol".into());
        assert!(matches!(agent.build_comfort(true), Err(AgentError::Registry(_))));

        agent.register_user("carol", 2, 0).unwrap();
        let stage = agent.build_comfort(true).unwrap().unwrap();
        assert!(stage.last().is_none());
    }

    #[test]
    fn missing_status_led_fails_setup() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent_in(&dir);
        agent.config.hardware.leds_root = dir.path().to_path_buf();
        agent.config.hardware.status_led = Some("led0".into());
        assert!(agent.build_indicator(false).is_err());
        assert!(agent.build_indicator(true).is_ok());
    }
}
