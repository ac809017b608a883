//! MQTT broker transport
//!
//! Wraps the rumqttc synchronous client. rumqttc needs its event loop driven
//! continuously, so `begin()` hands the `Connection` to a pump thread that:
//!
//! - flips the shared `connected` flag on CONNACK / disconnect / error
//! - queues incoming publishes for `poll_message()`, dropping the oldest
//!   once `inbound_capacity` messages are waiting
//! - exits on the first connection error
//!
//! The pump never reconnects on its own. Reconnecting is the supervisor's
//! decision, made by calling `disconnect()` and `begin()` again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};

use crate::{BrokerTransport, ConnectionStats, ConnectorError, ConnectorResult, InboundMessage, Link};

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name or address
    pub host: String,
    /// Broker TCP port
    pub port: u16,
    /// MQTT client identifier
    pub client_id: String,
    /// Optional username
    pub username: Option<String>,
    /// Optional password (needs a username)
    pub password: Option<String>,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// Request/notification channel capacity
    pub channel_capacity: usize,
    /// QoS for publishes and subscriptions (0, 1 or 2)
    pub qos: u8,
    /// Inbound messages held for `poll_message()` before the oldest is dropped
    pub inbound_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "stratus-node".into(),
            username: None,
            password: None,
            keep_alive_secs: 60,
            channel_capacity: 10,
            qos: 0,
            inbound_capacity: 16,
        }
    }
}

impl MqttConfig {
    /// Check the settings before any connection attempt
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConnectorError::Config("broker host is empty".into()));
        }
        if self.port == 0 {
            return Err(ConnectorError::Config("broker port must be non-zero".into()));
        }
        if self.client_id.is_empty() {
            return Err(ConnectorError::Config("client id is empty".into()));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConnectorError::Config("password given without username".into()));
        }
        if self.keep_alive_secs < 5 {
            return Err(ConnectorError::Config("keep-alive must be at least 5 seconds".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConnectorError::Config("channel capacity must be positive".into()));
        }
        if self.inbound_capacity == 0 {
            return Err(ConnectorError::Config("inbound capacity must be positive".into()));
        }
        qos_level(self.qos)?;
        Ok(())
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        options.set_clean_session(true);

        if let Some(username) = &self.username {
            options.set_credentials(username.clone(), self.password.clone().unwrap_or_default());
        }
        options
    }
}

fn qos_level(qos: u8) -> ConnectorResult<QoS> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(ConnectorError::Config(format!("unsupported QoS level {}", other))),
    }
}

/// State shared between the transport and its pump thread
#[derive(Default)]
struct PumpShared {
    connected: AtomicBool,
    stopping: AtomicBool,
    inbound: Mutex<VecDeque<InboundMessage>>,
    dropped: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl PumpShared {
    fn inbound(&self) -> MutexGuard<'_, VecDeque<InboundMessage>> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `message`, evicting the oldest one when `capacity` are waiting
    ///
    /// Returns the evicted message.
    fn enqueue(&self, message: InboundMessage, capacity: usize) -> Option<InboundMessage> {
        let mut inbound = self.inbound();
        let evicted = if inbound.len() >= capacity {
            inbound.pop_front()
        } else {
            None
        };
        inbound.push_back(message);
        if evicted.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        evicted
    }

    fn set_error(&self, message: String) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }
}

/// MQTT session driven by a background event pump
pub struct MqttBroker {
    config: MqttConfig,
    qos: QoS,
    client: Option<Client>,
    pump: Arc<PumpShared>,
    subscriptions: Vec<String>,
    stats: ConnectionStats,
    attempts: u32,
    dropped_total: u64,
    label: String,
}

impl MqttBroker {
    /// Validate settings and build an unconnected transport
    pub fn new(config: MqttConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let qos = qos_level(config.qos)?;
        let label = format!("mqtt://{}:{}", config.host, config.port);

        Ok(Self {
            config,
            qos,
            client: None,
            pump: Arc::new(PumpShared::default()),
            subscriptions: Vec::new(),
            stats: ConnectionStats::default(),
            attempts: 0,
            dropped_total: 0,
            label,
        })
    }

    /// Active settings
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    /// Last error reported by the client or its pump
    pub fn last_error(&self) -> Option<String> {
        self.pump
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn spawn_pump(&self, mut connection: Connection) -> ConnectorResult<()> {
        let shared = Arc::clone(&self.pump);
        let label = self.label.clone();
        let capacity = self.config.inbound_capacity;

        thread::Builder::new()
            .name("mqtt-pump".into())
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            let accepted = ack.code == ConnectReturnCode::Success;
                            shared.connected.store(accepted, Ordering::SeqCst);
                            if accepted {
                                info!("Connected to {}", label);
                            } else {
                                warn!("{} refused connection: {:?}", label, ack.code);
                                shared.set_error(format!("connection refused: {:?}", ack.code));
                                break;
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                            if let Some(old) = shared.enqueue(message, capacity) {
                                warn!(
                                    "{} inbound queue full ({}), dropped message on {}",
                                    label, capacity, old.topic
                                );
                            }
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            shared.connected.store(false, Ordering::SeqCst);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            shared.connected.store(false, Ordering::SeqCst);
                            if !shared.stopping.load(Ordering::SeqCst) {
                                warn!("{} connection lost: {}", label, e);
                                shared.set_error(e.to_string());
                            }
                            break;
                        }
                    }

                    if shared.stopping.load(Ordering::SeqCst) {
                        break;
                    }
                }
                shared.connected.store(false, Ordering::SeqCst);
                debug!("MQTT pump for {} exiting", label);
            })
            .map(|_| ())
            .map_err(ConnectorError::from)
    }
}

impl Link for MqttBroker {
    fn begin(&mut self) -> ConnectorResult<()> {
        if self.client.is_some() {
            // Drop the previous session before starting another
            let _ = self.disconnect();
        }

        self.attempts += 1;
        if self.attempts > 1 {
            self.stats.reconnections += 1;
        }

        // Fresh pump state so a stale pump cannot flip the new flag
        self.dropped_total += self.pump.dropped.load(Ordering::Relaxed);
        self.pump = Arc::new(PumpShared::default());

        let (client, connection) = Client::new(self.config.options(), self.config.channel_capacity);
        for topic in &self.subscriptions {
            client
                .subscribe(topic.as_str(), self.qos)
                .map_err(|e| ConnectorError::Protocol(e.to_string()))?;
        }

        self.spawn_pump(connection)?;
        self.client = Some(client);
        debug!("Connecting to {} as {}", self.label, self.config.client_id);
        Ok(())
    }

    fn is_up(&mut self) -> bool {
        self.client.is_some() && self.pump.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&mut self) -> ConnectorResult<()> {
        self.pump.stopping.store(true, Ordering::SeqCst);
        self.pump.connected.store(false, Ordering::SeqCst);

        match self.client.take() {
            Some(client) => client
                .disconnect()
                .map_err(|e| ConnectorError::Protocol(e.to_string())),
            None => Ok(()),
        }
    }

    fn describe(&self) -> &str {
        &self.label
    }
}

impl BrokerTransport for MqttBroker {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> ConnectorResult<()> {
        let result = match (&self.client, self.pump.connected.load(Ordering::SeqCst)) {
            (Some(client), true) => client
                .publish(topic, self.qos, false, payload.to_vec())
                .map_err(|e| ConnectorError::Protocol(e.to_string())),
            _ => Err(ConnectorError::NotConnected),
        };

        match &result {
            Ok(()) => self.stats.record_sent(payload.len()),
            Err(e) => self.stats.record_failure(e),
        }
        result
    }

    fn subscribe(&mut self, topic: &str) -> ConnectorResult<()> {
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }

        match &self.client {
            Some(client) => client
                .subscribe(topic, self.qos)
                .map_err(|e| ConnectorError::Protocol(e.to_string())),
            // Sent on the next begin()
            None => Ok(()),
        }
    }

    fn poll_message(&mut self) -> Option<InboundMessage> {
        let message = self.pump.inbound().pop_front()?;
        self.stats.messages_received += 1;
        Some(message)
    }

    fn stats(&self) -> ConnectionStats {
        let mut stats = self.stats.clone();
        stats.messages_dropped += self.dropped_total + self.pump.dropped.load(Ordering::Relaxed);
        if stats.last_error.is_none() {
            stats.last_error = self.last_error();
        }
        stats
    }
}

impl Drop for MqttBroker {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn default_config_is_valid() {
        assert!(MqttConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejections() {
        let cases = [
            MqttConfig { host: " ".into(), ..Default::default() },
            MqttConfig { port: 0, ..Default::default() },
            MqttConfig { password: Some("secret".into()), ..Default::default() },
            MqttConfig { qos: 3, ..Default::default() },
            MqttConfig { keep_alive_secs: 1, ..Default::default() },
            MqttConfig { inbound_capacity: 0, ..Default::default() },
        ];
        for config in cases {
            assert!(matches!(MqttBroker::new(config), Err(ConnectorError::Config(_))));
        }
    }

    #[test]
    fn qos_mapping() {
        assert_eq!(qos_level(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_level(2).unwrap(), QoS::ExactlyOnce);
        assert!(qos_level(7).is_err());
    }

    #[test]
    fn publish_before_begin_fails() {
        let mut broker = MqttBroker::new(MqttConfig::default()).unwrap();
        assert!(!broker.is_up());
        assert_eq!(broker.publish("t", b"x"), Err(ConnectorError::NotConnected));
        assert_eq!(broker.stats().messages_failed, 1);
        assert!(broker.poll_message().is_none());
    }

    #[test]
    fn subscriptions_recorded_before_connect() {
        let mut broker = MqttBroker::new(MqttConfig::default()).unwrap();
        broker.subscribe("weather/control").unwrap();
        broker.subscribe("weather/control").unwrap();
        assert_eq!(broker.subscriptions, vec!["weather/control".to_string()]);
    }

    #[test]
    fn unreachable_broker_never_comes_up() {
        let config = MqttConfig {
            host: "127.0.0.1".into(),
            port: 1,
            ..Default::default()
        };
        let mut broker = MqttBroker::new(config).unwrap();
        broker.begin().unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while broker.last_error().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }

        assert!(!broker.is_up());
        assert!(broker.last_error().is_some());
        // Best-effort: the pump may already have dropped the request channel
        let _ = broker.disconnect();
        assert!(broker.client.is_none());
    }

    #[test]
    fn full_inbound_queue_drops_oldest() {
        let mut broker = MqttBroker::new(MqttConfig { inbound_capacity: 2, ..Default::default() }).unwrap();
        for payload in ["ON", "OFF", "BLINK"] {
            broker.pump.enqueue(InboundMessage::new("weather/control", payload), 2);
        }
        let evicted = broker.pump.enqueue(InboundMessage::new("weather/control", "ALERT"), 2);
        assert_eq!(evicted.map(|m| m.payload), Some(b"OFF".to_vec()));

        assert_eq!(broker.stats().messages_dropped, 2);
        let drained: Vec<_> = std::iter::from_fn(|| broker.poll_message()).collect();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].payload_str(), Some("BLINK"));
        assert_eq!(drained[1].payload_str(), Some("ALERT"));
        assert_eq!(broker.stats().messages_received, 2);
    }

    #[test]
    fn label_names_endpoint() {
        let broker = MqttBroker::new(MqttConfig::default()).unwrap();
        assert_eq!(broker.describe(), "mqtt://localhost:1883");
    }
}
