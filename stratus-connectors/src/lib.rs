//! Transports for Edge-to-Broker Communication
//!
//! ## Overview
//!
//! A Stratus node needs two links before it can report anything: the
//! network attachment (Wi-Fi on the reference hardware) and a persistent
//! publish/subscribe session with the broker. Both are modeled as a [`Link`]
//! with the same three-step lifecycle, so one supervisor can drive either:
//!
//! ```text
//! begin()  ──▶  is_up() polled until true or timeout  ──▶  disconnect()
//! ```
//!
//! `begin()` only starts the attempt and must return quickly. Whether and
//! when the link comes up is observed through `is_up()`.
//!
//! ## Transports
//!
//! | Type          | Trait              | Backing                                   |
//! |---------------|--------------------|-------------------------------------------|
//! | `MqttBroker`  | `BrokerTransport`  | rumqttc sync client + event pump thread   |
//! | `HostNetwork` | `NetworkTransport` | `/sys/class/net` and `/proc/net/wireless` |
//! | `MemoryBroker`| `BrokerTransport`  | in-process queues, for dry runs and tests |
//!
//! ## Delivery Semantics
//!
//! Publishing is fire-and-forget at QoS 0 by default: a publish that the
//! client accepted counts as sent. Inbound messages are queued by the
//! transport and drained one at a time by the telemetry loop with
//! `poll_message()`, which never blocks.
//!
//! ## Error Handling
//!
//! Every fallible transport call returns [`ConnectorResult`]. Teardown also
//! returns a result, but callers treat it as best-effort: the supervisor logs
//! and discards it so shutdown always completes.
//!
//! ## Example Usage
//!
//! ```rust
//! use stratus_connectors::{BrokerTransport, Link, MemoryBroker};
//!
//! let mut broker = MemoryBroker::new();
//! broker.begin()?;
//! assert!(broker.is_up());
//!
//! broker.publish("weather/temperature", b"21.5")?;
//! assert_eq!(broker.stats().messages_sent, 1);
//! # Ok::<(), stratus_connectors::ConnectorError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub mod memory;
pub mod network;

// Re-export common types
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBroker, MqttConfig};

pub use memory::{MemoryBroker, MemoryBrokerHandle};
pub use network::{HostNetwork, HostNetworkConfig};

use serde::Serialize;
use thiserror::Error;

/// Result type for transport operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Common connector errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConnectorError {
    /// Operation needs an established link
    #[error("Not connected")]
    NotConnected,

    /// Link did not come up in time
    #[error("Timeout")]
    Timeout,

    /// Broker or client protocol failure
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Rejected transport settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O failure (sysfs, procfs, sockets)
    #[error("I/O error: {0}")]
    Io(String),

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for ConnectorError {
    fn from(err: std::io::Error) -> Self {
        ConnectorError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Serialization(err.to_string())
    }
}

/// A connection with a begin / observe / tear down lifecycle
pub trait Link {
    /// Start a connection attempt. Must not block for the whole handshake.
    fn begin(&mut self) -> ConnectorResult<()>;

    /// Check if the link is currently established
    fn is_up(&mut self) -> bool;

    /// Tear the link down
    fn disconnect(&mut self) -> ConnectorResult<()>;

    /// Short name for logs
    fn describe(&self) -> &str;
}

/// Network attachment (Wi-Fi, Ethernet)
pub trait NetworkTransport: Link {
    /// Received signal strength in dBm, if the medium reports one
    fn rssi_dbm(&self) -> Option<i32>;

    /// Local address as text
    fn address(&self) -> Option<String>;
}

/// Publish/subscribe session with a broker
pub trait BrokerTransport: Link {
    /// Publish a payload to a topic
    fn publish(&mut self, topic: &str, payload: &[u8]) -> ConnectorResult<()>;

    /// Subscribe to a topic filter. Survives reconnects.
    fn subscribe(&mut self, topic: &str) -> ConnectorResult<()>;

    /// Take the oldest queued inbound message without blocking
    fn poll_message(&mut self) -> Option<InboundMessage>;

    /// Traffic counters
    fn stats(&self) -> ConnectionStats;

    /// Serialize `value` as compact JSON and publish it
    ///
    /// Returns the payload size in bytes.
    fn publish_json<T>(&mut self, topic: &str, value: &T) -> ConnectorResult<usize>
    where
        Self: Sized,
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(value)?;
        self.publish(topic, &payload)?;
        Ok(payload.len())
    }
}

impl<L: Link + ?Sized> Link for &mut L {
    fn begin(&mut self) -> ConnectorResult<()> {
        (**self).begin()
    }

    fn is_up(&mut self) -> bool {
        (**self).is_up()
    }

    fn disconnect(&mut self) -> ConnectorResult<()> {
        (**self).disconnect()
    }

    fn describe(&self) -> &str {
        (**self).describe()
    }
}

/// A message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic it arrived on
    pub topic: String,
    /// Raw payload
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Build a message
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as UTF-8, if it is valid UTF-8
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Connection statistics common to all transports
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages that failed to send
    pub messages_failed: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Total messages received
    pub messages_received: u64,
    /// Inbound messages discarded because the receive queue was full
    pub messages_dropped: u64,
    /// Number of connection attempts after the first
    pub reconnections: u32,
    /// Last error message
    pub last_error: Option<String>,
}

impl ConnectionStats {
    pub(crate) fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub(crate) fn record_failure(&mut self, err: &ConnectorError) {
        self.messages_failed += 1;
        self.last_error = Some(err.to_string());
    }
}
