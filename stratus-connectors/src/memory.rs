//! In-process broker
//!
//! Keeps everything in memory: publishes are recorded, inbound messages are
//! whatever the paired [`MemoryBrokerHandle`] injects. Used for `--dry-run`
//! and as the test double for the telemetry loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{BrokerTransport, ConnectionStats, ConnectorError, ConnectorResult, InboundMessage, Link};

#[derive(Debug, Default)]
struct MemoryState {
    up: bool,
    refuse_connect: bool,
    fail_publish: bool,
    begins: u32,
    published: Vec<(String, Vec<u8>)>,
    inbound: VecDeque<InboundMessage>,
    subscriptions: Vec<String>,
    stats: ConnectionStats,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Broker transport backed by in-process queues
#[derive(Debug, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBroker {
    /// A broker that accepts connections and publishes
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for inspecting and steering this broker from elsewhere
    pub fn handle(&self) -> MemoryBrokerHandle {
        MemoryBrokerHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Link for MemoryBroker {
    fn begin(&mut self) -> ConnectorResult<()> {
        let mut state = lock(&self.state);
        state.begins += 1;
        if state.begins > 1 {
            state.stats.reconnections += 1;
        }
        if !state.refuse_connect {
            state.up = true;
        }
        Ok(())
    }

    fn is_up(&mut self) -> bool {
        lock(&self.state).up
    }

    fn disconnect(&mut self) -> ConnectorResult<()> {
        lock(&self.state).up = false;
        Ok(())
    }

    fn describe(&self) -> &str {
        "memory broker"
    }
}

impl BrokerTransport for MemoryBroker {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> ConnectorResult<()> {
        let mut state = lock(&self.state);
        let result = if !state.up {
            Err(ConnectorError::NotConnected)
        } else if state.fail_publish {
            Err(ConnectorError::Protocol("publish rejected".into()))
        } else {
            Ok(())
        };

        match result {
            Ok(()) => {
                state.stats.record_sent(payload.len());
                state.published.push((topic.to_string(), payload.to_vec()));
                Ok(())
            }
            Err(e) => {
                state.stats.record_failure(&e);
                Err(e)
            }
        }
    }

    fn subscribe(&mut self, topic: &str) -> ConnectorResult<()> {
        let mut state = lock(&self.state);
        if !state.subscriptions.iter().any(|t| t == topic) {
            state.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn poll_message(&mut self) -> Option<InboundMessage> {
        let mut state = lock(&self.state);
        let message = state.inbound.pop_front()?;
        state.stats.messages_received += 1;
        Some(message)
    }

    fn stats(&self) -> ConnectionStats {
        lock(&self.state).stats.clone()
    }
}

/// Shared view of a [`MemoryBroker`]
#[derive(Debug, Clone)]
pub struct MemoryBrokerHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBrokerHandle {
    /// Queue an inbound message
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        lock(&self.state)
            .inbound
            .push_back(InboundMessage::new(topic, payload));
    }

    /// Every accepted publish, oldest first
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.state).published.clone()
    }

    /// Accepted publishes on one topic
    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        lock(&self.state)
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Subscribed topic filters
    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.state).subscriptions.clone()
    }

    /// Inbound messages not yet drained
    pub fn pending_inbound(&self) -> usize {
        lock(&self.state).inbound.len()
    }

    /// Force the link state, simulating a drop or a recovery
    pub fn set_up(&self, up: bool) {
        lock(&self.state).up = up;
    }

    /// Make `begin()` leave the link down
    pub fn refuse_connect(&self, refuse: bool) {
        lock(&self.state).refuse_connect = refuse;
    }

    /// Make every publish fail
    pub fn fail_publish(&self, fail: bool) {
        lock(&self.state).fail_publish = fail;
    }

    /// Number of `begin()` calls so far
    pub fn begin_count(&self) -> u32 {
        lock(&self.state).begins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_requires_connection() {
        let mut broker = MemoryBroker::new();
        assert_eq!(broker.publish("t", b"x"), Err(ConnectorError::NotConnected));

        broker.begin().unwrap();
        broker.publish("t", b"x").unwrap();
        assert_eq!(broker.handle().published_on("t"), vec![b"x".to_vec()]);
        assert_eq!(broker.stats().messages_failed, 1);
    }

    #[test]
    fn inbound_drained_one_at_a_time() {
        let mut broker = MemoryBroker::new();
        let handle = broker.handle();
        handle.inject("control", b"ON");
        handle.inject("control", b"OFF");

        assert_eq!(broker.poll_message().unwrap().payload, b"ON");
        assert_eq!(handle.pending_inbound(), 1);
        assert_eq!(broker.poll_message().unwrap().payload, b"OFF");
        assert!(broker.poll_message().is_none());
        assert_eq!(broker.stats().messages_received, 2);
    }

    #[test]
    fn refused_connection_stays_down() {
        let mut broker = MemoryBroker::new();
        let handle = broker.handle();
        handle.refuse_connect(true);

        broker.begin().unwrap();
        assert!(!broker.is_up());
        broker.begin().unwrap();
        assert_eq!(handle.begin_count(), 2);
        assert_eq!(broker.stats().reconnections, 1);
    }

    #[test]
    fn publish_json_reports_size() {
        let mut broker = MemoryBroker::new();
        broker.begin().unwrap();
        let size = broker.publish_json("t", &serde_json::json!({"a": 1})).unwrap();
        assert_eq!(size, br#"{"a":1}"#.len());
    }

    #[test]
    fn subscriptions_deduplicated() {
        let mut broker = MemoryBroker::new();
        broker.subscribe("control").unwrap();
        broker.subscribe("control").unwrap();
        assert_eq!(broker.handle().subscriptions(), vec!["control".to_string()]);
    }
}
