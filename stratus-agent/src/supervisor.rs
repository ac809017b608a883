//! Connection lifecycle supervision
//!
//! Each link (network attachment, broker session) moves through
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──▶ Connected
//!                                 │
//!                                 └──timeout / begin error──▶ Failed
//! ```
//!
//! `connect` blocks the caller for at most the timeout, polling the link at a
//! fixed short interval. `reconnect` counts attempts; once the count passes
//! the configured cap the supervisor blinks the attempt count as an error code
//! and refuses further attempts until a manual `connect` succeeds.
//!
//! Indicator feedback is optional. Without an indicator every signalling call
//! is a no-op.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;
use stratus_connectors::{BrokerTransport, ConnectorError, Link, NetworkTransport};
use stratus_core::constants::connectivity::{
    CONNECTED_PATTERN_MS, FAILURE_PATTERN_MS, RSSI_CEILING_DBM, RSSI_FLOOR_DBM,
};
use stratus_core::StatusIndicator;

use crate::config::LinkSettings;
use crate::{AgentError, AgentResult};

/// Lifecycle state of one link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Never connected, or torn down
    #[default]
    Disconnected,
    /// Attempt in progress
    Connecting,
    /// Link reported up
    Connected,
    /// Last attempt timed out or errored
    Failed,
}

impl ConnectionState {
    /// Lowercase name for logs and payloads
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        }
    }
}

/// Indicator modes a supervisor requests during its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkModes {
    /// Shown for the whole connect attempt
    pub connecting: String,
    /// Shown briefly after success
    pub connected: String,
    /// Shown briefly after a failed attempt
    pub failure: String,
    /// How long `connected` stays on
    pub connected_hold: Duration,
    /// How long `failure` stays on
    pub failure_hold: Duration,
}

impl LinkModes {
    fn with_prefix(prefix: &str) -> Self {
        Self {
            connecting: format!("{}_CONNECTING", prefix),
            connected: format!("{}_CONNECTED", prefix),
            failure: "ERROR".into(),
            connected_hold: Duration::from_millis(CONNECTED_PATTERN_MS),
            failure_hold: Duration::from_millis(FAILURE_PATTERN_MS),
        }
    }

    /// WIFI_CONNECTING / WIFI_CONNECTED / ERROR
    pub fn network() -> Self {
        Self::with_prefix("WIFI")
    }

    /// BROKER_CONNECTING / BROKER_CONNECTED / ERROR
    pub fn broker() -> Self {
        Self::with_prefix("BROKER")
    }
}

/// Drives one [`Link`] through connect, reconnect and teardown
pub struct LinkSupervisor<L> {
    link: L,
    settings: LinkSettings,
    modes: LinkModes,
    indicator: Option<StatusIndicator>,
    state: ConnectionState,
    attempts: u32,
}

impl<L: Link> LinkSupervisor<L> {
    /// Supervise `link` with the given policy and no indicator
    pub fn new(link: L, settings: LinkSettings, modes: LinkModes) -> Self {
        Self {
            link,
            settings,
            modes,
            indicator: None,
            state: ConnectionState::Disconnected,
            attempts: 0,
        }
    }

    /// Attach an indicator for lifecycle feedback
    pub fn with_indicator(mut self, indicator: StatusIndicator) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts since the last successful connect
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Retry policy in force
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// The supervised link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// The supervised link, mutably
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Give the link back
    pub fn into_inner(self) -> L {
        self.link
    }

    /// Check if the link is up, downgrading the state when it dropped
    pub fn is_connected(&mut self) -> bool {
        let up = self.link.is_up();
        if !up && self.state == ConnectionState::Connected {
            warn!("{} dropped", self.link.describe());
            self.state = ConnectionState::Disconnected;
        }
        up
    }

    /// Connect within `timeout`; `false` on failure
    pub fn connect(&mut self, timeout: Duration) -> bool {
        match self.try_connect(timeout) {
            Ok(()) => true,
            Err(e) => {
                warn!("{} connect failed: {}", self.link.describe(), e);
                false
            }
        }
    }

    /// Connect within `timeout`
    ///
    /// A link that is already up is not restarted. On timeout the link is
    /// left as the platform left it; no teardown is forced.
    pub fn try_connect(&mut self, timeout: Duration) -> AgentResult<()> {
        info!("Connecting {}", self.link.describe());
        self.state = ConnectionState::Connecting;
        let connecting = self.modes.connecting.clone();
        self.signal(&connecting, None);

        if !self.link.is_up() {
            if let Err(e) = self.link.begin() {
                self.fail();
                return Err(e.into());
            }
        }

        let started = Instant::now();
        let poll = self.settings.poll_interval();
        loop {
            if self.link.is_up() {
                break;
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(
                    "{} not up after {:.1}s",
                    self.link.describe(),
                    elapsed.as_secs_f32()
                );
                self.fail();
                return Err(ConnectorError::Timeout.into());
            }
            thread::sleep(poll.min(timeout - elapsed));
        }

        info!(
            "{} connected in {:.1}s",
            self.link.describe(),
            started.elapsed().as_secs_f32()
        );
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        let (connected, hold) = (self.modes.connected.clone(), self.modes.connected_hold);
        self.signal(&connected, Some(hold));
        Ok(())
    }

    /// Next reconnect attempt; `false` on failure or once the cap is passed
    pub fn reconnect(&mut self) -> bool {
        match self.try_reconnect() {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Tear down, back off, then connect with the configured timeout
    ///
    /// # Errors
    ///
    /// `AttemptsExhausted` once more than `max_attempts` reconnects were
    /// requested without a successful connect in between. The attempt counter
    /// keeps counting; only a successful connect resets it.
    pub fn try_reconnect(&mut self) -> AgentResult<()> {
        self.attempts = self.attempts.saturating_add(1);

        if self.attempts > self.settings.max_attempts {
            self.state = ConnectionState::Failed;
            if let Some(indicator) = &self.indicator {
                indicator.indicate_error(self.attempts);
            }
            return Err(AgentError::AttemptsExhausted {
                link: self.link.describe().to_string(),
                attempts: self.attempts,
            });
        }

        info!(
            "Reconnecting {} (attempt {}/{})",
            self.link.describe(),
            self.attempts,
            self.settings.max_attempts
        );
        self.teardown();
        thread::sleep(self.settings.backoff(self.attempts));
        self.try_connect(self.settings.timeout())
    }

    /// Connect, then reconnect until success or the attempt cap
    pub fn establish(&mut self) -> AgentResult<()> {
        if self.try_connect(self.settings.timeout()).is_ok() {
            return Ok(());
        }
        loop {
            match self.try_reconnect() {
                Ok(()) => return Ok(()),
                Err(e @ AgentError::AttemptsExhausted { .. }) => return Err(e),
                Err(e) => debug!("{} attempt failed: {}", self.link.describe(), e),
            }
        }
    }

    /// Best-effort teardown; errors are logged and discarded
    pub fn disconnect(&mut self) {
        if let Some(indicator) = &self.indicator {
            indicator.solid_off();
        }
        self.teardown();
        info!("{} disconnected", self.link.describe());
    }

    fn teardown(&mut self) {
        if let Err(e) = self.link.disconnect() {
            debug!("Ignoring {} teardown error: {}", self.link.describe(), e);
        }
        self.state = ConnectionState::Disconnected;
    }

    fn fail(&mut self) {
        self.state = ConnectionState::Failed;
        let (failure, hold) = (self.modes.failure.clone(), self.modes.failure_hold);
        self.signal(&failure, Some(hold));
    }

    fn signal(&self, mode: &str, hold: Option<Duration>) {
        if let Some(indicator) = &self.indicator {
            indicator.set_mode(mode, hold);
        }
    }
}

impl<N: NetworkTransport> LinkSupervisor<N> {
    /// Snapshot of the network attachment
    pub fn network_info(&mut self) -> NetworkInfo {
        let connected = self.is_connected();
        let rssi = if connected { self.link.rssi_dbm() } else { None };
        NetworkInfo {
            connected,
            rssi,
            signal_percent: signal_percent(rssi),
            address: if connected { self.link.address() } else { None },
            attempts: self.attempts,
        }
    }
}

/// Network attachment details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    /// Link reported up
    pub connected: bool,
    /// Signal level in dBm, when the medium reports one
    pub rssi: Option<i32>,
    /// Signal level mapped onto 0–100
    pub signal_percent: u8,
    /// Local address
    pub address: Option<String>,
    /// Reconnect attempts since the last success
    pub attempts: u32,
}

/// Map dBm onto 0–100 %: −100 dBm and below is 0, −30 dBm and above is 100
pub fn signal_percent(rssi: Option<i32>) -> u8 {
    match rssi {
        None => 0,
        Some(dbm) if dbm >= RSSI_CEILING_DBM => 100,
        Some(dbm) if dbm <= RSSI_FLOOR_DBM => 0,
        Some(dbm) => {
            let span = RSSI_CEILING_DBM - RSSI_FLOOR_DBM;
            ((dbm - RSSI_FLOOR_DBM) * 100 / span) as u8
        }
    }
}

/// Network and broker supervisors brought up in order
pub struct ConnectivitySupervisor<N, B> {
    /// Network attachment
    pub network: LinkSupervisor<N>,
    /// Broker session
    pub broker: LinkSupervisor<B>,
}

impl<N: NetworkTransport, B: BrokerTransport> ConnectivitySupervisor<N, B> {
    /// Pair the two links, sharing one optional indicator
    pub fn new(
        network: N,
        network_settings: LinkSettings,
        broker: B,
        broker_settings: LinkSettings,
        indicator: Option<StatusIndicator>,
    ) -> Self {
        let mut network = LinkSupervisor::new(network, network_settings, LinkModes::network());
        let mut broker = LinkSupervisor::new(broker, broker_settings, LinkModes::broker());
        if let Some(indicator) = indicator {
            network = network.with_indicator(indicator.clone());
            broker = broker.with_indicator(indicator);
        }
        Self { network, broker }
    }

    /// Bring up the network, then the broker
    ///
    /// A broker failure tears the network back down before returning.
    pub fn connect_all(&mut self) -> AgentResult<()> {
        self.network.establish()?;

        let info = self.network.network_info();
        info!(
            "Network up: address {}, signal {}%",
            info.address.as_deref().unwrap_or("unknown"),
            info.signal_percent
        );

        if let Err(e) = self.broker.establish() {
            self.network.disconnect();
            return Err(e);
        }
        Ok(())
    }

    /// Broker first, then network; always completes
    pub fn disconnect_all(&mut self) {
        self.broker.disconnect();
        self.network.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_connectors::ConnectorResult;

    /// Comes up after a fixed number of `is_up` polls following `begin`
    struct ScriptedLink {
        polls_until_up: Option<u32>,
        polls: u32,
        begun: bool,
        begins: u32,
        disconnects: u32,
        fail_begin: bool,
    }

    impl ScriptedLink {
        fn up_after(polls: u32) -> Self {
            Self {
                polls_until_up: Some(polls),
                polls: 0,
                begun: false,
                begins: 0,
                disconnects: 0,
                fail_begin: false,
            }
        }

        fn never_up() -> Self {
            Self { polls_until_up: None, ..Self::up_after(0) }
        }
    }

    impl Link for ScriptedLink {
        fn begin(&mut self) -> ConnectorResult<()> {
            self.begins += 1;
            if self.fail_begin {
                return Err(ConnectorError::Io("radio off".into()));
            }
            self.begun = true;
            self.polls = 0;
            Ok(())
        }

        fn is_up(&mut self) -> bool {
            if !self.begun {
                return false;
            }
            self.polls += 1;
            matches!(self.polls_until_up, Some(n) if self.polls > n)
        }

        fn disconnect(&mut self) -> ConnectorResult<()> {
            self.disconnects += 1;
            self.begun = false;
            Err(ConnectorError::NotConnected)
        }

        fn describe(&self) -> &str {
            "scripted"
        }
    }

    fn fast() -> LinkSettings {
        LinkSettings {
            timeout_secs: 1,
            max_attempts: 2,
            poll_interval_ms: 1,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
        }
    }

    #[test]
    fn connect_polls_until_up() {
        let mut sup = LinkSupervisor::new(ScriptedLink::up_after(3), fast(), LinkModes::network());
        assert!(sup.connect(Duration::from_secs(1)));
        assert_eq!(sup.state(), ConnectionState::Connected);
        assert_eq!(sup.link().begins, 1);
    }

    #[test]
    fn connect_times_out_without_teardown() {
        let mut sup = LinkSupervisor::new(ScriptedLink::never_up(), fast(), LinkModes::network());
        let err = sup.try_connect(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, AgentError::Connector(ConnectorError::Timeout)));
        assert_eq!(sup.state(), ConnectionState::Failed);
        assert_eq!(sup.link().disconnects, 0);
    }

    #[test]
    fn begin_error_fails_attempt() {
        let mut link = ScriptedLink::up_after(0);
        link.fail_begin = true;
        let mut sup = LinkSupervisor::new(link, fast(), LinkModes::broker());
        assert!(!sup.connect(Duration::from_millis(20)));
        assert_eq!(sup.state(), ConnectionState::Failed);
    }

    #[test]
    fn reconnect_cap_is_terminal() {
        let mut sup = LinkSupervisor::new(ScriptedLink::never_up(), fast(), LinkModes::network());
        assert!(!sup.connect(Duration::from_millis(5)));

        // Each allowed attempt waits out the one-second timeout
        assert!(sup.try_reconnect().is_err());
        assert_eq!(sup.attempts(), 1);
        assert!(sup.try_reconnect().is_err());
        assert_eq!(sup.attempts(), 2);

        let exhausted = sup.try_reconnect().unwrap_err();
        assert!(matches!(exhausted, AgentError::AttemptsExhausted { attempts: 3, .. }));
        assert!(!sup.reconnect());
        assert_eq!(sup.attempts(), 4);
        assert_eq!(sup.state(), ConnectionState::Failed);
        assert_eq!(sup.link().disconnects, 2);
    }

    #[test]
    fn successful_connect_resets_attempts() {
        let mut sup = LinkSupervisor::new(ScriptedLink::up_after(1), fast(), LinkModes::network());
        sup.attempts = 1;
        assert!(sup.reconnect());
        assert_eq!(sup.attempts(), 0);
        assert_eq!(sup.link().disconnects, 1);
    }

    #[test]
    fn disconnect_swallows_errors() {
        let mut sup = LinkSupervisor::new(ScriptedLink::up_after(0), fast(), LinkModes::network());
        assert!(sup.connect(Duration::from_secs(1)));
        sup.disconnect();
        assert_eq!(sup.state(), ConnectionState::Disconnected);
        assert_eq!(sup.link().disconnects, 1);
    }

    #[test]
    fn dropped_link_downgrades_state() {
        let mut sup = LinkSupervisor::new(ScriptedLink::up_after(0), fast(), LinkModes::network());
        assert!(sup.connect(Duration::from_secs(1)));
        sup.link_mut().begun = false;
        assert!(!sup.is_connected());
        assert_eq!(sup.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn signal_percent_mapping() {
        assert_eq!(signal_percent(None), 0);
        assert_eq!(signal_percent(Some(-100)), 0);
        assert_eq!(signal_percent(Some(-120)), 0);
        assert_eq!(signal_percent(Some(-30)), 100);
        assert_eq!(signal_percent(Some(-20)), 100);
        assert_eq!(signal_percent(Some(-65)), 50);
        assert_eq!(signal_percent(Some(-56)), 62);
    }

    #[test]
    fn mode_names() {
        let net = LinkModes::network();
        assert_eq!(net.connecting, "WIFI_CONNECTING");
        assert_eq!(net.connected, "WIFI_CONNECTED");
        assert_eq!(LinkModes::broker().connecting, "BROKER_CONNECTING");
        assert_eq!(net.failure, "ERROR");
        assert_eq!(net.connected_hold, Duration::from_secs(3));
    }
}
