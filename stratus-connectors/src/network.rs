//! Host network link
//!
//! On a Linux gateway the OS owns the Wi-Fi association, so this link only
//! observes it: `operstate` from sysfs for up/down and the signal level from
//! `/proc/net/wireless`. `begin()` checks the interface exists and
//! `disconnect()` leaves the association alone.

use std::fs;
use std::net::UdpSocket;
use std::path::PathBuf;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{ConnectorError, ConnectorResult, Link, NetworkTransport};

/// Where to find the interface state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostNetworkConfig {
    /// Interface name, e.g. `wlan0`
    pub interface: String,
    /// sysfs directory holding one entry per interface
    pub sysfs_net: PathBuf,
    /// procfs wireless statistics file
    pub proc_wireless: PathBuf,
}

impl Default for HostNetworkConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".into(),
            sysfs_net: PathBuf::from("/sys/class/net"),
            proc_wireless: PathBuf::from("/proc/net/wireless"),
        }
    }
}

/// Network link backed by the host's interface state
#[derive(Debug)]
pub struct HostNetwork {
    config: HostNetworkConfig,
    label: String,
}

impl HostNetwork {
    /// Build a link for `config.interface`
    pub fn new(config: HostNetworkConfig) -> ConnectorResult<Self> {
        if config.interface.is_empty() || config.interface.contains('/') {
            return Err(ConnectorError::Config(format!(
                "invalid interface name {:?}",
                config.interface
            )));
        }
        let label = format!("network {}", config.interface);
        Ok(Self { config, label })
    }

    fn interface_dir(&self) -> PathBuf {
        self.config.sysfs_net.join(&self.config.interface)
    }

    fn operstate(&self) -> ConnectorResult<String> {
        let raw = fs::read_to_string(self.interface_dir().join("operstate"))?;
        Ok(raw.trim().to_string())
    }
}

impl Link for HostNetwork {
    fn begin(&mut self) -> ConnectorResult<()> {
        if !self.interface_dir().is_dir() {
            return Err(ConnectorError::Config(format!(
                "interface {} not found",
                self.config.interface
            )));
        }
        debug!("Watching {} for link state", self.config.interface);
        Ok(())
    }

    fn is_up(&mut self) -> bool {
        matches!(self.operstate().as_deref(), Ok("up"))
    }

    fn disconnect(&mut self) -> ConnectorResult<()> {
        debug!("{} association is managed by the host, leaving it up", self.config.interface);
        Ok(())
    }

    fn describe(&self) -> &str {
        &self.label
    }
}

impl NetworkTransport for HostNetwork {
    fn rssi_dbm(&self) -> Option<i32> {
        let table = fs::read_to_string(&self.config.proc_wireless).ok()?;
        parse_wireless_level(&table, &self.config.interface)
    }

    fn address(&self) -> Option<String> {
        // Routing lookup only; a UDP connect sends no packets
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("192.0.2.1:9").ok()?;
        socket.local_addr().ok().map(|addr| addr.ip().to_string())
    }
}

/// Signal level (dBm) for `interface` from a `/proc/net/wireless` table
///
/// ```text
/// Inter-| sta-|   Quality        |   Discarded packets
///  face | tus | link level noise |  nwid  crypt   frag
///  wlan0: 0000   54.  -56.  -256        0      0      0
/// ```
pub fn parse_wireless_level(table: &str, interface: &str) -> Option<i32> {
    table.lines().skip(2).find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != interface {
            return None;
        }
        let level = rest.split_whitespace().nth(2)?;
        level.trim_end_matches('.').parse::<f32>().ok().map(|v| v as i32)
    })
}
