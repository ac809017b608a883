//! Connectivity Lifecycle Defaults

/// Reconnect attempts allowed before a link supervisor gives up for good.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Interval between link status polls while connecting (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Network attach timeout (seconds).
pub const DEFAULT_NETWORK_TIMEOUT_S: u64 = 20;

/// Broker attach timeout (seconds).
pub const DEFAULT_BROKER_TIMEOUT_S: u64 = 10;

/// First reconnect backoff step (milliseconds); doubles per attempt.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Upper bound for a single reconnect backoff (milliseconds).
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// How long the "connected" pattern stays up before reverting (milliseconds).
pub const CONNECTED_PATTERN_MS: u64 = 3000;

/// How long the failure pattern stays up before reverting (milliseconds).
pub const FAILURE_PATTERN_MS: u64 = 2000;

/// RSSI mapped to 0 % signal (dBm).
pub const RSSI_FLOOR_DBM: i32 = -100;

/// RSSI mapped to 100 % signal (dBm).
pub const RSSI_CEILING_DBM: i32 = -30;
