//! Stratus edge telemetry agent
//!
//! Wires the core runtime to real transports and hardware:
//! - `config`: one JSON document replaces every module-level setting
//! - `supervisor`: network and broker lifecycles with retry, backoff and
//!   indicator signalling
//! - `telemetry`: the sequential read → predict → publish → drain loop
//! - `commands`: the fixed control vocabulary accepted on the control topic
//! - `payload`: JSON shapes published to downstream consumers
//! - `registry`: occupant profiles for the comfort classifier
//! - `hardware`: sysfs LEDs, IIO barometer and simulated stand-ins
//! - `agent`: startup, run and shutdown sequencing for the binary

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod commands;
pub mod config;
pub mod hardware;
pub mod logger;
pub mod payload;
pub mod registry;
pub mod supervisor;
pub mod telemetry;

pub use agent::{Agent, RunOptions};
pub use commands::ControlCommand;
pub use config::{AgentConfig, LinkSettings, TelemetrySettings, Topics};
pub use registry::UserRegistry;
pub use supervisor::{ConnectionState, ConnectivitySupervisor, LinkModes, LinkSupervisor, NetworkInfo};
pub use telemetry::{LoopStats, TelemetryLoop};

use std::path::PathBuf;

use stratus_connectors::ConnectorError;
use stratus_core::CoreError;
use stratus_ml::MlError;
use thiserror::Error;

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent-level failures
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration rejected during validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// File could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File contents are not the expected JSON
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Transport failure
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Core runtime failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Comfort classification failure
    #[error(transparent)]
    Comfort(#[from] MlError),

    /// A link used up its reconnect attempts
    #[error("{link}: giving up after {attempts} reconnect attempts")]
    AttemptsExhausted {
        /// Link description
        link: String,
        /// Attempts made, including the one that hit the cap
        attempts: u32,
    },

    /// User registry lookup failure
    #[error("Registry error: {0}")]
    Registry(String),

    /// A required collaborator could not be set up; the loop does not start
    #[error("Setup failed: {0}")]
    Setup(String),
}
