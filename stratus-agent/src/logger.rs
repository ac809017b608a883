//! Process logger setup

use std::sync::Once;

use env_logger::Builder;
use log::LevelFilter;

static INIT: Once = Once::new();

/// Install the process logger. Later calls are no-ops; `RUST_LOG` overrides the defaults.
pub fn initialize_logger() {
    INIT.call_once_force(|_| {
        let mut builder = Builder::new();

        builder
            .filter_level(LevelFilter::Info)
            .filter_module("stratus_agent", LevelFilter::Info)
            .filter_module("stratus_core", LevelFilter::Info)
            .filter_module("stratus_connectors", LevelFilter::Info)
            .filter_module("rumqttc", LevelFilter::Warn)
            .format_timestamp_millis()
            .parse_default_env();

        // Tests and embedders may have installed a logger already
        let _ = builder.try_init();
    });
}
