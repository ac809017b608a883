//! `stratus` command line

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use stratus_agent::logger::initialize_logger;
use stratus_agent::{Agent, AgentConfig, RunOptions};

#[derive(Parser)]
#[command(name = "stratus")]
#[command(version)]
#[command(about = "Stratus - edge telemetry agent for a weather and comfort node")]
#[command(long_about = "Stratus - edge telemetry agent for a weather and comfort node

Reads a temperature/pressure sensor, publishes readings and short-horizon
trend predictions to an MQTT broker, and reports status on an LED.

EXAMPLES:
    stratus run --config stratus.json
    stratus run --simulate --dry-run --cycles 20
    stratus register alice 3 0
    stratus classify alice 24.5

ENVIRONMENT VARIABLES:
    RUST_LOG=debug                 Enable debug logging
    STRATUS_NETWORK_PASSWORD       Overrides network.password
    STRATUS_BROKER_USERNAME        Overrides broker.username
    STRATUS_BROKER_PASSWORD        Overrides broker.password")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (JSON); defaults are used when omitted
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and run the telemetry loop
    Run(RunArgs),

    /// Register or replace a user's comfort profile
    Register {
        /// Username
        name: String,
        /// Age class (0-3)
        age_class: u8,
        /// 0 = female, 1 = male
        sex: u8,
    },

    /// Classify a temperature for a registered user
    Classify {
        /// Username
        name: String,
        /// Temperature in °C
        temperature: f32,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Use a synthetic sensor and log-only LEDs
    #[arg(long)]
    simulate: bool,

    /// Publish to an in-memory broker instead of MQTT
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Attach prediction details to every temperature publish
    #[arg(long)]
    rich: bool,

    /// Seconds between cycles
    #[arg(long)]
    interval: Option<f64>,
}

fn load_config(path: Option<&PathBuf>) -> Result<AgentConfig> {
    let config = match path {
        Some(path) => AgentConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AgentConfig::from_env().context("building default configuration")?,
    };
    Ok(config)
}

fn run(mut config: AgentConfig, args: RunArgs) -> Result<()> {
    if args.duration.is_some() {
        config.telemetry.duration_secs = args.duration;
    }
    if args.cycles.is_some() {
        config.telemetry.max_cycles = args.cycles;
    }
    if let Some(interval) = args.interval {
        config.telemetry.publish_interval_secs = interval;
    }
    config.telemetry.rich_payload |= args.rich;
    config.validate().context("invalid run options")?;

    let agent = Agent::new(config);
    let stop = agent.stop_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Interrupt received, stopping after the current cycle");
        stop.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set signal handler: {}. Ctrl-C will not stop cleanly.", e);
    }

    let stats = agent
        .run(RunOptions {
            simulate: args.simulate,
            dry_run: args.dry_run,
        })
        .context("telemetry run failed")?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn main() -> Result<()> {
    initialize_logger();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run(args) => run(config, args),
        Commands::Register { name, age_class, sex } => {
            let agent = Agent::new(config);
            agent
                .register_user(&name, age_class, sex)
                .with_context(|| format!("registering {}", name))?;
            println!(
                "Registered {} (age class {}, sex {}) in {}",
                name,
                age_class,
                sex,
                agent.config().registry_path.display()
            );
            Ok(())
        }
        Commands::Classify { name, temperature } => {
            let agent = Agent::new(config);
            let assessment = agent
                .classify_user(&name, temperature)
                .with_context(|| format!("classifying for {}", name))?;
            println!(
                "{}: {} (probability {:.2})",
                name,
                assessment.label.as_str(),
                assessment.probability
            );
            Ok(())
        }
    }
}
