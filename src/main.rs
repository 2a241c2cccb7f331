// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! AgroTrack - Field Telemetry Core
//!
//! Runs the telemetry engine headless, plus maintenance commands for
//! inspecting and clearing the store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use agrotrack::db::{AlertStore, ReadingStore};
use agrotrack::{Config, Database, Engine, RawReading, NAME, VERSION};

/// AgroTrack - Field Telemetry Core
#[derive(Parser, Debug)]
#[command(name = "agrotrack")]
#[command(author = "AgroTrack Project")]
#[command(version = VERSION)]
#[command(about = "Field sensor ingestion, alerting and live broadcast")]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the engine until Ctrl+C
    Run(RunArgs),

    /// Print aggregate stats as JSON
    Stats,

    /// Delete every stored reading and alert
    Clear,

    /// Send one reading through the pipeline
    Ingest {
        /// Reading as JSON, e.g. '{"soilMoisture": 25, "temperature": 22, "humidity": 50}'
        #[arg(long)]
        json: String,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Run the synthetic field generator
    #[arg(long)]
    simulate: bool,

    /// WebSocket server port
    #[arg(long)]
    ws_port: Option<u16>,

    /// MQTT broker address
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// Data output directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    init_logging(&args, &config)?;

    info!("🌱 {} v{} - Field Telemetry Core", NAME, VERSION);
    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;

    match args.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(run) => {
            apply_overrides(&mut config, run);
            rt.block_on(run_headless(config))
        }
        Command::Stats => {
            let engine = Engine::new(config)?;
            println!("{}", serde_json::to_string_pretty(&engine.stats()?)?);
            Ok(())
        }
        Command::Clear => clear_data(Engine::new(config)?.database()),
        Command::Ingest { json } => {
            let engine = Engine::new(config)?;
            let raw = RawReading::from_json(json.as_bytes())?;
            let reading = engine.ingest(raw)?;
            println!("{}", serde_json::to_string_pretty(&reading)?);
            Ok(())
        }
    }
}

fn init_logging(args: &Args, config: &Config) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true);

    if args.trace || args.debug {
        let level = if args.trace { Level::TRACE } else { Level::DEBUG };
        tracing::subscriber::set_global_default(builder.with_max_level(level).finish())?;
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())?;
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, run: RunArgs) {
    if run.simulate {
        config.generator.enabled = true;
    }
    if let Some(data_dir) = run.data_dir {
        config.set_data_dir(data_dir);
    }
    if let Some(port) = run.ws_port {
        config.streaming.websocket_port = port;
    }
    if let Some(mqtt) = run.mqtt_broker {
        config.streaming.mqtt_enabled = true;
        config.streaming.mqtt_broker = mqtt;
    }
}

/// Run the engine until Ctrl+C
async fn run_headless(config: Config) -> Result<()> {
    let mut engine = Engine::new(config)?;
    engine.start().await?;

    info!("Simulation: {}", engine.generator_running().await);

    if let Some(addr) = engine.streaming().and_then(|s| s.websocket_addr()) {
        info!("   Subscribers: ws://{}", addr);
    }
    info!("🚀 AgroTrack running");
    info!("   Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    engine.stop().await?;

    let stats = engine.stats()?;
    info!(
        "AgroTrack shutdown complete ({} readings, {} alerts, up {}s)",
        stats.total_readings,
        stats.total_alerts,
        engine.uptime()
    );

    Ok(())
}

/// Bulk maintenance clear of both collections
fn clear_data(db: &Database) -> Result<()> {
    let readings = db.reading_count()?;
    let alerts = db.alert_count()?;

    println!("Current data: {} readings, {} alerts", readings, alerts);

    if readings == 0 && alerts == 0 {
        println!("Database is already empty");
        return Ok(());
    }

    let removed_readings = db.clear_readings()?;
    let removed_alerts = db.clear_alerts()?;

    println!("Deleted {} readings and {} alerts", removed_readings, removed_alerts);
    Ok(())
}
