//! Drone Delivery Simulator CLI
//!
//! Flies one fleet per configured airport and streams per-tick telemetry to
//! the log or an HTTP ingest endpoint.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use drone_domain::{ControlCommand, parse_fleet_configs};
use drone_simulator::{
    HttpSink, LogSink, SimulatorConfig, SinkKind, TelemetrySink, TickCoordinator, TickMode,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "drone-simulator")]
#[command(about = "Simulate drone delivery fleets and stream their telemetry")]
struct Args {
    /// Tick mode: lockstep or free
    #[arg(short, long)]
    mode: Option<TickMode>,

    /// Tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Distance covered per tick, in degrees
    #[arg(long)]
    speed: Option<f64>,

    /// Seed for reproducible routes
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file with the airport list
    #[arg(short, long)]
    airports: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Telemetry sink: log or http
    #[arg(long)]
    sink: Option<SinkKind>,

    /// Ingest endpoint for the HTTP sink
    #[arg(long)]
    api_url: Option<String>,

    /// HTTP sink request timeout in milliseconds (defaults to the tick interval)
    #[arg(long)]
    sink_timeout_ms: Option<u64>,

    /// Dry run (log telemetry, don't post it)
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Read control messages from stdin, one JSON object per line
    #[arg(long)]
    stdin_control: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "drone_simulator={level},drone_domain={level}",
            level = config.log_level
        ))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(args.log_json.then(|| fmt::layer().json()))
        .with((!args.log_json).then(fmt::layer))
        .init();

    info!(
        version = drone_simulator::VERSION,
        airports = config.airports.len(),
        mode = config.mode.as_str(),
        tick_ms = u64::try_from(config.tick_interval.as_millis()).unwrap_or(u64::MAX),
        speed = config.drone_speed,
        seed = ?config.seed,
        "Starting drone simulator"
    );

    let fleets = config.build_fleets().context("Invalid airport configuration")?;
    let coordinator = TickCoordinator::spawn(fleets, config.coordinator_settings())
        .context("Failed to start fleets")?;

    let mut sink: Box<dyn TelemetrySink> = match config.sink {
        SinkKind::Log => Box::new(LogSink),
        SinkKind::Http => {
            let timeout = config.sink_timeout();
            info!(
                url = %config.api_url,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Posting telemetry over HTTP"
            );
            Box::new(
                HttpSink::new(config.api_url.clone(), timeout)
                    .context("Failed to build HTTP sink")?,
            )
        }
    };

    let (control_tx, control_rx) = mpsc::channel(32);
    if args.stdin_control {
        spawn_stdin_control(control_tx);
    } else {
        drop(control_tx);
    }

    let summary = coordinator
        .run(sink.as_mut(), control_rx, shutdown_signal())
        .await?;

    info!(
        run_id = %summary.run_id,
        ticks = summary.ticks,
        delivered = summary.batches_delivered,
        failed = summary.delivery_failures,
        routed = summary.commands_routed,
        unroutable = summary.routing_errors,
        workers_stopped = summary.workers_stopped,
        "Simulation complete"
    );

    Ok(())
}

/// Environment first, then command-line overrides.
fn load_config(args: &Args) -> Result<SimulatorConfig> {
    let mut config = SimulatorConfig::from_env()?;

    if let Some(path) = &args.airports {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        config.airports = parse_fleet_configs(&json)?;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_interval = Duration::from_millis(tick_ms);
    }
    if let Some(speed) = args.speed {
        config.drone_speed = speed;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.max_ticks.is_some() {
        config.max_ticks = args.max_ticks;
    }
    if let Some(sink) = args.sink {
        config.sink = sink;
    }
    if let Some(url) = &args.api_url {
        config.api_url.clone_from(url);
    }
    if let Some(timeout_ms) = args.sink_timeout_ms.filter(|ms| *ms > 0) {
        config.sink_timeout = Some(Duration::from_millis(timeout_ms));
    }
    if args.dry_run {
        config.sink = SinkKind::Log;
    }

    Ok(config)
}

/// Forward stdin lines to the coordinator as control commands.
fn spawn_stdin_control(tx: mpsc::Sender<ControlCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "Failed to read control input");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match ControlCommand::parse(&line) {
                Ok(command) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "Ignoring malformed control message"),
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
