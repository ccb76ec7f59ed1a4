//! Process entry point (SPEC_FULL.md §12), shaped after `glass-app.cpp`'s
//! standalone-process sequence: parse `<config> [noconsole]`, install
//! logging, load config, initialize, then block in a health-check loop
//! until a stop signal arrives. The command-line surface uses a
//! `clap::Parser` and the main loop is a `crossbeam_channel::select!`
//! over the stdin-message channel and a periodic tick, same shape as a
//! USI engine's command-dispatch loop.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, select, tick};

use glass_core::travel_time::LinearTravelTime;
use glass_server::orchestrator::Orchestrator;
use glass_server::stdin_reader::{self, StdinEvent};
use glass_server::{logging, signal_handler, ServerConfig};

/// How often the main loop runs a nucleation pass and a health check
/// (spec.md §5's "sleeps on a fixed interval between health checks").
const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// A worker pool's heartbeat must refresh within this window or a health
/// check reports the pool unhealthy (spec.md §4.6/§5).
const HEARTBEAT_TIMEOUT_SEC: i64 = 30;

const STDIN_CHANNEL_SIZE: usize = 1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time seismic phase-pick association engine", long_about = None)]
struct Args {
    /// Path to the JSON configuration file.
    config: PathBuf,

    /// Suppress echoing inbound/outbound messages to stdout for debugging.
    #[arg(long = "no-console")]
    no_console: bool,

    /// Bind address for the Prometheus metrics HTTP listener.
    #[arg(long = "metrics-bind")]
    metrics_bind: Option<SocketAddr>,

    /// Log level (error, warn, info, debug, trace). Overridden by GLASS_LOG.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// RNG seed for simulated annealing, for reproducible runs.
    #[arg(long = "seed", default_value_t = 0xA5F3_17C2_u64)]
    seed: u64,
}

fn main() {
    let args = Args::parse();
    logging::init(&args.log_level, true);

    if let Err(e) = run(args) {
        log::error!("fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = ServerConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    if let Some(bind) = args.metrics_bind {
        glass_server::server_metrics::install(bind).context("starting metrics listener")?;
        log::info!("metrics listening on {bind}");
    }

    let stop = Arc::new(AtomicBool::new(false));
    signal_handler::install(stop.clone());

    let travel_time = LinearTravelTime::new();
    let mut orchestrator = Orchestrator::new(config, &travel_time, args.seed, stop.clone());
    log::info!("glass-server initialized, entering main loop");

    let (stdin_tx, stdin_rx) = bounded::<StdinEvent>(STDIN_CHANNEL_SIZE);
    let stdin_handle = stdin_reader::spawn(stdin_tx, !args.no_console);
    let ticker = tick(TICK_INTERVAL);

    loop {
        select! {
            recv(stdin_rx) -> event => match event {
                Ok(StdinEvent::Message(msg)) => orchestrator.dispatch(msg),
                Ok(StdinEvent::Quit) | Err(_) => {
                    log::info!("stdin closed, shutting down");
                    break;
                }
            },
            recv(ticker) -> _ => {
                orchestrator.run_nucleation_pass();
                let now_sec = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                let (status, healthy) = orchestrator.health_check(now_sec, HEARTBEAT_TIMEOUT_SEC);
                if !healthy {
                    log::warn!("health check: a worker pool heartbeat exceeded {HEARTBEAT_TIMEOUT_SEC}s");
                }
                log::debug!(
                    "health: sites={} picks={} hypos={} correlations={} webs={} stale_sites={}",
                    status.num_sites, status.num_picks, status.num_hypos, status.num_correlations,
                    status.num_webs, status.stale_sites.len(),
                );
            },
            default(Duration::from_millis(100)) => {
                if stop.load(Ordering::Relaxed) {
                    log::info!("stop signal received, shutting down");
                    break;
                }
            }
        }
    }

    drop(stdin_rx);
    let _ = stdin_handle.join();
    orchestrator.shutdown();
    log::info!("shutdown complete");
    Ok(())
}
