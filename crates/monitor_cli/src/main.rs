//! Command line entry point for the park availability monitor.
//! Runs a single check with `--once`, otherwise checks on a schedule until interrupted.

mod logging;

use std::io;
use std::path::PathBuf;

use clap::Parser;
use park_monitor::{PollLoop, load_config};
use tokio::sync::watch;

/// Exit code when a second interrupt abandons the pass in progress
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "park-monitor",
    version,
    about = "Watch Recreation.gov parks for newly available campsites and permits"
)]
/// CLI Arguments
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run one check of every park and exit
    #[arg(long)]
    once: bool,

    /// Log notifications instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_default();
            log::error!("❌ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        logging::init_default();
        log::error!("❌ {}", e);
        std::process::exit(1);
    }

    log::info!(
        "🏕️ Park monitor starting: {} parks, {}",
        config.parks.len(),
        config
            .date_range()
            .map(|range| range.to_string())
            .unwrap_or_default()
    );

    let mut poll_loop = match PollLoop::connect(&config, cli.dry_run) {
        Ok(poll_loop) => poll_loop,
        Err(e) => {
            log::error!("❌ Failed to start monitoring: {}", e);
            std::process::exit(1);
        }
    };

    if cli.once {
        poll_loop.run_once().await;
        return;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, shutdown_tx).await == Interrupt::Forced {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    poll_loop.run_scheduled(shutdown_rx).await;
}

/// How the interrupt watcher finished
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Signal handling failed; nothing more will be observed
    Unavailable,
    /// A second interrupt arrived before the loop stopped
    Forced,
}

/// Request a graceful stop on the first interrupt and report a forced stop on the second.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, shutdown: watch::Sender<bool>) -> Interrupt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        log::warn!("Unable to listen for Ctrl-C: {}", e);
        return Interrupt::Unavailable;
    }
    log::info!("🛑 Interrupt received, stopping after the current check (Ctrl-C again to quit now)");
    let _ = shutdown.send(true);

    if next_interrupt().await.is_err() {
        return Interrupt::Unavailable;
    }
    log::warn!("🛑 Second interrupt received, exiting without finishing the current check");
    Interrupt::Forced
}
