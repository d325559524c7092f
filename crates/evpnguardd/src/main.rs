//! evpnguardd daemon entry point.
//!
//! Wires the log tailer, file watcher, management API client, and
//! failover controller together and runs the event loop until a
//! shutdown signal arrives.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use evpnguardd::config::DEFAULT_CONFIG_PATH;
use evpnguardd::{
    Agent, EapiClient, EapiHttpClient, EapiInterfaceControl, EsiDiscovery, FailoverController,
    FileStatusSink, GuardConfig, InterfaceActuator, LogTailer, LogWatcher, PeerHealthChecker,
    StatusSink,
};

/// EVPN failover guard agent
#[derive(Parser, Debug)]
#[command(name = "evpnguardd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Initialize tracing/logging.
///
/// `RUST_LOG` overrides the verbosity flags when set.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = GuardConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.validate().context("Invalid configuration")?;

    info!(
        log = %config.syslog.path.display(),
        endpoint = %config.eapi.endpoint,
        rediscover = config.failover.rediscover_on_transition,
        "Configuration loaded"
    );

    let status: Arc<dyn StatusSink> = Arc::new(FileStatusSink::new(&config.failover.status_path));
    let eapi: Arc<dyn EapiClient> = Arc::new(
        EapiHttpClient::new(&config.eapi).context("Failed to build management API client")?,
    );

    let controller = FailoverController::new(
        PeerHealthChecker::new(eapi.clone()),
        EsiDiscovery::new(eapi.clone(), status.clone()),
        InterfaceActuator::new(Arc::new(EapiInterfaceControl::new(eapi))),
        status.clone(),
        config.failover.rediscover_on_transition,
    );

    // The only fatal runtime dependency: the log must be openable once
    let tailer = LogTailer::new(&config.syslog.path)
        .with_context(|| format!("Failed to open log file {}", config.syslog.path.display()))?;

    let mut agent = Agent::new(tailer, controller, status, args.config.clone());

    let _watcher = LogWatcher::spawn(&config.syslog.path, agent.wake_sender())
        .context("Failed to start log file watcher")?;

    agent.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("--- Starting evpnguardd ---");

    match run(args).await {
        Ok(()) => {
            info!("evpnguardd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("evpnguardd error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
