use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use logger::LevelFilter;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use pieping_service::config::{self, Config};
use pieping_service::database::JsonFileRepository;
use pieping_service::monitoring::MonitoringExecutor;
use pieping_service::{ScheduleController, SchedulerEvent};

#[derive(Parser, Debug)]
#[command(author, version, about = "Probe HTTP endpoints on a schedule", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_with_level(cli.log_level);

    let config_path = config::resolve_path(cli.config.as_deref())?;
    let config = Config::load_or_create(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    debug!("{config}");

    let targets_path = config.targets_path(&config_path);
    info!(config = %config_path.display(), targets = %targets_path.display(), "Starting pieping");

    let repository = Arc::new(JsonFileRepository::new(targets_path));
    let executor = Arc::new(
        MonitoringExecutor::from_settings(&config.probe).context("building HTTP client")?,
    );
    let controller = ScheduleController::start(repository, executor).await?;
    let mut events = controller.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("listening for Ctrl-C")?;
                info!("Received Ctrl-C, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(SchedulerEvent::ProbeCompleted { target_id, name, result }) => {
                    let status = result.status_code.unwrap_or_default();
                    let elapsed_ms = result.response_time_ms().unwrap_or_default();
                    match (result.success, &result.error_message) {
                        (Some(true), _) => info!(%target_id, %name, status, elapsed_ms, "Probe succeeded"),
                        (_, Some(error)) => warn!(%target_id, %name, status, elapsed_ms, %error, "Probe failed"),
                        _ => warn!(%target_id, %name, status, elapsed_ms, "Probe failed"),
                    }
                }
                Ok(event) => debug!(?event, "Scheduler event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event listener fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    controller.shutdown().await?;
    info!(health = ?controller.overall_health(), "Stopped");
    Ok(())
}
