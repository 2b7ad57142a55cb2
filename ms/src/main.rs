//! Mapsync - mapping refresh notifications
//!
//! CLI entry point for running a coordinator or sending a notification.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use mapsync::cli::{Cli, Command};
use mapsync::config::Config;
use mapsync::{
    CoordinatorLocator, HandlerRegistry, MAPPING_REFRESH_ENDPOINT, MappingRefreshNotifier, Notification,
    ReconciliationDispatcher, ReconciliationError, Reconciler, RefreshQueue, RefreshTask, ResourceCatalog,
    StaticLocator, TcpServer, TcpTransport, Transport,
};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mapsync")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("ms.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Reconciler used by the standalone coordinator: records that a mapping
/// would be recomputed for the resource
struct LoggingReconciler;

#[async_trait]
impl Reconciler for LoggingReconciler {
    async fn reconcile(&self, task: &RefreshTask) -> Result<(), ReconciliationError> {
        info!(
            resource = %task.resource_name,
            instance = %task.resource_instance_id,
            "Reconciling mapping"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(node_id = %config.node_id, "mapsync starting");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Coordinator { listen } => cmd_coordinator(&config, listen.as_deref()).await,
        Command::Notify {
            resource,
            instance,
            coordinator,
        } => cmd_notify(&config, &resource, instance.as_deref(), coordinator.as_deref()).await,
        Command::Endpoint => {
            println!("{}", MAPPING_REFRESH_ENDPOINT);
            Ok(())
        }
    }
}

async fn cmd_coordinator(config: &Config, listen: Option<&str>) -> Result<()> {
    debug!(?listen, "cmd_coordinator: called");
    let addr = listen.unwrap_or(config.listen_addr.as_str());

    let catalog = ResourceCatalog::from_map(&config.resources);
    let (queue, worker) = RefreshQueue::new(catalog, config.queue_capacity);

    let mut registry = HandlerRegistry::new();
    ReconciliationDispatcher::register(&mut registry, Arc::new(queue)).context("Failed to register dispatcher")?;

    let server = TcpServer::bind(addr, Arc::new(registry))
        .await
        .context(format!("Failed to bind {}", addr))?
        .with_timeout(config.timeout())
        .with_max_frame_size(config.max_frame_size);
    let local_addr = server.local_addr().context("Failed to read listener address")?;

    println!(
        "{} Coordinator listening on {} ({} resources known)",
        "✓".green(),
        local_addr.to_string().cyan(),
        config.resources.len()
    );

    let (server_shutdown_tx, server_shutdown_rx) = mpsc::channel(1);
    let (worker_shutdown_tx, worker_shutdown_rx) = mpsc::channel(1);
    let server_task = tokio::spawn(server.run(server_shutdown_rx));
    let worker_task = tokio::spawn(worker.run(Arc::new(LoggingReconciler), worker_shutdown_rx));

    tokio::signal::ctrl_c().await.context("Failed to wait for Ctrl-C")?;
    info!("Shutdown signal received");

    let _ = server_shutdown_tx.send(()).await;
    let _ = worker_shutdown_tx.send(()).await;
    server_task.await.context("Transport task failed")?;
    let stats = worker_task.await.context("Refresh worker task failed")?;

    println!(
        "Reconciled {} mappings ({} duplicates collapsed, {} stale, {} failed)",
        stats.reconciled, stats.collapsed, stats.stale, stats.failed
    );
    Ok(())
}

async fn cmd_notify(config: &Config, resource: &str, instance: Option<&str>, coordinator: Option<&str>) -> Result<()> {
    debug!(%resource, ?instance, ?coordinator, "cmd_notify: called");

    let mut notification = Notification::new(resource, config.node_id.as_str()).context("Invalid notification")?;
    if let Some(instance) = instance {
        notification = notification.with_instance_id(instance);
    }

    let transport = Arc::new(
        TcpTransport::new()
            .with_timeout(config.timeout())
            .with_max_frame_size(config.max_frame_size),
    );
    let notifier = MappingRefreshNotifier::new(transport.clone());
    let locator = StaticLocator::new(config.coordinator(coordinator));

    if locator.current_coordinator().is_none() {
        println!("{} No coordinator known, notification for {} dropped", "!".yellow(), resource.cyan());
    }
    notifier.notify_current(&locator, notification);

    // Keep the process alive until the send task finishes; its outcome is
    // only logged
    transport.flush().await;

    let metrics = transport.metrics();
    if metrics.acknowledged > 0 {
        println!("{} Mapping refresh sent for {}", "✓".green(), resource.cyan());
    } else if metrics.rejected > 0 {
        println!("{}", "Mapping refresh rejected by the coordinator (see log)".dimmed());
    } else if metrics.failed > 0 {
        println!("{}", "Mapping refresh not delivered (see log)".dimmed());
    }
    Ok(())
}
