//! devicecoord - device operation coordination
//!
//! CLI entry point for group management and runtime monitoring.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use devicecoord::cli::{Cli, Command, GroupsCommand, OutputFormat, get_log_path};
use devicecoord::config::Config;
use devicecoord::coordinator::Coordinator;
use devicecoord::groups::GroupRegistry;
use devicecoord::monitor::{QueueMonitor, ResourceMonitor};
use devicecoord::notify::NotificationBus;
use devicecoord::tracker::OperationTracker;

fn setup_logging(level: &str) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Write to the log file, not stdout/stderr
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    setup_logging(&level).context("Failed to setup logging")?;

    match cli.command {
        Command::Groups { groups_file, command } => {
            let path = groups_file.unwrap_or_else(|| config.storage.groups_path());
            cmd_groups(&path, command)
        }
        Command::Monitor { seconds, format } => cmd_monitor(&config, seconds, format).await,
    }
}

/// Run one group subcommand against the group file
fn cmd_groups(path: &Path, command: GroupsCommand) -> Result<()> {
    let mut registry = GroupRegistry::load_from_file(path)?;

    match command {
        GroupsCommand::List { name, format } => {
            let entries = registry.group_list(name.as_deref())?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
                OutputFormat::Text => {
                    if entries.is_empty() {
                        println!("No groups");
                    }
                    for entry in entries {
                        println!("{}: {}", entry.group, entry.devices.join(", "));
                    }
                }
            }
            return Ok(());
        }
        GroupsCommand::Add { name, devices } => {
            let ids: Vec<String> = devices.iter().map(ToString::to_string).collect();
            registry.group_add(&name, &ids)?;
            println!("Added {} device(s) to {}", ids.len(), name);
        }
        GroupsCommand::Remove { name, devices } => {
            let ids: Vec<String> = devices.iter().map(ToString::to_string).collect();
            registry.group_remove(&name, &ids)?;
            println!("Removed {} device(s) from {}", ids.len(), name);
        }
        GroupsCommand::Delete { name } => {
            registry.group_delete(&name)?;
            println!("Deleted {}", name);
        }
    }

    registry.save_to_file(path)?;
    Ok(())
}

/// Run the background services until the deadline or Ctrl-C, then report
async fn cmd_monitor(config: &Config, seconds: Option<u64>, format: OutputFormat) -> Result<()> {
    let shutdown = CancellationToken::new();

    let coordinator = Arc::new(Coordinator::new(config.coordinator.clone()));
    let sweeper = coordinator.spawn_sweeper(shutdown.child_token());

    let tracker = Arc::new(OperationTracker::new(&config.timeouts));
    let tracker_task = tracker.spawn(config.monitoring.tracker_check_interval(), shutdown.child_token());

    let bus = NotificationBus::default();
    let mut monitor = ResourceMonitor::new(config.monitoring.clone());
    monitor
        .add_queue_monitor(QueueMonitor::for_broadcast("notifications", bus.sender(), bus.capacity()))
        .await;
    monitor.start(&shutdown);

    info!(?seconds, "Monitor running");
    match seconds {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?,
    }

    monitor.stop().await;
    shutdown.cancel();
    sweeper.await.context("Sweeper task failed")?;
    tracker_task.await.context("Tracker task failed")?;

    let sample = monitor.collect_once();
    let queues = monitor.check_queues().await;
    let active = coordinator.active_count().await;
    let tracked = tracker.operation_count().await;

    match format {
        OutputFormat::Json => {
            let queues: Vec<_> = queues
                .iter()
                .map(|q| {
                    json!({
                        "name": q.name,
                        "current": q.current,
                        "capacity": q.capacity,
                        "percent": q.percent,
                        "breached": q.breached,
                    })
                })
                .collect();
            let report = json!({
                "alive-tasks": sample.alive_tasks,
                "workers": sample.workers,
                "memory-mb": sample.memory_mb,
                "active-updates": active,
                "tracked-operations": tracked,
                "queues": queues,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("alive tasks:        {}", sample.alive_tasks);
            println!("workers:            {}", sample.workers);
            println!("memory (MB):        {:.1}", sample.memory_mb);
            println!("active updates:     {}", active);
            println!("tracked operations: {}", tracked);
            for q in queues {
                println!("queue {}: {}/{} ({:.1}%)", q.name, q.current, q.capacity, q.percent);
            }
        }
    }
    Ok(())
}
