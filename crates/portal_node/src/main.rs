//! Headless portal node.
//!
//! Runs the directory pull, the manager control channel and telemetry
//! against an in-memory host, draining manager transfers on a fixed tick.
//! Useful for exercising a manager deployment without a game server.

mod cli;
mod config;
mod logging;
mod signals;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use portal_sync::{InMemoryHost, PortalNode, TransferOutcome};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::cli::Args;
use crate::config::AppConfig;

const MONITOR_PERIOD: Duration = Duration::from_secs(60);

/// The running node plus the configuration it was built from.
pub struct Application {
    config: AppConfig,
    node: Arc<PortalNode>,
}

impl Application {
    pub async fn new(args: Args) -> Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config)
            .await
            .with_context(|| format!("loading {}", args.config.display()))?;

        if let Some(server_id) = args.server_id {
            config.node.server_id = server_id;
        }
        if let Some(manager_url) = args.manager_url {
            config.node.manager_url = manager_url;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        logging::setup_logging(&config.logging, args.debug, args.json_logs)?;

        let host = Arc::new(InMemoryHost::new());
        let node = PortalNode::new(config.to_node_config(), host)?;

        info!(
            "📂 Config: {} | Server id: {}",
            args.config.display(),
            config.node.server_id
        );

        Ok(Self {
            config,
            node: Arc::new(node),
        })
    }

    pub async fn run(self) -> Result<()> {
        let node_config = self.node.config();
        info!("🌟 Starting portal node");
        info!("📋 Configuration Summary:");
        info!("  🌐 Manager: {}", node_config.manager_url);
        info!("  🔌 Control channel: {}", self.node.control_channel().url());
        info!("  🌀 Directory refresh: {:?}", node_config.directory_refresh);
        info!("  ⏱️ Transfer cooldown: {:?}", node_config.transfer_cooldown);

        let services = self.node.start()?;
        let tick_handle = spawn_transfer_tick(Arc::clone(&self.node), self.config.tick_interval());
        let monitoring_handle = spawn_monitor(Arc::clone(&self.node));

        info!(
            "✅ Portal node running with {} background services",
            services.task_count()
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        signals::wait_for_shutdown().await?;

        info!("🛑 Shutdown signal received, stopping services...");
        monitoring_handle.abort();
        tick_handle.abort();
        services.shutdown().await;

        log_stats(&self.node);
        info!("👋 Portal node stopped");
        Ok(())
    }
}

/// Drains manager-initiated transfers, standing in for a game server's
/// main-thread tick.
fn spawn_transfer_tick(node: Arc<PortalNode>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            for outcome in node.process_pending_transfers() {
                if let TransferOutcome::Failed(reason) = outcome {
                    warn!("Manager transfer failed: {}", reason);
                }
            }
        }
    })
}

fn spawn_monitor(node: Arc<PortalNode>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(MONITOR_PERIOD);
        // Skip the immediate first tick.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            log_stats(&node);
        }
    })
}

fn log_stats(node: &PortalNode) {
    let sync = node.sync_client().stats();
    let channel = node.control_channel().stats();
    let telemetry = node.telemetry().stats();

    info!(
        "📊 Portals: {} | refreshes {} ok / {} failed | channel {:?}, {} connects, {} disconnects",
        node.directory().len(),
        sync.refreshes.load(Ordering::Relaxed),
        sync.failures.load(Ordering::Relaxed),
        node.control_channel().state(),
        channel.connect_attempts.load(Ordering::Relaxed),
        channel.disconnects.load(Ordering::Relaxed),
    );
    info!(
        "📊 Transfers: {} portal, {} from manager, {} dropped | telemetry {} sent / {} failed",
        node.debouncer().trigger_count(),
        channel.transfers_received.load(Ordering::Relaxed),
        node.transfer_queue().dropped_count(),
        telemetry.sent.load(Ordering::Relaxed),
        telemetry.failed.load(Ordering::Relaxed),
    );
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Failed to start portal node: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Portal node error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
