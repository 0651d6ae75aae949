//! Composition root for one portal node.
//!
//! [`PortalNode`] owns the directory, the debouncer and the transfer queue,
//! and wires the three background services to them. The host calls
//! [`PortalNode::on_player_move`] from its movement hook and
//! [`PortalNode::process_pending_transfers`] from its tick; everything else
//! runs on tokio tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Client;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::admin::{CommandSender, PortalAdmin};
use crate::config::NodeConfig;
use crate::control::ControlChannel;
use crate::debounce::TransferDebouncer;
use crate::directory::PortalDirectory;
use crate::error::{PortalError, PortalResult};
use crate::host::PortalHost;
use crate::sync::DirectorySyncClient;
use crate::telemetry::TelemetryReporter;
use crate::transfer::{execute_transfer, TransferOrigin, TransferOutcome, TransferQueue};
use crate::types::PlayerMove;

/// What a single movement event led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The player is in their cooldown window; nothing was checked.
    Suppressed,
    /// The player is not inside any portal.
    NoPortal,
    /// The player entered a portal and a transfer was attempted.
    Transfer {
        portal_id: String,
        outcome: TransferOutcome,
    },
}

/// One node's portal services.
pub struct PortalNode {
    config: NodeConfig,
    host: Arc<dyn PortalHost>,
    directory: Arc<PortalDirectory>,
    debouncer: TransferDebouncer,
    transfers: TransferQueue,
    sync: Arc<DirectorySyncClient>,
    channel: Arc<ControlChannel>,
    telemetry: Arc<TelemetryReporter>,
    started: Arc<AtomicBool>,
}

impl PortalNode {
    /// Builds the node and its services without starting them.
    ///
    /// Must be called from within a tokio runtime; the debouncer's expiry
    /// timers run on it.
    ///
    /// # Arguments
    ///
    /// * `config` - identity, manager endpoints and cadences
    /// * `host` - the engine the node relocates and messages players through
    ///
    /// # Returns
    ///
    /// The node, or an error when `config` fails [`NodeConfig::validate`],
    /// no runtime is current, or the HTTP client cannot be built.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use portal_sync::{InMemoryHost, NodeConfig, PortalNode};
    ///
    /// # async fn run() -> portal_sync::PortalResult<()> {
    /// let node = PortalNode::new(
    ///     NodeConfig::new("survival-1", "http://localhost:3000"),
    ///     Arc::new(InMemoryHost::new()),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: NodeConfig, host: Arc<dyn PortalHost>) -> PortalResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current()?;
        let http = Client::builder().timeout(config.request_timeout).build()?;

        let directory = Arc::new(PortalDirectory::new());
        let transfers = TransferQueue::new();

        let sync = Arc::new(DirectorySyncClient::new(
            http.clone(),
            config.http_base(),
            config.server_id.clone(),
            config.directory_refresh,
            Arc::clone(&directory),
        ));
        let channel = Arc::new(
            ControlChannel::new(
                config.control_url()?,
                config.server_id.clone(),
                config.reconnect_delay,
                Arc::clone(&directory),
                transfers.sender(),
            )
            .with_liveness(config.connect_timeout, config.connection_lost_timeout),
        );
        let telemetry = Arc::new(TelemetryReporter::new(
            http,
            config.telemetry_base(),
            config.server_id.clone(),
            config.telemetry_interval,
            Arc::clone(&host),
        ));

        Ok(Self {
            debouncer: TransferDebouncer::new(config.transfer_cooldown, runtime),
            config,
            host,
            directory,
            transfers,
            sync,
            channel,
            telemetry,
            started: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<PortalDirectory> {
        &self.directory
    }

    pub fn debouncer(&self) -> &TransferDebouncer {
        &self.debouncer
    }

    pub fn sync_client(&self) -> &Arc<DirectorySyncClient> {
        &self.sync
    }

    pub fn control_channel(&self) -> &Arc<ControlChannel> {
        &self.channel
    }

    pub fn telemetry(&self) -> &Arc<TelemetryReporter> {
        &self.telemetry
    }

    pub fn transfer_queue(&self) -> &TransferQueue {
        &self.transfers
    }

    /// Starts the directory pull, the control channel and telemetry.
    ///
    /// Services run until [`NodeServices::shutdown`]; after it returns the
    /// node can be started again.
    ///
    /// # Returns
    ///
    /// Handles to the three tasks, or [`PortalError::AlreadyStarted`] while a
    /// previous start has not been shut down.
    pub fn start(&self) -> PortalResult<NodeServices> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Portal services for {} already running", self.config.server_id);
            return Err(PortalError::AlreadyStarted);
        }

        info!(
            "🚀 Starting portal services for {} (manager {})",
            self.config.server_id, self.config.manager_url
        );

        let mut handles = vec![
            Arc::clone(&self.sync).spawn(),
            Arc::clone(&self.telemetry).spawn(),
        ];
        handles.extend(Arc::clone(&self.channel).spawn());

        Ok(NodeServices {
            handles,
            started: Arc::clone(&self.started),
        })
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Movement hook. Runs on the host's gameplay thread: no I/O, no awaits,
    /// a single pass over the current directory snapshot.
    pub fn on_player_move(&self, event: &PlayerMove) -> MoveOutcome {
        if self.debouncer.is_suppressed(&event.player.id) {
            return MoveOutcome::Suppressed;
        }

        let Some(portal) = self.directory.find_containing(event.to, &event.world) else {
            return MoveOutcome::NoPortal;
        };

        if !self.debouncer.try_arm(event.player.id) {
            return MoveOutcome::Suppressed;
        }

        debug!(
            "{} entered portal {} ({} -> {})",
            event.player.name, portal.name, portal.target_server_id, portal.target_server_name
        );
        let outcome = execute_transfer(
            self.host.as_ref(),
            &event.player,
            &portal.target_server_name,
            &TransferOrigin::Portal {
                portal_id: portal.id.clone(),
            },
        );

        MoveOutcome::Transfer {
            portal_id: portal.id,
            outcome,
        }
    }

    /// Executes manager-initiated transfers queued by the control channel.
    /// Call from the thread the host allows relocations on.
    pub fn process_pending_transfers(&self) -> Vec<TransferOutcome> {
        self.transfers.drain(self.host.as_ref())
    }

    /// Runs a `/portal` command against the local directory.
    pub fn run_admin_command<S: AsRef<str>>(
        &self,
        sender: &CommandSender,
        args: &[S],
    ) -> Vec<String> {
        PortalAdmin::new(&self.directory).run(sender, args)
    }
}

/// Handles to the node's background tasks.
///
/// Dropping this without calling [`NodeServices::shutdown`] detaches the
/// tasks and leaves the node marked as started.
pub struct NodeServices {
    handles: Vec<JoinHandle<()>>,
    started: Arc<AtomicBool>,
}

impl NodeServices {
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Aborts every task and waits until each one has been dropped.
    ///
    /// In-flight requests are abandoned. On return the control channel
    /// reports `Disconnected` and the node accepts another `start`.
    pub async fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Portal service task failed: {}", e);
                }
            }
        }
        self.started.store(false, Ordering::SeqCst);
        info!("🛑 Portal services stopped");
    }
}
