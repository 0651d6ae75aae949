//! Transfer execution and the hand-off from background tasks to the host
//! thread.
//!
//! Manager-initiated transfers arrive on the control channel task, but the
//! host may only accept relocate calls from its own thread. The channel task
//! therefore enqueues a [`TransferRequest`] and the host drains the queue on
//! its next tick.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::host::PortalHost;
use crate::types::PlayerRef;

/// Where a transfer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOrigin {
    /// The player walked into a portal.
    Portal { portal_id: String },
    /// The manager pushed a `transfer` command.
    Manager,
}

/// A manager request to move a player, queued for the host thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub player: String,
    pub server: String,
}

/// Outcome of a relocate attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Relocated,
    Failed(String),
}

/// Tells the player, relocates them, and reports failure back to them.
///
/// The result is informational only: a failure does not touch debounce state.
pub fn execute_transfer(
    host: &dyn PortalHost,
    player: &PlayerRef,
    destination: &str,
    origin: &TransferOrigin,
) -> TransferOutcome {
    host.send_message(player, &format!("Transferring to {destination}..."));

    match host.relocate(player, destination) {
        Ok(()) => {
            debug!("Transfer of {} to {} via {:?}", player.name, destination, origin);
            TransferOutcome::Relocated
        }
        Err(e) => {
            host.send_message(player, "Transfer failed!");
            warn!("Transfer failed for {}: {}", player.name, e);
            TransferOutcome::Failed(e.to_string())
        }
    }
}

/// Unbounded queue of manager transfer requests.
///
/// Senders live on background tasks; the receiver is drained synchronously
/// by whichever thread the host calls [`TransferQueue::drain`] from.
pub struct TransferQueue {
    sender: mpsc::UnboundedSender<TransferRequest>,
    receiver: Mutex<mpsc::UnboundedReceiver<TransferRequest>>,
    dropped: AtomicU64,
}

impl TransferQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn sender(&self) -> TransferSender {
        TransferSender {
            inner: self.sender.clone(),
        }
    }

    /// Executes every queued request against `host`.
    ///
    /// Requests naming a player who is not here are dropped silently; the
    /// manager's view of presence may be stale.
    pub fn drain(&self, host: &dyn PortalHost) -> Vec<TransferOutcome> {
        let mut outcomes = Vec::new();
        let mut receiver = self.receiver.lock();

        while let Ok(request) = receiver.try_recv() {
            match host.find_player(&request.player) {
                Some(player) => outcomes.push(execute_transfer(
                    host,
                    &player,
                    &request.server,
                    &TransferOrigin::Manager,
                )),
                None => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Ignoring transfer for {}: not on this server",
                        request.player
                    );
                }
            }
        }

        outcomes
    }

    /// Requests dropped because the player was absent.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for TransferQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer half handed to the control channel.
#[derive(Debug, Clone)]
pub struct TransferSender {
    inner: mpsc::UnboundedSender<TransferRequest>,
}

impl TransferSender {
    pub fn submit(&self, request: TransferRequest) {
        if self.inner.send(request).is_err() {
            debug!("Transfer queue closed, dropping request");
        }
    }
}
