//! Per-player transfer cooldown.
//!
//! A player standing in a portal produces an entry signal on every movement
//! tick. The debouncer turns that flood into one transfer: the first entry
//! arms a suppression window and schedules a single expiry timer; every entry
//! while suppressed is dropped; when the timer fires the player is idle again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::debug;

use crate::types::PlayerId;

/// Default suppression window after a portal-triggered transfer.
pub const DEFAULT_TRANSFER_COOLDOWN: Duration = Duration::from_secs(10);

/// Tracks which players are inside their suppression window.
///
/// Entries exist only while suppressed, so the map never outgrows the number
/// of players that triggered a transfer in the last window.
pub struct TransferDebouncer {
    window: Duration,
    suppressed: Arc<DashMap<PlayerId, Instant>>,
    runtime: Handle,
    triggers: AtomicU64,
}

impl TransferDebouncer {
    /// Creates a debouncer whose expiry timers run on `runtime`.
    ///
    /// # Arguments
    ///
    /// * `window` - How long a player stays suppressed after a trigger. Zero
    ///   expires the suppression as soon as the timer task runs.
    /// * `runtime` - Handle the expiry tasks are spawned on, so arming works
    ///   from threads outside the runtime
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use portal_sync::{PlayerId, TransferDebouncer};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let debouncer = TransferDebouncer::new(
    ///     Duration::from_secs(10),
    ///     tokio::runtime::Handle::current(),
    /// );
    /// let player = PlayerId::new();
    /// assert!(debouncer.try_arm(player));
    /// assert!(!debouncer.try_arm(player));
    /// # }
    /// ```
    pub fn new(window: Duration, runtime: Handle) -> Self {
        Self {
            window,
            suppressed: Arc::new(DashMap::new()),
            runtime,
            triggers: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `player` is currently suppressed. Callers skip the
    /// containment scan entirely when this is true.
    pub fn is_suppressed(&self, player: &PlayerId) -> bool {
        self.suppressed.contains_key(player)
    }

    /// Moves `player` from idle to suppressed.
    ///
    /// Returns true exactly once per window: the caller that gets `true`
    /// owns the transfer. A suppressed player gets `false` and no additional
    /// timer is scheduled.
    ///
    /// # Returns
    ///
    /// `true` when this call armed the suppression.
    pub fn try_arm(&self, player: PlayerId) -> bool {
        match self.suppressed.entry(player) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let until = Instant::now() + self.window;
                slot.insert(until);
                self.triggers.fetch_add(1, Ordering::Relaxed);
                self.schedule_expiry(player, until);
                true
            }
        }
    }

    /// Number of players currently suppressed.
    pub fn suppressed_count(&self) -> usize {
        self.suppressed.len()
    }

    /// Total transfers this debouncer has let through.
    pub fn trigger_count(&self) -> u64 {
        self.triggers.load(Ordering::Relaxed)
    }

    fn schedule_expiry(&self, player: PlayerId, until: Instant) {
        let suppressed = Arc::clone(&self.suppressed);
        self.runtime.spawn(async move {
            tokio::time::sleep_until(until).await;
            suppressed.remove_if(&player, |_, armed_until| *armed_until == until);
            debug!("Transfer cooldown expired for {}", player);
        });
    }
}

impl std::fmt::Debug for TransferDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferDebouncer")
            .field("window", &self.window)
            .field("suppressed", &self.suppressed.len())
            .finish()
    }
}
