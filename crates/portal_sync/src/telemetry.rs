//! Best-effort upload of player positions to the manager.
//!
//! Nothing here is critical: a failed upload is counted and forgotten, the
//! next tick simply tries again with fresh positions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::trace;

use crate::error::{PortalError, PortalResult};
use crate::host::PortalHost;
use crate::types::PlayerLocation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub world: String,
}

impl From<PlayerLocation> for PlayerReport {
    fn from(location: PlayerLocation) -> Self {
        let (x, y, z) = location.position.block();
        Self {
            name: location.name,
            x,
            y,
            z,
            world: location.world,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayersPayload {
    pub players: Vec<PlayerReport>,
}

/// Upload counters. `failed` makes the swallowed errors observable.
#[derive(Debug, Default)]
pub struct TelemetryStats {
    pub sent: AtomicU64,
    pub failed: AtomicU64,
}

/// Posts `{ players: [...] }` to `<api>/api/servers/<id>/players`.
pub struct TelemetryReporter {
    http: Client,
    base_url: String,
    server_id: String,
    period: Duration,
    host: Arc<dyn PortalHost>,
    stats: TelemetryStats,
}

impl TelemetryReporter {
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client
    /// * `base_url` - API base that receives `/api/servers/<id>/players`
    /// * `server_id` - This node's id, used in the upload path
    /// * `period` - Time between uploads; must be non-zero
    /// * `host` - Source of the online player list
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        server_id: impl Into<String>,
        period: Duration,
        host: Arc<dyn PortalHost>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            server_id: server_id.into(),
            period,
            host,
            stats: TelemetryStats::default(),
        }
    }

    pub fn stats(&self) -> &TelemetryStats {
        &self.stats
    }

    pub fn collect(&self) -> PlayersPayload {
        PlayersPayload {
            players: self
                .host
                .player_locations()
                .into_iter()
                .map(PlayerReport::from)
                .collect(),
        }
    }

    async fn upload(&self, payload: &PlayersPayload) -> PortalResult<()> {
        let url = format!("{}/api/servers/{}/players", self.base_url, self.server_id);
        let response = self.http.post(url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::Status(status.as_u16()));
        }
        Ok(())
    }

    /// One report cycle. Never fails; the outcome lands in [`TelemetryStats`].
    ///
    /// # Returns
    ///
    /// Whether the manager accepted the upload.
    pub async fn report(&self) -> bool {
        let payload = self.collect();
        match self.upload(&payload).await {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                trace!("Telemetry upload skipped: {}", e);
                false
            }
        }
    }

    /// Starts the upload loop. The first upload goes out after one full
    /// period.
    ///
    /// # Panics
    ///
    /// If `period` is zero.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First upload waits one full period.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                self.report().await;
            }
        })
    }
}
