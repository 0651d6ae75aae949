//! Periodic full pull of this node's portal set from the manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::directory::PortalDirectory;
use crate::error::{PortalError, PortalResult};
use crate::portal::{parse_portal_list, Portal};

/// Counters describing the pull loop's history.
#[derive(Debug, Default)]
pub struct SyncStats {
    pub refreshes: AtomicU64,
    pub failures: AtomicU64,
}

/// Pulls `GET <manager>/api/public/portals?serverId=<id>` and replaces the
/// directory with the result.
pub struct DirectorySyncClient {
    http: Client,
    base_url: String,
    server_id: String,
    period: Duration,
    directory: Arc<PortalDirectory>,
    stats: SyncStats,
}

impl DirectorySyncClient {
    /// Creates a client that pulls this node's portals into `directory`.
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client; its timeout bounds every pull
    /// * `base_url` - Manager base URL, without a trailing path
    /// * `server_id` - Sent as the `serverId` query parameter
    /// * `period` - Time between pulls; must be non-zero
    /// * `directory` - Replaced in full after every successful pull
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::{sync::Arc, time::Duration};
    /// use portal_sync::{DirectorySyncClient, PortalDirectory};
    ///
    /// let client = DirectorySyncClient::new(
    ///     reqwest::Client::new(),
    ///     "http://localhost:3000",
    ///     "survival-1",
    ///     Duration::from_secs(30),
    ///     Arc::new(PortalDirectory::new()),
    /// );
    /// assert_eq!(client.stats().refreshes.load(std::sync::atomic::Ordering::Relaxed), 0);
    /// ```
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        server_id: impl Into<String>,
        period: Duration,
        directory: Arc<PortalDirectory>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            server_id: server_id.into(),
            period,
            directory,
            stats: SyncStats::default(),
        }
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Fetches and decodes the portal list without touching the directory.
    pub async fn fetch(&self) -> PortalResult<Vec<Portal>> {
        let url = format!("{}/api/public/portals", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("serverId", self.server_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let value: serde_json::Value = serde_json::from_str(&body)?;
        Ok(parse_portal_list(value)?)
    }

    /// One pull cycle. Failures leave the directory exactly as it was.
    ///
    /// # Returns
    ///
    /// The number of portals installed, or the transport, status or decode
    /// error that aborted the pull.
    pub async fn refresh(&self) -> PortalResult<usize> {
        match self.fetch().await {
            Ok(portals) => {
                let count = portals.len();
                self.directory.replace_all(portals);
                self.stats.refreshes.fetch_add(1, Ordering::Relaxed);
                Ok(count)
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Starts the pull loop: once immediately, then every period.
    ///
    /// # Returns
    ///
    /// The loop's handle. The loop never ends on its own; abort it to stop.
    ///
    /// # Panics
    ///
    /// If `period` is zero. [`crate::PortalNode::new`] rejects such a config.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.refresh().await {
                    Ok(count) => info!("🌀 Loaded {} portals", count),
                    Err(e) => warn!("Failed to load portals: {}", e),
                }
                debug!("Next portal refresh in {:?}", self.period);
            }
        })
    }
}
