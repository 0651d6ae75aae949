//! Runtime configuration for a portal node.
//!
//! This is the typed form the services consume. The node binary builds it
//! from its TOML file; tests build it directly with short intervals.

use std::time::Duration;

use crate::debounce::DEFAULT_TRANSFER_COOLDOWN;
use crate::error::{PortalError, PortalResult};

/// Configuration for one node's sync services.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This node's identity as the manager knows it.
    pub server_id: String,

    /// Base URL of the manager, e.g. `http://localhost:3000`.
    pub manager_url: String,

    /// Base URL for telemetry uploads. Falls back to `manager_url`.
    pub api_url: Option<String>,

    /// Period of the full directory pull.
    pub directory_refresh: Duration,

    /// Fixed delay between a control channel close and the next connect.
    pub reconnect_delay: Duration,

    /// Period of the player position upload.
    pub telemetry_interval: Duration,

    /// Suppression window after a portal-triggered transfer.
    pub transfer_cooldown: Duration,

    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,

    /// Upper bound on the control channel's connect and handshake.
    pub connect_timeout: Duration,

    /// A registered channel that receives nothing for this long, pongs
    /// included, is treated as closed. Pings go out at half this period.
    pub connection_lost_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_id: String::new(),
            manager_url: "http://localhost:3000".to_string(),
            api_url: None,
            directory_refresh: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            telemetry_interval: Duration::from_secs(5),
            transfer_cooldown: DEFAULT_TRANSFER_COOLDOWN,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            connection_lost_timeout: Duration::from_secs(60),
        }
    }
}

impl NodeConfig {
    pub fn new(server_id: impl Into<String>, manager_url: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            manager_url: manager_url.into(),
            ..Default::default()
        }
    }

    /// HTTP base for directory pulls. A `ws://` manager URL is accepted and
    /// mapped to its HTTP equivalent.
    pub fn http_base(&self) -> String {
        http_base(&self.manager_url)
    }

    /// HTTP base for telemetry uploads.
    pub fn telemetry_base(&self) -> String {
        http_base(self.api_url.as_deref().unwrap_or(&self.manager_url))
    }

    /// WebSocket endpoint of the control channel.
    pub fn control_url(&self) -> PortalResult<String> {
        control_channel_url(&self.manager_url)
    }

    /// Checks the values the services cannot run with.
    ///
    /// The periodic loops are built on [`tokio::time::interval`], which
    /// panics on a zero period, so every cadence must be non-zero. A zero
    /// `transfer_cooldown` is allowed and disables suppression.
    ///
    /// # Returns
    ///
    /// `Ok(())`, or [`PortalError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> PortalResult<()> {
        if self.server_id.trim().is_empty() {
            return Err(PortalError::InvalidConfig(
                "server_id cannot be empty".to_string(),
            ));
        }

        let cadences = [
            ("directory_refresh", self.directory_refresh),
            ("reconnect_delay", self.reconnect_delay),
            ("telemetry_interval", self.telemetry_interval),
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
            ("connection_lost_timeout", self.connection_lost_timeout),
        ];
        for (name, value) in cadences {
            if value.is_zero() {
                return Err(PortalError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        self.control_url().map(|_| ())
    }
}

fn http_base(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

/// Maps a manager base URL onto the control channel endpoint: `http` becomes
/// `ws`, `https` becomes `wss`, a bare host gets `ws://`, and `/dashboard` is
/// appended.
pub fn control_channel_url(manager_url: &str) -> PortalResult<String> {
    let url = manager_url.trim().trim_end_matches('/');
    if url.is_empty() {
        return Err(PortalError::InvalidUrl("manager URL is empty".to_string()));
    }

    let base = if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else if url.contains("://") {
        return Err(PortalError::InvalidUrl(format!(
            "unsupported scheme in {manager_url}"
        )));
    } else {
        format!("ws://{url}")
    };

    Ok(format!("{base}/dashboard"))
}
