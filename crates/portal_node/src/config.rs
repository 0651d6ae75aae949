//! Configuration management for the portal node.
//!
//! Loads the TOML file, writes a default one on first start, validates it,
//! and converts it into the [`NodeConfig`] the sync services consume.

use portal_sync::NodeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

fn default_directory_refresh() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_telemetry_interval() -> u64 {
    5
}

fn default_transfer_cooldown() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_connection_lost_timeout() -> u64 {
    60
}

/// Host tick used to drain manager transfers.
fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub node: NodeSettings,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Identity and manager endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Identifier this node registers with
    pub server_id: String,
    /// Manager base URL for directory pulls and the control channel
    pub manager_url: String,
    /// Separate base URL for telemetry, if the manager API lives elsewhere
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Service cadences, all in whole seconds except the host tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "default_directory_refresh")]
    pub directory_refresh_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval_secs: u64,
    #[serde(default = "default_transfer_cooldown")]
    pub transfer_cooldown_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Silence after which the control channel reconnects
    #[serde(default = "default_connection_lost_timeout")]
    pub connection_lost_timeout_secs: u64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            directory_refresh_secs: default_directory_refresh(),
            reconnect_delay_secs: default_reconnect_delay(),
            telemetry_interval_secs: default_telemetry_interval(),
            transfer_cooldown_secs: default_transfer_cooldown(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            connection_lost_timeout_secs: default_connection_lost_timeout(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    pub level: String,
    /// JSON formatting
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings {
                server_id: Uuid::new_v4().to_string(),
                manager_url: "http://localhost:3000".to_string(),
                api_url: None,
            },
            timing: TimingSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration with a new random
    /// server id is written to `path` and returned, so the id survives
    /// restarts.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn to_node_config(&self) -> NodeConfig {
        NodeConfig {
            server_id: self.node.server_id.clone(),
            manager_url: self.node.manager_url.clone(),
            api_url: self.node.api_url.clone(),
            directory_refresh: Duration::from_secs(self.timing.directory_refresh_secs),
            reconnect_delay: Duration::from_secs(self.timing.reconnect_delay_secs),
            telemetry_interval: Duration::from_secs(self.timing.telemetry_interval_secs),
            transfer_cooldown: Duration::from_secs(self.timing.transfer_cooldown_secs),
            request_timeout: Duration::from_secs(self.timing.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.timing.connect_timeout_secs),
            connection_lost_timeout: Duration::from_secs(
                self.timing.connection_lost_timeout_secs,
            ),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timing.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.node.server_id.trim().is_empty() {
            return Err("Server id cannot be empty".to_string());
        }

        validate_url("manager_url", &self.node.manager_url)?;
        if let Some(api_url) = &self.node.api_url {
            validate_url("api_url", api_url)?;
        }

        let cadences = [
            ("directory_refresh_secs", self.timing.directory_refresh_secs),
            ("reconnect_delay_secs", self.timing.reconnect_delay_secs),
            ("telemetry_interval_secs", self.timing.telemetry_interval_secs),
            ("request_timeout_secs", self.timing.request_timeout_secs),
            ("connect_timeout_secs", self.timing.connect_timeout_secs),
            (
                "connection_lost_timeout_secs",
                self.timing.connection_lost_timeout_secs,
            ),
            ("tick_interval_ms", self.timing.tick_interval_ms),
        ];
        for (name, value) in cadences {
            if value == 0 {
                return Err(format!("{name} must be greater than zero"));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            ));
        }

        Ok(())
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), String> {
    let schemes = ["http://", "https://", "ws://", "wss://"];
    match schemes.iter().find_map(|scheme| url.strip_prefix(scheme)) {
        Some(host) if !host.trim_matches('/').is_empty() => Ok(()),
        Some(_) => Err(format!("{field} has no host: {url}")),
        None => Err(format!(
            "Invalid {field}: {url}. Must start with one of: {schemes:?}"
        )),
    }
}
