//! Error types for the portal node services.

use thiserror::Error;

/// Everything that can go wrong talking to the manager or the host.
///
/// None of these ever reach the movement hot path: each background service
/// catches them at its loop boundary and logs them.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Manager returned HTTP {0}")]
    Status(u16),

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Control channel transport error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Control channel lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid node configuration: {0}")]
    InvalidConfig(String),

    #[error("Portal services already running")]
    AlreadyStarted,

    #[error("Invalid manager URL: {0}")]
    InvalidUrl(String),

    #[error("Relocation to {destination} rejected: {reason}")]
    Relocate { destination: String, reason: String },

    #[error("No tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

pub type PortalResult<T> = Result<T, PortalError>;
