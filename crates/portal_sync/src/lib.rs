//! # Portal Sync
//!
//! Keeps a fleet of game-server nodes in agreement about cross-server
//! portals, and turns a player walking into one into exactly one transfer.
//!
//! ## Components
//!
//! * **Geometry** ([`geometry`]) - pure containment tests for flat, sphere and
//!   rectangle portals
//! * **Directory** ([`PortalDirectory`]) - the node's portal set, swapped
//!   atomically on every refresh
//! * **Debouncer** ([`TransferDebouncer`]) - per-player cooldown after a
//!   portal-triggered transfer
//! * **Directory sync** ([`DirectorySyncClient`]) - periodic full pull from the
//!   manager
//! * **Control channel** ([`ControlChannel`]) - WebSocket to the manager with
//!   registration, pushed transfers and portal sets, and fixed-delay reconnect
//! * **Telemetry** ([`TelemetryReporter`]) - best-effort player position upload
//!
//! ## Threading
//!
//! The host engine calls [`PortalNode::on_player_move`] from its gameplay
//! thread. That path never performs I/O: it reads a directory snapshot and
//! touches the debouncer. All network work runs on tokio tasks, and
//! manager-initiated transfers are handed back to the host through
//! [`PortalNode::process_pending_transfers`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use portal_sync::{InMemoryHost, NodeConfig, PortalNode};
//!
//! # async fn run() -> portal_sync::PortalResult<()> {
//! let host = Arc::new(InMemoryHost::new());
//! let node = PortalNode::new(NodeConfig::new("survival-1", "http://localhost:3000"), host)?;
//! let services = node.start()?;
//! // ... host loop calls node.on_player_move(..) and node.process_pending_transfers()
//! services.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod config;
pub mod control;
pub mod debounce;
pub mod directory;
pub mod error;
pub mod geometry;
pub mod host;
pub mod node;
pub mod portal;
pub mod sync;
pub mod telemetry;
pub mod transfer;
pub mod types;

pub use admin::{AdminCommand, CommandSender, PortalAdmin};
pub use config::NodeConfig;
pub use control::{ConnectionState, ControlChannel, ControlEvent};
pub use debounce::TransferDebouncer;
pub use directory::{PortalDirectory, PortalSnapshot};
pub use error::{PortalError, PortalResult};
pub use host::{InMemoryHost, PortalHost, Relocation};
pub use node::{MoveOutcome, NodeServices, PortalNode};
pub use portal::{Portal, PortalRecord, PortalShape};
pub use sync::DirectorySyncClient;
pub use telemetry::TelemetryReporter;
pub use transfer::{TransferOutcome, TransferQueue, TransferRequest};
pub use types::{PlayerId, PlayerLocation, PlayerMove, PlayerRef, Position};
