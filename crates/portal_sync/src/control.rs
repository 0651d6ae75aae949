//! Persistent control channel to the manager.
//!
//! The channel is a WebSocket to `<manager>/dashboard` carrying JSON
//! envelopes `{ "event": ..., "data": ... }`. On every successful connect the
//! node sends `register` with its server id. The manager may then push
//! `transfer` commands and full `portals` sets at any time.
//!
//! Reconnection is a single loop owned by one task:
//!
//! ```text
//! Disconnected --connect--> Connecting --open + register--> Registered
//!      ^                        |                               |
//!      +----- fixed delay ------+-------- close / error --------+
//! ```
//!
//! Only the end of a session drives the loop back to `Disconnected`: a close
//! frame, a transport error, a connect that fails or exceeds its timeout, or a
//! registered connection that stays silent past the lost timeout (the node
//! pings at half that period, so a live manager always answers). The next
//! attempt starts only after the fixed delay, so two connects can never
//! overlap. There is no attempt limit.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::directory::PortalDirectory;
use crate::error::{PortalError, PortalResult};
use crate::portal::{parse_portal_list, Portal};
use crate::transfer::{TransferRequest, TransferSender};

/// Where the control channel is in its connect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Registered,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Transfer(TransferRequest),
    Portals(Vec<Portal>),
    /// An event tag this node does not handle.
    Other(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    player: String,
    server: String,
}

/// Decodes one inbound text frame.
pub fn decode_event(text: &str) -> PortalResult<ControlEvent> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let event = match envelope.event.as_str() {
        "transfer" => {
            let data: TransferData = serde_json::from_value(envelope.data)?;
            ControlEvent::Transfer(TransferRequest {
                player: data.player,
                server: data.server,
            })
        }
        "portals" => ControlEvent::Portals(parse_portal_list(envelope.data)?),
        _ => ControlEvent::Other(envelope.event),
    };
    Ok(event)
}

/// The `register` envelope sent on every connect.
pub fn register_message(server_id: &str) -> String {
    json!({
        "event": "register",
        "data": { "serverId": server_id }
    })
    .to_string()
}

/// Counters describing the channel's history.
#[derive(Debug, Default)]
pub struct ChannelStats {
    pub connect_attempts: AtomicU64,
    pub registrations: AtomicU64,
    pub disconnects: AtomicU64,
    pub portal_updates: AtomicU64,
    pub transfers_received: AtomicU64,
    pub malformed_events: AtomicU64,
}

/// Default bound on connect plus handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default silence after which a registered channel counts as lost.
pub const DEFAULT_CONNECTION_LOST_TIMEOUT: Duration = Duration::from_secs(60);

/// The node's single connection to the manager.
pub struct ControlChannel {
    url: String,
    server_id: String,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    connection_lost_timeout: Duration,
    directory: Arc<PortalDirectory>,
    transfers: TransferSender,
    state: watch::Sender<ConnectionState>,
    stats: ChannelStats,
    running: AtomicBool,
}

impl ControlChannel {
    /// Creates a channel in the `Disconnected` state. Nothing connects until
    /// [`ControlChannel::spawn`].
    ///
    /// # Arguments
    ///
    /// * `url` - WebSocket endpoint, usually from [`crate::config::control_channel_url`]
    /// * `server_id` - identity sent in every `register` event
    /// * `reconnect_delay` - fixed wait between a close and the next connect
    /// * `directory` - replaced wholesale by pushed `portals` events
    /// * `transfers` - where pushed `transfer` events are queued for the host
    ///
    /// Liveness uses [`DEFAULT_CONNECT_TIMEOUT`] and
    /// [`DEFAULT_CONNECTION_LOST_TIMEOUT`]; see [`ControlChannel::with_liveness`].
    pub fn new(
        url: impl Into<String>,
        server_id: impl Into<String>,
        reconnect_delay: Duration,
        directory: Arc<PortalDirectory>,
        transfers: TransferSender,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: url.into(),
            server_id: server_id.into(),
            reconnect_delay,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connection_lost_timeout: DEFAULT_CONNECTION_LOST_TIMEOUT,
            directory,
            transfers,
            state,
            stats: ChannelStats::default(),
            running: AtomicBool::new(false),
        }
    }

    /// Overrides the connect bound and the silence after which an open
    /// connection is given up. Pings are sent every half
    /// `connection_lost_timeout`, so a live peer always answers in time.
    pub fn with_liveness(mut self, connect_timeout: Duration, connection_lost_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.connection_lost_timeout = connection_lost_timeout;
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watches state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a connect loop currently owns this channel.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("Control channel {:?} -> {:?}", previous, next);
        }
    }

    /// Applies one inbound text frame. A malformed frame changes nothing.
    pub fn handle_text(&self, text: &str) -> PortalResult<()> {
        let event = decode_event(text).inspect_err(|_| {
            self.stats.malformed_events.fetch_add(1, Ordering::Relaxed);
        })?;

        match event {
            ControlEvent::Transfer(request) => {
                debug!("Manager requests {} -> {}", request.player, request.server);
                self.stats.transfers_received.fetch_add(1, Ordering::Relaxed);
                self.transfers.submit(request);
            }
            ControlEvent::Portals(portals) => {
                info!("🌀 Manager pushed {} portals", portals.len());
                self.stats.portal_updates.fetch_add(1, Ordering::Relaxed);
                self.directory.replace_all(portals);
            }
            ControlEvent::Other(tag) => {
                debug!("Ignoring control event '{}'", tag);
            }
        }
        Ok(())
    }

    /// One connect-register-read cycle. Returns when the connection closes,
    /// fails, or goes silent for longer than the lost timeout.
    async fn run_session(&self) -> PortalResult<()> {
        self.set_state(ConnectionState::Connecting);
        self.stats.connect_attempts.fetch_add(1, Ordering::Relaxed);

        let (socket, _) = timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| {
                PortalError::ConnectionLost(format!(
                    "connect timed out after {:?}",
                    self.connect_timeout
                ))
            })??;
        let (mut sink, mut stream) = socket.split();

        sink.send(Message::text(register_message(&self.server_id)))
            .await?;
        self.stats.registrations.fetch_add(1, Ordering::Relaxed);
        self.set_state(ConnectionState::Registered);
        info!("✅ Connected to manager at {}", self.url);

        let ping_every = (self.connection_lost_timeout / 2).max(Duration::from_millis(1));
        let mut ping = interval_at(Instant::now() + ping_every, ping_every);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline = Instant::now() + self.connection_lost_timeout;

        loop {
            tokio::select! {
                frame = stream.next() => {
                    let Some(frame) = frame else { break };
                    deadline = Instant::now() + self.connection_lost_timeout;

                    match frame {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_text(text.as_str()) {
                                warn!("Dropping malformed control event: {}", e);
                            }
                        }
                        Ok(Message::Close(reason)) => {
                            debug!("Manager closed control channel: {:?}", reason);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Control channel error: {}", e);
                            return Err(e.into());
                        }
                    }
                }
                _ = ping.tick() => {
                    sink.send(Message::Ping(Default::default())).await?;
                }
                _ = sleep_until(deadline) => {
                    warn!(
                        "No traffic from manager for {:?}, dropping connection",
                        self.connection_lost_timeout
                    );
                    return Err(PortalError::ConnectionLost(format!(
                        "silent for {:?}",
                        self.connection_lost_timeout
                    )));
                }
            }
        }
        Ok(())
    }

    /// Starts the connect loop on the current tokio runtime.
    ///
    /// The loop runs until its task is aborted: connect, register, read until
    /// the connection ends, wait `reconnect_delay`, repeat. Aborting the task
    /// puts the channel back to `Disconnected` and allows a later `spawn`.
    ///
    /// # Returns
    ///
    /// The loop's handle, or `None` when a loop already owns this channel.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use std::{sync::Arc, time::Duration};
    /// # use portal_sync::{ControlChannel, PortalDirectory, TransferQueue};
    /// # async fn run() {
    /// let queue = TransferQueue::new();
    /// let channel = Arc::new(ControlChannel::new(
    ///     "ws://localhost:3000/dashboard",
    ///     "survival-1",
    ///     Duration::from_secs(5),
    ///     Arc::new(PortalDirectory::new()),
    ///     queue.sender(),
    /// ));
    /// let handle = Arc::clone(&channel).spawn().expect("not yet running");
    /// // ...
    /// handle.abort();
    /// # }
    /// ```
    pub fn spawn(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Control channel already running");
            return None;
        }

        let guard = RunningGuard(self);
        Some(tokio::spawn(async move {
            let channel = &guard.0;
            loop {
                if let Err(e) = channel.run_session().await {
                    debug!("Control channel session ended: {}", e);
                }

                channel.set_state(ConnectionState::Disconnected);
                channel.stats.disconnects.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Disconnected from manager, reconnecting in {:?}...",
                    channel.reconnect_delay
                );
                sleep(channel.reconnect_delay).await;
            }
        }))
    }
}

/// Owned by the connect loop's task. Dropped when the task is aborted, which
/// releases the channel for the next `spawn`.
struct RunningGuard(Arc<ControlChannel>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.set_state(ConnectionState::Disconnected);
        self.0.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferQueue;

    fn channel(directory: Arc<PortalDirectory>, queue: &TransferQueue) -> ControlChannel {
        ControlChannel::new(
            "ws://127.0.0.1:1/dashboard",
            "node-1",
            Duration::from_millis(10),
            directory,
            queue.sender(),
        )
    }

    #[test]
    fn test_register_message_shape() {
        let value: Value = serde_json::from_str(&register_message("node-7")).unwrap();
        assert_eq!(value["event"], "register");
        assert_eq!(value["data"]["serverId"], "node-7");
    }

    #[test]
    fn test_decode_transfer() {
        let event =
            decode_event(r#"{"event":"transfer","data":{"player":"Alice","server":"lobby"}}"#)
                .unwrap();
        assert_eq!(
            event,
            ControlEvent::Transfer(TransferRequest {
                player: "Alice".to_string(),
                server: "lobby".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_unknown_event() {
        let event = decode_event(r#"{"event":"metrics","data":{}}"#).unwrap();
        assert_eq!(event, ControlEvent::Other("metrics".to_string()));
    }

    #[test]
    fn test_portals_push_replaces_directory() {
        let directory = Arc::new(PortalDirectory::new());
        let queue = TransferQueue::new();
        let channel = channel(Arc::clone(&directory), &queue);

        channel
            .handle_text(
                r#"{"event":"portals","data":[
                    {"id":"p1","name":"Hub","targetServerId":"s2","world":"world","x":0,"y":64,"z":0,"shape":"sphere"},
                    {"id":"p2","name":"Arena","targetServerId":"s3","world":"world","x":50,"y":64,"z":50}
                ]}"#,
            )
            .unwrap();
        assert_eq!(directory.len(), 2);

        channel
            .handle_text(r#"{"event":"portals","data":[]}"#)
            .unwrap();
        assert!(directory.is_empty());
        assert_eq!(channel.stats().portal_updates.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_malformed_portals_push_keeps_directory() {
        let directory = Arc::new(PortalDirectory::new());
        let queue = TransferQueue::new();
        let channel = channel(Arc::clone(&directory), &queue);

        channel
            .handle_text(r#"{"event":"portals","data":[{"id":"p1","name":"Hub","targetServerId":"s2","world":"world","x":0,"y":64,"z":0}]}"#)
            .unwrap();
        let result = channel.handle_text(r#"{"event":"portals","data":[{"id":"p9"}]}"#);

        assert!(result.is_err());
        assert!(directory.get("p1").is_some());
        assert_eq!(channel.stats().malformed_events.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_transfer_is_queued_not_executed() {
        let directory = Arc::new(PortalDirectory::new());
        let queue = TransferQueue::new();
        let channel = channel(directory, &queue);

        channel
            .handle_text(r#"{"event":"transfer","data":{"player":"Alice","server":"lobby"}}"#)
            .unwrap();

        let host = crate::host::InMemoryHost::new();
        assert!(queue.drain(&host).is_empty());
        assert!(host.relocations().is_empty());
        assert_eq!(channel.stats().transfers_received.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_spawn_twice_runs_one_loop_until_aborted() {
        let directory = Arc::new(PortalDirectory::new());
        let queue = TransferQueue::new();
        let channel = Arc::new(channel(directory, &queue));

        let first = Arc::clone(&channel).spawn();
        let second = Arc::clone(&channel).spawn();

        assert!(first.is_some());
        assert!(second.is_none());
        if let Some(handle) = first {
            handle.abort();
            let _ = handle.await;
        }
        assert!(!channel.is_running());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(Arc::clone(&channel).spawn().is_some());
    }
}
