//! The contract between a portal node and the game engine hosting it.
//!
//! The host owns players and worlds. The node asks it three things: who is
//! here, where are they, and please move this player to another server.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{PortalError, PortalResult};
use crate::types::{PlayerId, PlayerLocation, PlayerRef, Position};

/// Services the hosting game engine exposes to the portal node.
///
/// `relocate` and `send_message` are only ever invoked from the thread that
/// calls into [`crate::PortalNode`]'s movement and transfer-drain methods, so
/// hosts that demand single-threaded mutation of player state get it.
pub trait PortalHost: Send + Sync + 'static {
    /// Looks up a present player by name.
    fn find_player(&self, name: &str) -> Option<PlayerRef>;

    /// Every present player with their current location.
    fn player_locations(&self) -> Vec<PlayerLocation>;

    /// Moves `player` to the server called `destination`.
    fn relocate(&self, player: &PlayerRef, destination: &str) -> PortalResult<()>;

    /// Shows a chat line to `player`.
    fn send_message(&self, player: &PlayerRef, message: &str);
}

#[derive(Debug, Clone)]
struct HostedPlayer {
    player: PlayerRef,
    world: String,
    position: Position,
}

/// A record of one relocate call made against [`InMemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub player: String,
    pub destination: String,
}

/// Host backed by plain in-memory state.
///
/// Drives the headless node binary and doubles as the test host: every
/// relocation and message is recorded, and relocation can be made to fail.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    players: RwLock<HashMap<PlayerId, HostedPlayer>>,
    relocations: RwLock<Vec<Relocation>>,
    messages: RwLock<Vec<(String, String)>>,
    reject_relocations: RwLock<Option<String>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or moves a player.
    pub fn place_player(&self, player: PlayerRef, world: impl Into<String>, position: Position) {
        self.players.write().insert(
            player.id,
            HostedPlayer {
                player,
                world: world.into(),
                position,
            },
        );
    }

    pub fn remove_player(&self, id: &PlayerId) {
        self.players.write().remove(id);
    }

    pub fn player_count(&self) -> usize {
        self.players.read().len()
    }

    /// Makes every subsequent relocation fail with `reason`.
    pub fn reject_relocations(&self, reason: impl Into<String>) {
        *self.reject_relocations.write() = Some(reason.into());
    }

    pub fn relocations(&self) -> Vec<Relocation> {
        self.relocations.read().clone()
    }

    /// Messages sent so far as `(player name, text)` pairs.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.read().clone()
    }
}

impl PortalHost for InMemoryHost {
    fn find_player(&self, name: &str) -> Option<PlayerRef> {
        self.players
            .read()
            .values()
            .find(|hosted| hosted.player.name == name)
            .map(|hosted| hosted.player.clone())
    }

    fn player_locations(&self) -> Vec<PlayerLocation> {
        self.players
            .read()
            .values()
            .map(|hosted| PlayerLocation {
                name: hosted.player.name.clone(),
                world: hosted.world.clone(),
                position: hosted.position,
            })
            .collect()
    }

    fn relocate(&self, player: &PlayerRef, destination: &str) -> PortalResult<()> {
        if let Some(reason) = self.reject_relocations.read().clone() {
            return Err(PortalError::Relocate {
                destination: destination.to_string(),
                reason,
            });
        }

        info!("🚪 Relocating {} to {}", player.name, destination);
        self.relocations.write().push(Relocation {
            player: player.name.clone(),
            destination: destination.to_string(),
        });
        Ok(())
    }

    fn send_message(&self, player: &PlayerRef, message: &str) {
        self.messages
            .write()
            .push((player.name.clone(), message.to_string()));
    }
}
