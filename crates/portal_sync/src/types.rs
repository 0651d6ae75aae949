//! # Core Type Definitions
//!
//! The small vocabulary shared by every component of a portal node: who a
//! player is, where they stand, and what the host tells us when they move.
//!
//! - [`PlayerId`] - stable handle for a player on this node
//! - [`Position`] - 3D position with double precision
//! - [`PlayerRef`] - a present player as the host hands it to us
//! - [`PlayerMove`] - one per-tick movement event from the host

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player on this node.
///
/// Wraps a UUID so player ids cannot be confused with portal ids or
/// server ids, which are plain strings on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 3D position in a world.
///
/// `y` is the vertical axis; portals measure horizontal distance on `x`/`z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Integer block coordinates, as reported to the manager and used to
    /// anchor portals created in-game.
    pub fn block(&self) -> (i32, i32, i32) {
        (
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// A player currently present on this node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerRef {
    pub id: PlayerId,
    pub name: String,
}

impl PlayerRef {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A movement event delivered by the host on its gameplay thread.
#[derive(Debug, Clone)]
pub struct PlayerMove {
    pub player: PlayerRef,
    /// Name of the world the destination position belongs to.
    pub world: String,
    /// Where the player moved to.
    pub to: Position,
}

/// A present player's location, as gathered for telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerLocation {
    pub name: String,
    pub world: String,
    pub position: Position,
}
