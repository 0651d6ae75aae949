//! Portal records: the domain value and its wire form.
//!
//! The manager delivers portals as camelCase JSON objects, both in the
//! directory pull response and in the `portals` push event. [`PortalRecord`]
//! mirrors that shape with its optional fields; [`Portal`] is the immutable
//! value the rest of the node works with once defaults have been applied.

use serde::{Deserialize, Serialize};

use crate::types::Position;

/// Radius of circular portal volumes, in blocks.
pub const PORTAL_RADIUS: f64 = 3.0;

/// Vertical tolerance for the flat and rectangle shapes, in blocks.
pub const VERTICAL_TOLERANCE: f64 = 2.0;

/// Placeholder used when the manager does not know the target's name.
pub const UNKNOWN_SERVER_NAME: &str = "Unknown";

/// The volume a portal occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PortalShape {
    /// Horizontal disc of [`PORTAL_RADIUS`] with vertical tolerance.
    #[default]
    Flat,
    /// Ball of [`PORTAL_RADIUS`].
    Sphere,
    /// Axis-aligned box between the anchor and the secondary corner.
    Rectangle,
}

impl PortalShape {
    /// Parses a wire shape name. Anything unrecognized is flat.
    pub fn from_name(name: &str) -> Self {
        match name {
            "sphere" => Self::Sphere,
            "rectangle" => Self::Rectangle,
            _ => Self::Flat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Sphere => "sphere",
            Self::Rectangle => "rectangle",
        }
    }
}

impl std::fmt::Display for PortalShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cross-server teleport point.
///
/// Fully determined at construction. Directory refreshes swap whole records,
/// they never patch fields of an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct Portal {
    pub id: String,
    pub name: String,
    /// Routing key of the destination server.
    pub target_server_id: String,
    /// Name the relocate primitive is keyed by. Not interchangeable with
    /// `target_server_id`.
    pub target_server_name: String,
    /// Node that owns this portal, when the manager says so.
    pub owner_server_id: Option<String>,
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub x2: i32,
    pub z2: i32,
    pub shape: PortalShape,
}

impl Portal {
    pub fn radius(&self) -> f64 {
        PORTAL_RADIUS
    }

    pub fn anchor(&self) -> Position {
        Position::new(self.x as f64, self.y as f64, self.z as f64)
    }
}

/// Portal object exactly as it travels on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalRecord {
    pub id: String,
    pub name: String,
    pub target_server_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x2: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z2: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
}

impl From<PortalRecord> for Portal {
    fn from(record: PortalRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            target_server_id: record.target_server_id,
            target_server_name: record
                .target_server_name
                .unwrap_or_else(|| UNKNOWN_SERVER_NAME.to_string()),
            owner_server_id: record.server_id,
            world: record.world,
            x: record.x,
            y: record.y,
            z: record.z,
            x2: record.x2.unwrap_or(0),
            z2: record.z2.unwrap_or(0),
            shape: record
                .shape
                .as_deref()
                .map(PortalShape::from_name)
                .unwrap_or_default(),
        }
    }
}

impl From<&Portal> for PortalRecord {
    fn from(portal: &Portal) -> Self {
        Self {
            id: portal.id.clone(),
            name: portal.name.clone(),
            target_server_id: portal.target_server_id.clone(),
            target_server_name: Some(portal.target_server_name.clone()),
            server_id: portal.owner_server_id.clone(),
            world: portal.world.clone(),
            x: portal.x,
            y: portal.y,
            z: portal.z,
            x2: Some(portal.x2),
            z2: Some(portal.z2),
            shape: Some(portal.shape.as_str().to_string()),
        }
    }
}

/// Decodes a JSON array of portal objects.
///
/// All or nothing: one malformed entry fails the whole payload so callers
/// never install a partial set.
pub fn parse_portal_list(value: serde_json::Value) -> Result<Vec<Portal>, serde_json::Error> {
    let records: Vec<PortalRecord> = serde_json::from_value(value)?;
    Ok(records.into_iter().map(Portal::from).collect())
}
