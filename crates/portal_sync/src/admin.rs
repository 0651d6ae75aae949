//! The in-game `/portal` command.
//!
//! A minimal administrative surface over the local directory: create a
//! portal where the caller stands, delete one by name, list them. Nothing
//! here is sent to the manager or persisted; the next full sync overwrites
//! local edits.

use uuid::Uuid;

use crate::directory::PortalDirectory;
use crate::portal::{Portal, PortalShape};
use crate::types::Position;

pub const USAGE: &str = "Usage: /portal <create|delete|list>";
pub const CREATE_USAGE: &str = "Usage: /portal create <name> <targetServerId>";
pub const DELETE_USAGE: &str = "Usage: /portal delete <name>";

/// Horizontal extent of a command-created portal's secondary corner.
const CREATED_PORTAL_SPAN: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Create { name: String, target: String },
    Delete { name: String },
    List,
}

impl AdminCommand {
    /// Parses the arguments after `/portal`. The error is the usage line to
    /// show the sender.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, &'static str> {
        let Some(sub) = args.first() else {
            return Err(USAGE);
        };

        match sub.as_ref().to_lowercase().as_str() {
            "create" => match (args.get(1), args.get(2)) {
                (Some(name), Some(target)) => Ok(Self::Create {
                    name: name.as_ref().to_string(),
                    target: target.as_ref().to_string(),
                }),
                _ => Err(CREATE_USAGE),
            },
            "delete" => args
                .get(1)
                .map(|name| Self::Delete {
                    name: name.as_ref().to_string(),
                })
                .ok_or(DELETE_USAGE),
            "list" => Ok(Self::List),
            _ => Err(USAGE),
        }
    }
}

/// Who issued the command.
#[derive(Debug, Clone)]
pub enum CommandSender {
    Player { world: String, position: Position },
    Console,
}

/// Runs `/portal` commands against a directory.
pub struct PortalAdmin<'a> {
    directory: &'a PortalDirectory,
}

impl<'a> PortalAdmin<'a> {
    pub fn new(directory: &'a PortalDirectory) -> Self {
        Self { directory }
    }

    /// Parses and executes `args`, returning the lines to show the sender.
    pub fn run<S: AsRef<str>>(&self, sender: &CommandSender, args: &[S]) -> Vec<String> {
        let CommandSender::Player { world, position } = sender else {
            return vec!["Players only!".to_string()];
        };

        match AdminCommand::parse(args) {
            Ok(command) => self.execute(command, world, *position),
            Err(usage) => vec![usage.to_string()],
        }
    }

    fn execute(&self, command: AdminCommand, world: &str, position: Position) -> Vec<String> {
        match command {
            AdminCommand::Create { name, target } => {
                let portal = portal_at(&name, &target, world, position);
                self.directory.insert_named(portal);
                vec![format!("Portal '{name}' created!")]
            }
            AdminCommand::Delete { name } => {
                if self.directory.remove_by_name(&name) {
                    vec!["Portal deleted!".to_string()]
                } else {
                    vec!["Portal not found!".to_string()]
                }
            }
            AdminCommand::List => {
                let mut portals = self.directory.snapshot_values();
                portals.sort_by(|a, b| a.name.cmp(&b.name));

                let mut lines = vec!["Portals:".to_string()];
                lines.extend(
                    portals
                        .iter()
                        .map(|p| format!("- {} → {}", p.name, p.target_server_id)),
                );
                lines
            }
        }
    }
}

/// A flat portal anchored at the caller's block, targeting `target` by both
/// id and name.
fn portal_at(name: &str, target: &str, world: &str, position: Position) -> Portal {
    let (x, y, z) = position.block();
    Portal {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        target_server_id: target.to_string(),
        target_server_name: target.to_string(),
        owner_server_id: None,
        world: world.to_string(),
        x,
        y,
        z,
        x2: x + CREATED_PORTAL_SPAN,
        z2: z + CREATED_PORTAL_SPAN,
        shape: PortalShape::Flat,
    }
}
