//! Command-line arguments for the portal node.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments. Every option overrides the matching value from
/// the configuration file.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// If the file doesn't exist, a default configuration with a freshly
    /// generated server id is written there.
    #[arg(short, long, default_value = "portal-node.toml")]
    pub config: PathBuf,

    /// Identifier this node registers with at the manager
    #[arg(short, long)]
    pub server_id: Option<String>,

    /// Manager base URL (e.g. "http://localhost:3000")
    #[arg(short, long)]
    pub manager_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("portal-node.toml"),
            server_id: None,
            manager_url: None,
            debug: false,
            json_logs: false,
        }
    }
}
