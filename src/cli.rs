//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Canopy - subtree lookup server over flat row files
///
/// Serves parent/child records from delimited files, keeping one
/// in-memory tree per source and refreshing it in the background when
/// the backing file changes.
#[derive(Parser, Debug)]
#[command(name = "canopy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "CANOPY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address override (host:port)
    #[arg(short, long)]
    pub listen: Option<String>,
}
