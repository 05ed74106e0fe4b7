//! Command-line argument definitions using clap.

use std::path::PathBuf;

use brine_node::{NodeConfig, UpdatePolicy};
use clap::{ArgAction, Parser};

/// Run a brine gossip-averaging node.
///
/// The node announces its estimate over UDP multicast and broadcast and
/// folds in what its peers announce. Values given here override the
/// configuration file.
#[derive(Parser, Debug)]
#[command(name = "brined")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); defaults are used if it does not exist
    #[arg(short, long, env = "BRINE_CONFIG", default_value = "brine.toml")]
    pub config: PathBuf,

    /// Update policy: sum_then_announce or average_with_floor
    #[arg(long)]
    pub policy: Option<UpdatePolicy>,

    /// Local measurement used before any peer value arrives
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<f64>,

    /// Identifier stamped on our announces (random if unset)
    #[arg(long)]
    pub source_id: Option<u32>,

    /// Log every accepted incoming value
    #[arg(long)]
    pub trace_incoming: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut NodeConfig) {
        if let Some(policy) = self.policy {
            config.estimate.policy = policy;
        }
        if let Some(seed) = self.seed {
            config.estimate.measured_seed_value = seed;
        }
        if self.source_id.is_some() {
            config.source_id = self.source_id;
        }
        if self.trace_incoming {
            config.trace_incoming = true;
        }
    }
}
