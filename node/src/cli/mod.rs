pub mod analytics;
pub mod chain;
pub mod submitter;

pub use analytics::*;
pub use chain::*;
pub use submitter::*;

use bc_submitter::SubmitterConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Boop submitter: simulates boops and sends them to the entry point, in nonce order.
#[derive(Clone, Debug, clap::Parser, Deserialize, Serialize)]
#[command(author, version, about, long_about = None)]
pub struct RunCmd {
    /// Load the parameters from a toml, json or yaml file. Values from the file take precedence over the
    /// command line.
    #[arg(env = "BOOP_CONFIG_FILE", long, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub chain_params: ChainParams,

    #[clap(flatten)]
    pub submitter_params: SubmitterParams,

    #[clap(flatten)]
    pub analytics_params: AnalyticsParams,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, clap::Subcommand, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Simulate boops against the entry point, without sending anything.
    Simulate {
        /// JSON file holding a boop. Can be repeated.
        #[arg(long = "boop", value_name = "FILE", required = true)]
        boops: Vec<PathBuf>,
    },
    /// Submit boops concurrently and wait for their receipts.
    Submit {
        /// JSON file holding a boop. Can be repeated, boops of the same nonce track are sent in nonce order.
        #[arg(long = "boop", value_name = "FILE", required = true)]
        boops: Vec<PathBuf>,
    },
}

impl RunCmd {
    pub fn submitter_config(&self) -> SubmitterConfig {
        self.submitter_params.as_submitter_config(self.chain_params.chain_id, self.chain_params.entry_point)
    }
}
