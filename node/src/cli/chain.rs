use alloy::primitives::Address;
use bc_chain::eth::ChainGatewayConfig;
use bc_chain::ReceiptTrackerConfig;
use bp_utils::parsers::{parse_address, parse_duration, parse_url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct ChainParams {
    /// JSON-RPC endpoint of the EVM node.
    #[arg(env = "BOOP_RPC_URL", long, value_parser = parse_url, value_name = "URL", default_value = "http://localhost:8545")]
    pub rpc_url: Url,

    /// Chain id, part of every boop hash.
    #[arg(env = "BOOP_CHAIN_ID", long, value_name = "CHAIN ID")]
    pub chain_id: u64,

    /// Address of the entry point contract.
    #[arg(env = "BOOP_ENTRY_POINT", long, value_parser = parse_address, value_name = "ADDRESS")]
    pub entry_point: Address,

    /// Private keys of the executor accounts, comma separated. Boops are sent on-chain from these accounts.
    #[arg(env = "BOOP_EXECUTOR_KEYS", long = "executor-key", value_delimiter = ',', value_name = "PRIVATE KEY")]
    pub executor_keys: Vec<String>,

    /// Interval between two receipt polls for a submitted boop.
    #[arg(env = "BOOP_RECEIPT_POLL_INTERVAL", long, value_parser = parse_duration, default_value = "2s")]
    pub receipt_poll_interval: Duration,

    /// Time after which a submitted boop without receipt is reported as missing.
    #[arg(env = "BOOP_RECEIPT_TIMEOUT", long, value_parser = parse_duration, default_value = "2min")]
    pub receipt_timeout: Duration,

    /// Do not follow the receipts of submitted boops.
    #[arg(env = "BOOP_NO_RECEIPT_TRACKING", long)]
    pub no_receipt_tracking: bool,
}

impl ChainParams {
    pub fn as_gateway_config(&self) -> ChainGatewayConfig {
        ChainGatewayConfig { rpc_url: self.rpc_url.clone(), executor_keys: self.executor_keys.clone() }
    }

    pub fn as_receipt_config(&self) -> ReceiptTrackerConfig {
        ReceiptTrackerConfig { poll_interval: self.receipt_poll_interval, timeout: self.receipt_timeout }
    }
}
