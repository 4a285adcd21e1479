//! Access to the boop entry point contract.
//!
//! Everything the submitter needs from the chain goes through [`ChainGateway`] (nonce reads, dry-run simulation
//! and submission) and [`ReceiptTracker`] (fire-and-forget receipt monitoring). The production implementations
//! talk to an EVM node over JSON-RPC, see [`eth`].

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use bp_boop::{Boop, SimulationOutput};

pub mod error;
pub mod eth;
mod receipt;

pub use error::ChainError;
#[cfg(any(test, feature = "testing"))]
pub use receipt::MockReceiptTracker;
pub use receipt::{EthereumReceiptTracker, NoopReceiptTracker, ReceiptTracker, ReceiptTrackerConfig};

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Next nonce value the entry point will accept for this account and nonce track.
    async fn read_nonce(&self, entry_point: Address, account: Address, nonce_track: U256) -> Result<U256, ChainError>;

    /// Dry-runs the boop from the zero address. This never changes chain state nor requires gas.
    ///
    /// Entry point reverts are part of the returned [`SimulationOutput`]: only transport and decoding failures are
    /// returned as errors.
    async fn simulate(&self, entry_point: Address, boop: &Boop) -> Result<SimulationOutput, ChainError>;

    /// Sends the boop on-chain from the `executor` account and returns the EVM transaction hash.
    async fn submit(
        &self,
        entry_point: Address,
        boop: &Boop,
        executor: Address,
        gas_limit: u64,
    ) -> Result<TxHash, ChainError>;
}
