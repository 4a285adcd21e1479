use alloy::primitives::{Address, Bytes};
use bp_boop::EntryPointStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Ethereum RPC error: {0}")]
    Rpc(String),

    #[error("Contract interaction failed: {0}")]
    Contract(String),

    #[error("Entry point reverted with status {status}")]
    Reverted { status: EntryPointStatus, revert_data: Bytes },

    #[error("Executor {0} is not registered with the submitter wallet")]
    UnknownExecutor(Address),

    #[error("Invalid chain gateway configuration: {0}")]
    Config(String),
}

impl ChainError {
    /// Returns true if the error is a transient network issue rather than a rejection of the boop.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}
