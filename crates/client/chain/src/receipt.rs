use alloy::network::ReceiptResponse;
use alloy::primitives::TxHash;
use alloy::providers::{DynProvider, Provider};
use bp_boop::BoopHash;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

/// Follows a submitted boop until its EVM transaction lands. Tracking is fire-and-forget: implementations must
/// return immediately and must never block the submission response.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ReceiptTracker: Send + Sync {
    fn track(&self, boop_hash: BoopHash, tx_hash: TxHash);
}

#[derive(Clone, Debug)]
pub struct ReceiptTrackerConfig {
    pub poll_interval: Duration,
    /// Time after which a receipt that has not shown up is reported as missing.
    pub timeout: Duration,
}

impl Default for ReceiptTrackerConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(2), timeout: Duration::from_secs(120) }
    }
}

/// Polls `eth_getTransactionReceipt` in a background task and logs the outcome.
pub struct EthereumReceiptTracker {
    provider: DynProvider,
    config: ReceiptTrackerConfig,
    tasks: TaskTracker,
}

impl EthereumReceiptTracker {
    pub fn new(provider: DynProvider, config: ReceiptTrackerConfig) -> Self {
        Self { provider, config, tasks: TaskTracker::new() }
    }

    /// Waits for every receipt being tracked to land or time out. Boops tracked afterwards are still followed.
    pub async fn wait(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }
}

impl ReceiptTracker for EthereumReceiptTracker {
    fn track(&self, boop_hash: BoopHash, tx_hash: TxHash) {
        let provider = self.provider.clone();
        let ReceiptTrackerConfig { poll_interval, timeout } = self.config.clone();

        self.tasks.spawn(async move {
            let deadline = Instant::now() + timeout;
            loop {
                match provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => {
                        if receipt.status() {
                            tracing::info!(
                                boop_hash = %boop_hash,
                                tx_hash = %tx_hash,
                                block_number = ?receipt.block_number(),
                                "Boop included"
                            );
                        } else {
                            tracing::warn!(boop_hash = %boop_hash, tx_hash = %tx_hash, "Boop transaction reverted");
                        }
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => tracing::debug!(tx_hash = %tx_hash, "Receipt polling error: {err:#}"),
                }
                if Instant::now() >= deadline {
                    tracing::warn!(boop_hash = %boop_hash, tx_hash = %tx_hash, ?timeout, "No receipt for boop transaction");
                    return;
                }
                tokio::time::sleep(poll_interval).await;
            }
        });
    }
}

/// Tracker that only logs the hand-off. Used for dry runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReceiptTracker;

impl ReceiptTracker for NoopReceiptTracker {
    fn track(&self, boop_hash: BoopHash, tx_hash: TxHash) {
        tracing::debug!(boop_hash = %boop_hash, tx_hash = %tx_hash, "Receipt tracking disabled");
    }
}
