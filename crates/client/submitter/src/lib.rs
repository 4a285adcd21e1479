//! Nonce admission and submission of boops.
//!
//! A [`Submitter`] receives boops from any number of concurrent callers. Boops of a given nonce track go on-chain in
//! strictly increasing nonce order: a boop ahead of the next expected nonce is held back by the [`AdmissionGate`]
//! until its predecessor is submitted. Different tracks never wait on each other.

use alloy::primitives::Address;
use std::time::Duration;

pub mod admission;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod nonce;
mod pipeline;
pub mod simulation_cache;

pub use admission::{AdmissionGate, AdmissionLimits, BlockedBoop};
pub use error::{AdmissionError, SubmitBoopError};
pub use nonce::NonceStore;
pub use pipeline::{SubmitReceipt, Submitter};
pub use simulation_cache::{SimulationCache, SimulationCacheConfig};

#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub chain_id: u64,
    /// Entry point contract every boop is simulated against and submitted to.
    pub entry_point: Address,
    pub admission: AdmissionLimits,
    pub simulation_cache: SimulationCacheConfig,
    /// How long a nonce track keeps its executor after its last submission.
    pub executor_ttl: Duration,
    /// Time after which the local nonce of an unused track is forgotten.
    pub nonce_idle_ttl: Duration,
    /// Margin added on top of simulated gas when filling the gas limits of sponsored boops.
    pub gas_safety_margin_percent: u32,
    /// Gas added to the boop gas limit for the entry point's own overhead.
    pub entry_point_gas_buffer: u64,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self::new(1, Address::ZERO)
    }
}

impl SubmitterConfig {
    pub fn new(chain_id: u64, entry_point: Address) -> Self {
        Self {
            chain_id,
            entry_point,
            admission: AdmissionLimits::default(),
            simulation_cache: SimulationCacheConfig::default(),
            executor_ttl: Duration::from_secs(30),
            nonce_idle_ttl: nonce::DEFAULT_IDLE_TTL,
            gas_safety_margin_percent: 20,
            entry_point_gas_buffer: 50_000,
        }
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn for_testing() -> Self {
        Self {
            admission: AdmissionLimits::for_testing(),
            simulation_cache: SimulationCacheConfig::for_testing(),
            ..Self::new(31337, Address::repeat_byte(0xe1))
        }
    }

    pub fn with_admission(mut self, admission: AdmissionLimits) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_simulation_cache(mut self, simulation_cache: SimulationCacheConfig) -> Self {
        self.simulation_cache = simulation_cache;
        self
    }

    pub fn with_nonce_idle_ttl(mut self, nonce_idle_ttl: Duration) -> Self {
        self.nonce_idle_ttl = nonce_idle_ttl;
        self
    }
}
