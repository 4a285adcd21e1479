use alloy::primitives::Address;
use bc_submitter::{AdmissionLimits, SimulationCacheConfig, SubmitterConfig};
use bp_utils::parsers::parse_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, clap::Args, Deserialize, Serialize)]
pub struct SubmitterParams {
    /// Maximum number of boops waiting on their preceding nonces, per nonce track. Boops further ahead of the
    /// expected nonce than this are refused.
    #[arg(env = "BOOP_BUFFER_LIMIT", long, default_value_t = 50)]
    pub buffer_limit: usize,

    /// Maximum number of boops waiting on their preceding nonces, across all tracks.
    #[arg(env = "BOOP_MAX_CAPACITY", long, default_value_t = 10_000)]
    pub max_capacity: usize,

    /// Time a boop may wait on its preceding nonces before being dropped.
    #[arg(env = "BOOP_ADMISSION_TIMEOUT", long, value_parser = parse_duration, default_value = "30s")]
    pub admission_timeout: Duration,

    /// Number of simulation outcomes kept in memory.
    #[arg(env = "BOOP_SIMULATION_CACHE_CAPACITY", long, default_value_t = 10_000)]
    pub simulation_cache_capacity: usize,

    #[arg(env = "BOOP_SIMULATION_CACHE_TTL", long, value_parser = parse_duration, default_value = "1min")]
    pub simulation_cache_ttl: Duration,

    /// How long a nonce track keeps the same executor after its last boop.
    #[arg(env = "BOOP_EXECUTOR_TTL", long, value_parser = parse_duration, default_value = "30s")]
    pub executor_ttl: Duration,

    /// Time after which the local nonce of an unused track is dropped and read from the chain again.
    #[arg(env = "BOOP_NONCE_IDLE_TTL", long, value_parser = parse_duration, default_value = "5min")]
    pub nonce_idle_ttl: Duration,

    /// Percentage added to the simulated gas when filling the gas limits of sponsored boops.
    #[arg(env = "BOOP_GAS_SAFETY_MARGIN", long, default_value_t = 20)]
    pub gas_safety_margin_percent: u32,

    /// Gas added on top of the boop gas limit for the entry point overhead.
    #[arg(env = "BOOP_ENTRY_POINT_GAS_BUFFER", long, default_value_t = 50_000)]
    pub entry_point_gas_buffer: u64,
}

impl SubmitterParams {
    pub fn as_submitter_config(&self, chain_id: u64, entry_point: Address) -> SubmitterConfig {
        SubmitterConfig {
            chain_id,
            entry_point,
            admission: AdmissionLimits {
                buffer_limit: self.buffer_limit,
                max_capacity: self.max_capacity,
                timeout: self.admission_timeout,
            },
            simulation_cache: SimulationCacheConfig {
                capacity: self.simulation_cache_capacity,
                ttl: self.simulation_cache_ttl,
            },
            executor_ttl: self.executor_ttl,
            nonce_idle_ttl: self.nonce_idle_ttl,
            gas_safety_margin_percent: self.gas_safety_margin_percent,
            entry_point_gas_buffer: self.entry_point_gas_buffer,
        }
    }
}
