use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use async_trait::async_trait;
use bc_chain::{ChainError, ChainGateway};
use bp_boop::{Boop, EntryPointStatus, GasEstimates, NonceKey, SimulationOutput, ValidationStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const ENTRY_POINT: Address = Address::repeat_byte(0xe1);
pub const EXECUTOR: Address = Address::repeat_byte(0x01);
pub const CHAIN_ID: u64 = 31337;

/// In-memory entry point: nonces only move when a boop carrying exactly the expected nonce is submitted.
#[derive(Default)]
pub struct FakeChain {
    latency: Duration,
    nonces: Mutex<HashMap<NonceKey, U256>>,
    submitted: Mutex<Vec<Boop>>,
    simulations: AtomicUsize,
}

impl FakeChain {
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency, ..Default::default() }
    }

    pub fn set_nonce(&self, key: NonceKey, nonce: u64) {
        self.nonces.lock().unwrap().insert(key, U256::from(nonce));
    }

    pub fn nonce(&self, key: NonceKey) -> U256 {
        self.nonces.lock().unwrap().get(&key).copied().unwrap_or_default()
    }

    pub fn submitted(&self) -> Vec<Boop> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_nonces(&self, key: NonceKey) -> Vec<u64> {
        self.submitted()
            .iter()
            .filter(|boop| boop.nonce_key() == key)
            .map(|boop| boop.nonce_value.to::<u64>())
            .collect()
    }

    pub fn simulations(&self) -> usize {
        self.simulations.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ChainGateway for FakeChain {
    async fn read_nonce(&self, _entry_point: Address, account: Address, nonce_track: U256) -> Result<U256, ChainError> {
        self.round_trip().await;
        Ok(self.nonce(NonceKey::new(account, nonce_track)))
    }

    async fn simulate(&self, entry_point: Address, boop: &Boop) -> Result<SimulationOutput, ChainError> {
        self.round_trip().await;
        self.simulations.fetch_add(1, Ordering::SeqCst);
        let expected = self.nonce(boop.nonce_key());
        let validation_status = match boop.nonce_value.cmp(&expected) {
            std::cmp::Ordering::Less => {
                return Ok(SimulationOutput::reverted(entry_point, EntryPointStatus::InvalidNonce, Bytes::new()));
            }
            std::cmp::Ordering::Equal => ValidationStatus::Success,
            std::cmp::Ordering::Greater => ValidationStatus::FutureNonce,
        };
        Ok(SimulationOutput {
            entry_point,
            status: EntryPointStatus::Success,
            validation_status,
            revert_data: Bytes::new(),
            gas: GasEstimates { gas: 80_000, validate_gas: 8_000, validate_payment_gas: 4_000, execute_gas: 40_000 },
        })
    }

    async fn submit(
        &self,
        _entry_point: Address,
        boop: &Boop,
        executor: Address,
        _gas_limit: u64,
    ) -> Result<TxHash, ChainError> {
        self.round_trip().await;
        if executor != EXECUTOR {
            return Err(ChainError::UnknownExecutor(executor));
        }
        let mut nonces = self.nonces.lock().unwrap();
        let expected = nonces.entry(boop.nonce_key()).or_default();
        if boop.nonce_value != *expected {
            return Err(ChainError::Reverted { status: EntryPointStatus::InvalidNonce, revert_data: Bytes::new() });
        }
        *expected += U256::from(1);

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(boop.clone());
        Ok(B256::from(U256::from(submitted.len())))
    }
}

pub fn boop(account: Address, track: u64, nonce: u64) -> Boop {
    Boop {
        account,
        payer: Address::repeat_byte(0xfe),
        nonce_track: U256::from(track),
        nonce_value: U256::from(nonce),
        call_data: Bytes::from_static(b"transfer"),
        ..Default::default()
    }
}
