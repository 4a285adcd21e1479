use crate::admission::{AdmissionGate, BlockedBoop};
use crate::error::SubmitBoopError;
use crate::executor::ExecutorCache;
use crate::metrics::SubmitterMetrics;
use crate::nonce::NonceStore;
use crate::simulation_cache::SimulationCache;
use crate::SubmitterConfig;
use alloy::primitives::{Address, TxHash};
use bc_chain::{ChainError, ChainGateway, ReceiptTracker};
use bp_boop::{Boop, BoopHash, EntryPointStatus, SimulationOutput};
use dashmap::DashSet;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub boop_hash: BoopHash,
    pub tx_hash: TxHash,
}

/// Simulates boops, holds them back until their nonce comes up, and sends them on-chain.
pub struct Submitter {
    config: SubmitterConfig,
    gateway: Arc<dyn ChainGateway>,
    receipts: Arc<dyn ReceiptTracker>,
    gate: AdmissionGate,
    simulations: SimulationCache,
    executors: ExecutorCache,
    processing: DashSet<BoopHash>,
    metrics: SubmitterMetrics,
}

impl Submitter {
    pub fn new(
        config: SubmitterConfig,
        gateway: Arc<dyn ChainGateway>,
        receipts: Arc<dyn ReceiptTracker>,
        executors: Vec<Address>,
    ) -> Self {
        let nonces = NonceStore::with_idle_ttl(Arc::clone(&gateway), config.nonce_idle_ttl);
        let gate = AdmissionGate::new(nonces, config.admission.clone());
        let simulations = SimulationCache::new(&config.simulation_cache);
        let executors = ExecutorCache::new(executors, config.executor_ttl);
        Self {
            config,
            gateway,
            receipts,
            gate,
            simulations,
            executors,
            processing: DashSet::new(),
            metrics: SubmitterMetrics::register(),
        }
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    pub fn admission(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn boop_hash(&self, boop: &Boop) -> BoopHash {
        boop.hash(self.config.chain_id)
    }

    pub fn get_blocked_boops(&self, account: Address) -> Vec<BlockedBoop> {
        self.gate.get_blocked_boops(account)
    }

    /// Simulation outcome of the boop, from the cache when it was simulated recently.
    pub async fn simulate(&self, boop: &Boop) -> Result<SimulationOutput, SubmitBoopError> {
        let boop_hash = self.boop_hash(boop);
        if let Some(output) = self.simulations.get(&boop_hash).await {
            self.metrics.simulation_cache_hit_counter.add(1, &[]);
            return Ok(output);
        }
        self.metrics.simulation_cache_miss_counter.add(1, &[]);
        self.simulate_fresh(boop, boop_hash).await
    }

    async fn simulate_fresh(&self, boop: &Boop, boop_hash: BoopHash) -> Result<SimulationOutput, SubmitBoopError> {
        let output = self
            .gateway
            .simulate(self.config.entry_point, &boop.with_gas_hotfix())
            .await
            .map_err(SubmitBoopError::Gateway)?;

        if output.status == EntryPointStatus::InvalidNonce {
            // Our idea of the next nonce may be what is wrong.
            self.gate.nonces().reset_local_nonce(boop.nonce_key()).await;
        }
        tracing::trace!(%boop_hash, status = %output.status, validation = %output.validation_status, "Simulated boop");
        self.simulations.set(boop_hash, output.clone()).await;
        Ok(output)
    }

    /// Submits the boop on-chain once every preceding nonce of its track went through.
    pub async fn submit(&self, boop: Boop) -> Result<SubmitReceipt, SubmitBoopError> {
        let boop_hash = self.boop_hash(&boop);
        let key = boop.nonce_key();
        let nonce = boop.nonce_value;

        let result = self.process(boop, boop_hash).await;
        match &result {
            Ok(receipt) => {
                self.metrics.boop_submitted_counter.add(1, &[]);
                tracing::info!(%boop_hash, tx_hash = %receipt.tx_hash, %key, %nonce, "Boop submitted");
            }
            Err(err @ (SubmitBoopError::Gateway(_) | SubmitBoopError::SubmissionFailed(_))) => {
                self.metrics.record_rejection(err.status());
                tracing::warn!(%boop_hash, %key, %nonce, status = err.status(), "Boop submission failed: {err}");
            }
            Err(err) => {
                self.metrics.record_rejection(err.status());
                tracing::debug!(%boop_hash, %key, %nonce, status = err.status(), "Boop rejected: {err}");
            }
        }
        self.metrics.record_buffered(self.gate.pending_count());
        result
    }

    async fn process(&self, mut boop: Boop, boop_hash: BoopHash) -> Result<SubmitReceipt, SubmitBoopError> {
        let _processing = self.start_processing(boop_hash)?;
        let entry_point = self.config.entry_point;
        let key = boop.nonce_key();

        let mut simulation = self.simulate(&boop).await?;
        if !simulation.is_admissible() {
            return Err(SubmitBoopError::SimulationRejected(simulation));
        }

        if self.gate.check_if_blocked(entry_point, &boop).await? {
            let started = Instant::now();
            self.gate.pause_until_unblocked(entry_point, &boop, boop_hash).await?;
            self.metrics.admission_wait_time.record(started.elapsed().as_secs_f64(), &[]);

            // The chain moved while waiting.
            simulation = self.simulate_fresh(&boop, boop_hash).await?;
            if !simulation.is_admissible() {
                return Err(SubmitBoopError::SimulationRejected(simulation));
            }
        }

        boop.apply_gas_estimates(&simulation.gas, self.config.gas_safety_margin_percent);
        let executor = self
            .executors
            .get(key)
            .ok_or_else(|| SubmitBoopError::Gateway(ChainError::Config("No executor configured".into())))?;
        let gas_limit = u64::from(boop.gas_limit) + self.config.entry_point_gas_buffer;

        let tx_hash = match self.gateway.submit(entry_point, &boop, executor, gas_limit).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => {
                self.gate.nonces().reset_local_nonce(key).await;
                self.simulations.remove(&boop_hash).await;
                return Err(SubmitBoopError::SubmissionFailed(err));
            }
        };

        self.gate.increment_local_nonce(&boop).await;
        self.receipts.track(boop_hash, tx_hash);
        Ok(SubmitReceipt { boop_hash, tx_hash })
    }

    fn start_processing(&self, boop_hash: BoopHash) -> Result<ProcessingGuard<'_>, SubmitBoopError> {
        if !self.processing.insert(boop_hash) {
            return Err(SubmitBoopError::AlreadyProcessing(boop_hash));
        }
        Ok(ProcessingGuard { processing: &self.processing, boop_hash })
    }
}

struct ProcessingGuard<'a> {
    processing: &'a DashSet<BoopHash>,
    boop_hash: BoopHash,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.processing.remove(&self.boop_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdmissionError;
    use alloy::primitives::{Bytes, B256, U256};
    use assert_matches::assert_matches;
    use bc_chain::{MockChainGateway, MockReceiptTracker};
    use bp_boop::{GasEstimates, NonceKey, ValidationStatus};
    use rstest::rstest;

    const ACCOUNT: Address = Address::repeat_byte(0xaa);
    const PAYMASTER: Address = Address::repeat_byte(0xbb);
    const EXECUTOR: Address = Address::repeat_byte(0x01);
    const TX_HASH: B256 = B256::repeat_byte(0x77);

    fn sponsored_boop(nonce: u64) -> Boop {
        Boop {
            account: ACCOUNT,
            payer: PAYMASTER,
            nonce_value: U256::from(nonce),
            call_data: Bytes::from_static(b"call"),
            ..Default::default()
        }
    }

    fn simulation(validation_status: ValidationStatus) -> SimulationOutput {
        SimulationOutput {
            entry_point: SubmitterConfig::for_testing().entry_point,
            status: EntryPointStatus::Success,
            validation_status,
            revert_data: Bytes::new(),
            gas: GasEstimates { gas: 100_000, validate_gas: 10_000, validate_payment_gas: 5_000, execute_gas: 50_000 },
        }
    }

    fn submitter(gateway: MockChainGateway, receipts: MockReceiptTracker) -> Arc<Submitter> {
        Arc::new(Submitter::new(SubmitterConfig::for_testing(), Arc::new(gateway), Arc::new(receipts), vec![EXECUTOR]))
    }

    fn no_receipts() -> MockReceiptTracker {
        let mut receipts = MockReceiptTracker::new();
        receipts.expect_track().never();
        receipts
    }

    #[rstest]
    #[tokio::test]
    async fn sponsored_boop_is_filled_and_submitted() {
        let boop = sponsored_boop(0);
        let boop_hash = boop.hash(SubmitterConfig::for_testing().chain_id);

        let mut gateway = MockChainGateway::new();
        gateway.expect_read_nonce().times(1).returning(|_, _, _| Ok(U256::ZERO));
        gateway
            .expect_simulate()
            .withf(|_, boop| boop.gas_limit == bp_boop::SIMULATION_HOTFIX_GAS_LIMIT)
            .times(1)
            .returning(|_, _| Ok(simulation(ValidationStatus::Success)));
        gateway
            .expect_submit()
            .withf(|_, boop, executor, gas_limit| {
                boop.gas_limit == 120_000
                    && boop.execute_gas_limit == 60_000
                    && *executor == EXECUTOR
                    && *gas_limit == 170_000
            })
            .times(1)
            .returning(|_, _, _, _| Ok(TX_HASH));
        let mut receipts = MockReceiptTracker::new();
        receipts.expect_track().withf(move |boop, tx| *boop == boop_hash && *tx == TX_HASH).times(1).return_const(());

        let submitter = submitter(gateway, receipts);
        let receipt = submitter.submit(boop.clone()).await.unwrap();
        assert_eq!(receipt, SubmitReceipt { boop_hash, tx_hash: TX_HASH });
        assert_eq!(submitter.admission().nonces().cached(boop.nonce_key()), Some(U256::from(1)));
    }

    #[rstest]
    #[case(SimulationOutput::reverted(Address::ZERO, EntryPointStatus::ValidationReverted, Bytes::new()), "simulationReverted")]
    #[case(SimulationOutput { status: EntryPointStatus::ExecuteFailed, ..simulation(ValidationStatus::Success) }, "simulationFailed")]
    #[case(simulation(ValidationStatus::Unknown), "simulationFailed")]
    #[case(simulation(ValidationStatus::Failed), "simulationFailed")]
    #[tokio::test]
    async fn failed_simulation_is_rejected(#[case] output: SimulationOutput, #[case] status: &str) {
        let mut gateway = MockChainGateway::new();
        gateway.expect_simulate().times(1).returning(move |_, _| Ok(output.clone()));
        gateway.expect_read_nonce().never();
        gateway.expect_submit().never();

        let err = submitter(gateway, no_receipts()).submit(sponsored_boop(0)).await.unwrap_err();
        assert_matches!(err, SubmitBoopError::SimulationRejected(_));
        assert_eq!(err.status(), status);
    }

    #[rstest]
    #[tokio::test]
    async fn invalid_nonce_simulation_resets_local_nonce() {
        let key = NonceKey::new(ACCOUNT, U256::ZERO);
        let mut gateway = MockChainGateway::new();
        gateway.expect_read_nonce().times(1).returning(|_, _, _| Ok(U256::from(3)));
        gateway.expect_simulate().times(1).returning(|_, _| {
            Ok(SimulationOutput::reverted(Address::ZERO, EntryPointStatus::InvalidNonce, Bytes::new()))
        });
        let submitter = submitter(gateway, no_receipts());

        let entry_point = submitter.config().entry_point;
        submitter.admission().nonces().get_local_nonce(entry_point, key).await.unwrap();
        assert_eq!(submitter.admission().nonces().cached(key), Some(U256::from(3)));

        let err = submitter.submit(sponsored_boop(2)).await.unwrap_err();
        assert_eq!(err.status(), "simulationReverted");
        assert_eq!(submitter.admission().nonces().cached(key), None);
    }

    #[rstest]
    #[tokio::test]
    async fn submission_failure_resets_local_nonce() {
        let mut gateway = MockChainGateway::new();
        gateway.expect_read_nonce().times(2).returning(|_, _, _| Ok(U256::ZERO));
        gateway.expect_simulate().times(2).returning(|_, _| Ok(simulation(ValidationStatus::Success)));
        gateway.expect_submit().times(2).returning(|_, _, _, _| Err(ChainError::Rpc("nonce too low".into())));
        let submitter = submitter(gateway, no_receipts());

        let err = submitter.submit(sponsored_boop(0)).await.unwrap_err();
        assert_matches!(&err, SubmitBoopError::SubmissionFailed(ChainError::Rpc(_)));
        assert_eq!(err.status(), "submissionFailed");
        assert_eq!(submitter.admission().nonces().cached(NonceKey::new(ACCOUNT, U256::ZERO)), None);

        // Neither the processing guard nor the simulation outcome outlive the failure.
        assert_matches!(submitter.submit(sponsored_boop(0)).await, Err(SubmitBoopError::SubmissionFailed(_)));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn duplicate_submission_is_refused_while_in_flight() {
        let mut gateway = MockChainGateway::new();
        gateway.expect_read_nonce().returning(|_, _, _| Ok(U256::ZERO));
        gateway.expect_simulate().returning(|_, _| Ok(simulation(ValidationStatus::FutureNonce)));
        gateway.expect_submit().never();
        let submitter = submitter(gateway, no_receipts());

        let boop = sponsored_boop(1);
        let first = tokio::spawn({
            let submitter = Arc::clone(&submitter);
            let boop = boop.clone();
            async move { submitter.submit(boop).await }
        });
        while submitter.admission().pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        let boop_hash = submitter.boop_hash(&boop);
        assert_matches!(
            submitter.submit(boop).await,
            Err(SubmitBoopError::AlreadyProcessing(hash)) if hash == boop_hash
        );
        assert_eq!(submitter.get_blocked_boops(ACCOUNT).len(), 1);

        assert_matches!(
            first.await.unwrap(),
            Err(SubmitBoopError::Rejected(AdmissionError::TransactionTimeout(_)))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn gateway_errors_are_not_rejections() {
        let mut gateway = MockChainGateway::new();
        gateway.expect_simulate().returning(|_, _| Err(ChainError::Rpc("connection reset".into())));
        let err = submitter(gateway, no_receipts()).simulate(&sponsored_boop(0)).await.unwrap_err();
        assert_matches!(err, SubmitBoopError::Gateway(ChainError::Rpc(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn without_executors_boops_are_simulated_but_not_sent() {
        let mut gateway = MockChainGateway::new();
        gateway.expect_read_nonce().returning(|_, _, _| Ok(U256::ZERO));
        gateway.expect_simulate().times(1).returning(|_, _| Ok(simulation(ValidationStatus::Success)));
        gateway.expect_submit().never();
        let submitter =
            Submitter::new(SubmitterConfig::for_testing(), Arc::new(gateway), Arc::new(no_receipts()), Vec::new());

        let boop = sponsored_boop(0);
        assert!(submitter.simulate(&boop).await.unwrap().is_ok());

        let err = submitter.submit(boop).await.unwrap_err();
        assert_matches!(&err, SubmitBoopError::Gateway(ChainError::Config(_)));
        assert_eq!(err.status(), "rpcError");
        assert_eq!(submitter.admission().pending_count(), 0);
    }
}
