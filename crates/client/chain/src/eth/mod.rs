use crate::error::ChainError;
use crate::ChainGateway;
use alloy::eips::BlockId;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, FixedBytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolError;
use async_trait::async_trait;
use bp_boop::{Boop, CallStatus, EntryPointStatus, GasEstimates, SimulationOutput, ValidationStatus};
use url::Url;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IEntryPoint {
        struct SubmitOutput {
            uint32 gas;
            uint32 validateGas;
            uint32 validatePaymentGas;
            uint32 executeGas;
            bytes4 validationStatus;
            uint8 callStatus;
            bytes revertData;
        }

        error InvalidNonce();
        error ValidationReverted(bytes revertData);
        error ValidationRejected(bytes reason);
        error PaymentValidationReverted(bytes revertData);
        error PaymentValidationRejected(bytes reason);
        error UnknownDuringSimulation();
        error FutureNonceDuringSimulation();

        function nonceValues(address account, uint256 nonceTrack) external view returns (uint256);
        function submit(bytes calldata encodedBoop) external returns (SubmitOutput memory output);
    }
}

#[derive(Clone, Debug)]
pub struct ChainGatewayConfig {
    pub rpc_url: Url,
    /// Private keys of the executor accounts sending the boops on-chain.
    pub executor_keys: Vec<String>,
}

/// [`ChainGateway`] over JSON-RPC. Every executor key is registered in a single wallet, the signer is then picked
/// by the `from` address of each submission.
#[derive(Clone, Debug)]
pub struct EthereumChainGateway {
    provider: DynProvider,
    executors: Vec<Address>,
}

impl EthereumChainGateway {
    pub fn new(config: &ChainGatewayConfig) -> Result<Self, ChainError> {
        let signers = config
            .executor_keys
            .iter()
            .map(|key| key.trim().parse::<PrivateKeySigner>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ChainError::Config(format!("Invalid executor private key: {e}")))?;

        let executors: Vec<Address> = signers.iter().map(|signer| signer.address()).collect();
        let mut signers = signers.into_iter();
        let provider = match signers.next() {
            Some(first) => {
                let mut wallet = EthereumWallet::new(first);
                for signer in signers {
                    wallet.register_signer(signer);
                }
                ProviderBuilder::new().wallet(wallet).connect_http(config.rpc_url.clone()).erased()
            }
            // Read-only: nonce reads and simulations need no signer, submissions are refused.
            None => ProviderBuilder::new().connect_http(config.rpc_url.clone()).erased(),
        };
        tracing::debug!(executors = executors.len(), rpc_url = %config.rpc_url, "Chain gateway initialized");
        Ok(Self { provider, executors })
    }

    /// Addresses of the registered executor accounts, in configuration order.
    pub fn executors(&self) -> &[Address] {
        &self.executors
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

#[async_trait]
impl ChainGateway for EthereumChainGateway {
    async fn read_nonce(&self, entry_point: Address, account: Address, nonce_track: U256) -> Result<U256, ChainError> {
        let entry_point = IEntryPoint::new(entry_point, &self.provider);
        // Pending state, so that boops already sent but not yet mined are accounted for.
        Ok(entry_point.nonceValues(account, nonce_track).block(BlockId::pending()).call().await?)
    }

    async fn simulate(&self, entry_point: Address, boop: &Boop) -> Result<SimulationOutput, ChainError> {
        let contract = IEntryPoint::new(entry_point, &self.provider);
        // The entry point enables simulation mode when called from the zero address.
        match contract.submit(boop.encode()).from(Address::ZERO).call().await {
            Ok(output) => simulation_output(entry_point, output),
            Err(err) => match ChainError::from(err) {
                ChainError::Reverted { status, revert_data } => {
                    Ok(SimulationOutput::reverted(entry_point, status, revert_data))
                }
                err => Err(err),
            },
        }
    }

    async fn submit(
        &self,
        entry_point: Address,
        boop: &Boop,
        executor: Address,
        gas_limit: u64,
    ) -> Result<TxHash, ChainError> {
        if !self.executors.contains(&executor) {
            return Err(ChainError::UnknownExecutor(executor));
        }
        let contract = IEntryPoint::new(entry_point, &self.provider);
        let pending = contract.submit(boop.encode()).from(executor).gas(gas_limit).send().await?;
        Ok(*pending.tx_hash())
    }
}

impl From<alloy::contract::Error> for ChainError {
    fn from(err: alloy::contract::Error) -> Self {
        if let Some(revert_data) = err.as_revert_data() {
            return ChainError::Reverted { status: revert_status(&revert_data), revert_data };
        }
        match err {
            alloy::contract::Error::TransportError(e) => ChainError::Rpc(e.to_string()),
            other => ChainError::Contract(other.to_string()),
        }
    }
}

/// Maps an entry point revert payload to a status, using the error selector.
pub fn revert_status(revert_data: &[u8]) -> EntryPointStatus {
    let Some(selector) = revert_data.get(..4) else {
        return EntryPointStatus::UnexpectedReverted;
    };
    if selector == IEntryPoint::InvalidNonce::SELECTOR {
        EntryPointStatus::InvalidNonce
    } else if selector == IEntryPoint::ValidationReverted::SELECTOR {
        EntryPointStatus::ValidationReverted
    } else if selector == IEntryPoint::ValidationRejected::SELECTOR {
        EntryPointStatus::ValidationFailed
    } else if selector == IEntryPoint::PaymentValidationReverted::SELECTOR {
        EntryPointStatus::PaymentValidationReverted
    } else if selector == IEntryPoint::PaymentValidationRejected::SELECTOR {
        EntryPointStatus::PaymentValidationFailed
    } else {
        EntryPointStatus::UnexpectedReverted
    }
}

pub fn validation_status(selector: FixedBytes<4>) -> ValidationStatus {
    if selector.is_zero() {
        ValidationStatus::Success
    } else if selector.0 == IEntryPoint::UnknownDuringSimulation::SELECTOR {
        ValidationStatus::Unknown
    } else if selector.0 == IEntryPoint::FutureNonceDuringSimulation::SELECTOR {
        ValidationStatus::FutureNonce
    } else {
        ValidationStatus::Failed
    }
}

fn simulation_output(entry_point: Address, output: IEntryPoint::SubmitOutput) -> Result<SimulationOutput, ChainError> {
    let call_status = CallStatus::try_from(output.callStatus).map_err(|e| ChainError::Contract(e.to_string()))?;
    let status = EntryPointStatus::from(call_status);
    let revert_data = if status == EntryPointStatus::Success { Bytes::new() } else { output.revertData };
    Ok(SimulationOutput {
        entry_point,
        status,
        validation_status: validation_status(output.validationStatus),
        revert_data,
        gas: GasEstimates {
            gas: output.gas,
            validate_gas: output.validateGas,
            validate_payment_gas: output.validatePaymentGas,
            execute_gas: output.executeGas,
        },
    })
}
