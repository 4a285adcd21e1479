//! Boop primitives.
//!
//! A [`Boop`] is an account-abstraction meta-transaction routed through a single entry point contract. It is
//! identified by its [`BoopHash`], and ordered on-chain per [`NonceKey`] (account + nonce track).

use alloy::primitives::{keccak256, Address, Bytes, B256, I256, U256};
use alloy::sol;
use alloy::sol_types::SolValue;
use serde::{Deserialize, Serialize};

mod simulation;

pub use simulation::*;

/// Content hash of a boop, see [`Boop::hash`].
pub type BoopHash = B256;

/// Gas limit injected when simulating sponsored boops that do not carry any gas limit. The entry point fails
/// such simulations otherwise.
pub const SIMULATION_HOTFIX_GAS_LIMIT: u32 = 4_000_000_000;

sol! {
    /// ABI layout of a boop, as consumed by the entry point `submit` function.
    #[derive(Debug, PartialEq, Eq)]
    struct AbiBoop {
        address account;
        address dest;
        address payer;
        uint256 value;
        uint256 nonceTrack;
        uint256 nonceValue;
        uint256 maxFeePerGas;
        int256 submitterFee;
        uint32 gasLimit;
        uint32 validateGasLimit;
        uint32 validatePaymentGasLimit;
        uint32 executeGasLimit;
        bytes callData;
        bytes validatorData;
        bytes extraData;
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Malformed boop encoding: {0}")]
pub struct BoopDecodeError(#[from] alloy::sol_types::Error);

/// Per-account nonce lane. Boops are only ordered relative to other boops with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("{account}/{nonce_track}")]
pub struct NonceKey {
    pub account: Address,
    pub nonce_track: U256,
}

impl NonceKey {
    pub fn new(account: Address, nonce_track: U256) -> Self {
        Self { account, nonce_track }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boop {
    pub account: Address,
    pub dest: Address,
    /// Paymaster. Equal to `account` for self-paying boops.
    pub payer: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub nonce_track: U256,
    pub nonce_value: U256,
    #[serde(default)]
    pub max_fee_per_gas: U256,
    #[serde(default)]
    pub submitter_fee: I256,
    #[serde(default)]
    pub gas_limit: u32,
    #[serde(default)]
    pub validate_gas_limit: u32,
    #[serde(default)]
    pub validate_payment_gas_limit: u32,
    #[serde(default)]
    pub execute_gas_limit: u32,
    #[serde(default)]
    pub call_data: Bytes,
    #[serde(default)]
    pub validator_data: Bytes,
    #[serde(default)]
    pub extra_data: Bytes,
}

impl Boop {
    pub fn nonce_key(&self) -> NonceKey {
        NonceKey::new(self.account, self.nonce_track)
    }

    /// Whether somebody other than the account pays for this boop.
    pub fn is_sponsored(&self) -> bool {
        self.payer != self.account
    }

    pub fn encode(&self) -> Bytes {
        AbiBoop::from(self).abi_encode().into()
    }

    pub fn decode(data: &[u8]) -> Result<Self, BoopDecodeError> {
        Ok(<AbiBoop as SolValue>::abi_decode(data)?.into())
    }

    /// Computes the boop hash for the given chain.
    ///
    /// For sponsored boops, the gas limits and fee fields are left out of the hash: the submitter is allowed to fill
    /// them in after simulation, and doing so must not change the identity of the boop. Self-paying boops sign over
    /// every field.
    pub fn hash(&self, chain_id: u64) -> BoopHash {
        let hashed = if self.is_sponsored() { self.without_gas_values() } else { self.clone() };
        keccak256((AbiBoop::from(&hashed), U256::from(chain_id)).abi_encode())
    }

    fn without_gas_values(&self) -> Self {
        Self {
            max_fee_per_gas: U256::ZERO,
            submitter_fee: I256::ZERO,
            gas_limit: 0,
            validate_gas_limit: 0,
            validate_payment_gas_limit: 0,
            execute_gas_limit: 0,
            ..self.clone()
        }
    }

    pub fn needs_gas_hotfix(&self) -> bool {
        self.is_sponsored() && self.gas_limit == 0 && self.execute_gas_limit == 0
    }

    /// Returns the boop that should be simulated in place of this one. This is the boop itself, unless it is a
    /// sponsored boop without gas limits, in which case [`SIMULATION_HOTFIX_GAS_LIMIT`] is used. The returned boop
    /// must never be submitted.
    pub fn with_gas_hotfix(&self) -> Self {
        if !self.needs_gas_hotfix() {
            return self.clone();
        }
        Self { gas_limit: SIMULATION_HOTFIX_GAS_LIMIT, execute_gas_limit: SIMULATION_HOTFIX_GAS_LIMIT, ..self.clone() }
    }

    /// Fills the gas limits that were left at zero with the simulated estimates, plus a safety margin.
    /// Values supplied by the user are never overridden, and self-paying boops are left untouched as their
    /// signature covers the gas limits.
    pub fn apply_gas_estimates(&mut self, estimates: &GasEstimates, margin_percent: u32) {
        if !self.is_sponsored() {
            return;
        }
        fill_gas(&mut self.gas_limit, estimates.gas, margin_percent);
        fill_gas(&mut self.validate_gas_limit, estimates.validate_gas, margin_percent);
        fill_gas(&mut self.validate_payment_gas_limit, estimates.validate_payment_gas, margin_percent);
        fill_gas(&mut self.execute_gas_limit, estimates.execute_gas, margin_percent);
    }
}

fn fill_gas(limit: &mut u32, estimate: u32, margin_percent: u32) {
    if *limit == 0 {
        *limit = with_margin(estimate, margin_percent);
    }
}

/// `ceil(value * (100 + margin_percent) / 100)`, saturating at `u32::MAX`.
pub fn with_margin(value: u32, margin_percent: u32) -> u32 {
    let scaled = (u64::from(value) * (100 + u64::from(margin_percent))).div_ceil(100);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

impl From<&Boop> for AbiBoop {
    fn from(boop: &Boop) -> Self {
        Self {
            account: boop.account,
            dest: boop.dest,
            payer: boop.payer,
            value: boop.value,
            nonceTrack: boop.nonce_track,
            nonceValue: boop.nonce_value,
            maxFeePerGas: boop.max_fee_per_gas,
            submitterFee: boop.submitter_fee,
            gasLimit: boop.gas_limit,
            validateGasLimit: boop.validate_gas_limit,
            validatePaymentGasLimit: boop.validate_payment_gas_limit,
            executeGasLimit: boop.execute_gas_limit,
            callData: boop.call_data.clone(),
            validatorData: boop.validator_data.clone(),
            extraData: boop.extra_data.clone(),
        }
    }
}

impl From<AbiBoop> for Boop {
    fn from(abi: AbiBoop) -> Self {
        Self {
            account: abi.account,
            dest: abi.dest,
            payer: abi.payer,
            value: abi.value,
            nonce_track: abi.nonceTrack,
            nonce_value: abi.nonceValue,
            max_fee_per_gas: abi.maxFeePerGas,
            submitter_fee: abi.submitterFee,
            gas_limit: abi.gasLimit,
            validate_gas_limit: abi.validateGasLimit,
            validate_payment_gas_limit: abi.validatePaymentGasLimit,
            execute_gas_limit: abi.executeGasLimit,
            call_data: abi.callData,
            validator_data: abi.validatorData,
            extra_data: abi.extraData,
        }
    }
}
