use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

/// Outcome of the `execute` call made by the entry point, as reported in its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[repr(u8)]
pub enum CallStatus {
    Succeeded = 0,
    CallReverted = 1,
    ExecuteFailed = 2,
    ExecuteReverted = 3,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown call status: {0}")]
pub struct UnknownCallStatus(pub u8);

impl TryFrom<u8> for CallStatus {
    type Error = UnknownCallStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Succeeded),
            1 => Ok(Self::CallReverted),
            2 => Ok(Self::ExecuteFailed),
            3 => Ok(Self::ExecuteReverted),
            other => Err(UnknownCallStatus(other)),
        }
    }
}

/// Overall status of a boop going through the entry point, whether simulated or executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum EntryPointStatus {
    Success,
    CallReverted,
    ExecuteFailed,
    ExecuteReverted,
    ValidationReverted,
    ValidationFailed,
    PaymentValidationReverted,
    PaymentValidationFailed,
    /// The nonce is lower than the one expected by the entry point.
    InvalidNonce,
    UnexpectedReverted,
}

impl From<CallStatus> for EntryPointStatus {
    fn from(value: CallStatus) -> Self {
        match value {
            CallStatus::Succeeded => Self::Success,
            CallStatus::CallReverted => Self::CallReverted,
            CallStatus::ExecuteFailed => Self::ExecuteFailed,
            CallStatus::ExecuteReverted => Self::ExecuteReverted,
        }
    }
}

impl EntryPointStatus {
    /// Reverts happen before or during validation, failures are reported by the entry point output.
    pub fn is_revert(&self) -> bool {
        matches!(
            self,
            Self::ValidationReverted
                | Self::PaymentValidationReverted
                | Self::InvalidNonce
                | Self::UnexpectedReverted
                | Self::CallReverted
                | Self::ExecuteReverted
        )
    }
}

/// Account validation result during simulation. Validation may legitimately be inconclusive when simulating,
/// for instance when the nonce is ahead of the on-chain one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum ValidationStatus {
    Success,
    /// Validation needs information unavailable during simulation (usually a signature).
    Unknown,
    /// The boop nonce is ahead of the on-chain nonce: it can only be executed after its predecessors.
    FutureNonce,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimates {
    pub gas: u32,
    pub validate_gas: u32,
    pub validate_payment_gas: u32,
    pub execute_gas: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutput {
    pub entry_point: Address,
    pub status: EntryPointStatus,
    pub validation_status: ValidationStatus,
    pub revert_data: Bytes,
    pub gas: GasEstimates,
}

impl SimulationOutput {
    /// Simulation of a boop whose validation reverted or which the entry point refused outright.
    pub fn reverted(entry_point: Address, status: EntryPointStatus, revert_data: Bytes) -> Self {
        Self {
            entry_point,
            status,
            validation_status: ValidationStatus::Failed,
            revert_data,
            gas: GasEstimates::default(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == EntryPointStatus::Success && self.validation_status == ValidationStatus::Success
    }

    pub fn is_future_nonce(&self) -> bool {
        self.status == EntryPointStatus::Success && self.validation_status == ValidationStatus::FutureNonce
    }

    /// Whether the boop may be admitted: either it would succeed right now, or it only waits on its predecessors.
    pub fn is_admissible(&self) -> bool {
        self.is_ok() || self.is_future_nonce()
    }
}
