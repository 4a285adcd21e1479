use alloy::primitives::{Bytes, U256};
use bc_chain::ChainError;
use bp_boop::{BoopHash, SimulationOutput};
use std::time::Duration;

/// Rejections from the admission gate. Apart from [`AdmissionError::Chain`], these are expected outcomes of
/// contention or of boops sent too early, and are reported back to the caller.
#[derive(thiserror::Error, Debug)]
pub enum AdmissionError {
    #[error("The buffer for this nonce track is full ({limit} boops)")]
    BufferExceeded { limit: usize },
    #[error("The submitter has reached its limit of {limit} buffered boops")]
    OverCapacity { limit: usize },
    #[error("Nonce {nonce} is too far ahead of the expected nonce {local} (at most {limit} ahead)")]
    NonceOutOfRange { nonce: U256, local: U256, limit: usize },
    #[error("Replaced by another boop with the same nonce")]
    TransactionReplaced,
    #[error("Timed out after {0:?} waiting for the preceding nonces")]
    TransactionTimeout(Duration),
    #[error("The admission gate dropped the boop")]
    Closed,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl AdmissionError {
    pub fn status(&self) -> &'static str {
        match self {
            Self::BufferExceeded { .. } => "bufferExceeded",
            Self::OverCapacity { .. } => "overCapacity",
            Self::NonceOutOfRange { .. } => "nonceOutOfRange",
            Self::TransactionReplaced => "transactionReplaced",
            Self::TransactionTimeout(_) => "transactionTimeout",
            Self::Closed => "unexpectedError",
            Self::Chain(_) => "rpcError",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SubmitBoopError {
    #[error(transparent)]
    Rejected(AdmissionError),
    #[error("Simulation rejected the boop with status {} (validation: {})", .0.status, .0.validation_status)]
    SimulationRejected(SimulationOutput),
    #[error("Boop {0} is already being processed")]
    AlreadyProcessing(BoopHash),
    #[error("Submission failed: {0}")]
    SubmissionFailed(ChainError),
    #[error("Chain gateway error: {0}")]
    Gateway(ChainError),
}

impl From<AdmissionError> for SubmitBoopError {
    fn from(value: AdmissionError) -> Self {
        match value {
            AdmissionError::Chain(err) => Self::Gateway(err),
            other => Self::Rejected(other),
        }
    }
}

impl SubmitBoopError {
    /// Status name reported to callers.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Rejected(err) => err.status(),
            Self::SimulationRejected(output) if output.status.is_revert() => "simulationReverted",
            Self::SimulationRejected(_) => "simulationFailed",
            Self::AlreadyProcessing(_) => "alreadyProcessing",
            Self::SubmissionFailed(_) => "submissionFailed",
            Self::Gateway(_) => "rpcError",
        }
    }

    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::SimulationRejected(output) if !output.revert_data.is_empty() => Some(&output.revert_data),
            Self::SubmissionFailed(ChainError::Reverted { revert_data, .. }) => Some(revert_data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{bytes, Address};
    use bp_boop::EntryPointStatus;
    use rstest::rstest;

    #[rstest]
    #[case(AdmissionError::BufferExceeded { limit: 1 }, "bufferExceeded")]
    #[case(AdmissionError::OverCapacity { limit: 1 }, "overCapacity")]
    #[case(AdmissionError::NonceOutOfRange { nonce: U256::from(9), local: U256::ZERO, limit: 1 }, "nonceOutOfRange")]
    #[case(AdmissionError::TransactionReplaced, "transactionReplaced")]
    #[case(AdmissionError::TransactionTimeout(Duration::from_secs(30)), "transactionTimeout")]
    fn admission_rejections_keep_their_status(#[case] err: AdmissionError, #[case] status: &str) {
        let err = SubmitBoopError::from(err);
        assert!(matches!(err, SubmitBoopError::Rejected(_)));
        assert_eq!(err.status(), status);
    }

    #[rstest]
    fn chain_failures_are_not_rejections() {
        let err = SubmitBoopError::from(AdmissionError::Chain(ChainError::Rpc("connection refused".into())));
        assert!(matches!(err, SubmitBoopError::Gateway(_)));
        assert_eq!(err.status(), "rpcError");
    }

    #[rstest]
    #[case(EntryPointStatus::ValidationReverted, "simulationReverted")]
    #[case(EntryPointStatus::ValidationFailed, "simulationFailed")]
    #[case(EntryPointStatus::ExecuteFailed, "simulationFailed")]
    fn simulation_status(#[case] status: EntryPointStatus, #[case] expected: &str) {
        let err = SubmitBoopError::SimulationRejected(SimulationOutput::reverted(Address::ZERO, status, bytes!("0x01")));
        assert_eq!(err.status(), expected);
        assert_eq!(err.revert_data(), Some(&bytes!("0x01")));
    }
}
