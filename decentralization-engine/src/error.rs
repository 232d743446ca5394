use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use thiserror::Error;

/// Input violations rejected at the recommendation boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validator set is empty")]
    EmptyValidatorSet,
    #[error("total activated stake of the validator set is zero")]
    ZeroTotalStake,
    #[error("stake budget must be positive")]
    ZeroBudget,
    #[error("none of the {0} validators is active (all delinquent)")]
    NoActiveValidators(usize),
}

/// Reasons a recommendation strategy gave up. The orchestrator recovers from all of them.
#[derive(Error, Debug)]
pub enum StrategyFailure {
    #[error("strategy unavailable: {0}")]
    Unavailable(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("response references unknown validator {0}")]
    UnknownValidator(Pubkey),
    #[error("validator {0} is not among the eligible candidates")]
    IneligibleValidator(Pubkey),
    #[error("allocation sums to {actual} lamports while the budget is {expected}")]
    AllocationMismatch { expected: u64, actual: u64 },
}
