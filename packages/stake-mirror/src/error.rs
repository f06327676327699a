use cosmwasm_std::Uint128;
use thiserror::Error;

use crate::gateway::{ProviderError, TxHash};
use crate::orchestrator::ActionKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StakeError {
    #[error("No wallet provider is available")]
    WalletUnavailable {},

    #[error("Request was rejected in the wallet")]
    UserRejected {},

    #[error("Wallet is not connected")]
    NotConnected {},

    #[error("Staking token could not be resolved: {reason}")]
    DescriptorUnavailable { reason: String },

    #[error("Network error: {reason}")]
    Network { reason: String },

    #[error("Could not decode contract response: {reason}")]
    Decode { reason: String },

    #[error("Allowance ({allowance}) is below the required amount ({required})")]
    InsufficientAllowance {
        allowance: Uint128,
        required: Uint128,
    },

    #[error("Transaction {hash} reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    TransactionReverted {
        hash: TxHash,
        reason: Option<String>,
    },

    #[error("Transaction {hash} is still pending, refresh to check its outcome")]
    TransactionTimeout { hash: TxHash },

    #[error("A {kind} transaction is already in progress")]
    ActionAlreadyInProgress { kind: ActionKind },

    #[error("No {kind} transaction is awaiting confirmation")]
    NothingPending { kind: ActionKind },

    #[error("Amount must be greater than zero")]
    ZeroAmount {},

    #[error("Invalid amount ({input}): {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("No fixed stake with id ({stake_id})")]
    UnknownStake { stake_id: u64 },

    #[error("Fixed stake ({stake_id}) has already been withdrawn")]
    StakeAlreadyWithdrawn { stake_id: u64 },

    #[error("Can not unstake ({requested}) from a flexible stake of ({staked})")]
    InvalidUnstakeAmount {
        requested: Uint128,
        staked: Uint128,
    },

    #[error("Nothing to claim")]
    NothingToClaim {},
}

impl StakeError {
    pub(crate) fn network(err: impl std::fmt::Display) -> Self {
        StakeError::Network {
            reason: err.to_string(),
        }
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        StakeError::Decode {
            reason: err.to_string(),
        }
    }

    /// Errors that may go away by repeating the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StakeError::DescriptorUnavailable { .. }
                | StakeError::Network { .. }
                | StakeError::Decode { .. }
                | StakeError::TransactionReverted { .. }
                | StakeError::TransactionTimeout { .. }
        )
    }

    /// The outcome on chain is unknown. Callers must not present these as
    /// either success or failure.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, StakeError::TransactionTimeout { .. })
    }
}

impl From<ProviderError> for StakeError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NoProvider => StakeError::WalletUnavailable {},
            ProviderError::Rejected => StakeError::UserRejected {},
            ProviderError::Transport(err) => StakeError::network(format!("{err:#}")),
        }
    }
}
