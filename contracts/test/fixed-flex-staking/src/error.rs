use cosmwasm_std::{OverflowError, StdError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error(transparent)]
    Std(#[from] StdError),

    #[error(transparent)]
    Overflow(#[from] OverflowError),

    #[error("Unauthorized")]
    Unauthorized {},

    #[error("Amount must be greater than zero")]
    ZeroAmount {},

    #[error("Durations and the length of a year must be non-zero")]
    InvalidDuration {},

    #[error("No fixed stake with id ({stake_id})")]
    NoSuchStake { stake_id: u64 },

    #[error("Fixed stake ({stake_id}) has already been withdrawn")]
    AlreadyWithdrawn { stake_id: u64 },

    #[error("Fixed stake is still locked until ({unlocks_at})")]
    StakeLocked { unlocks_at: u64 },

    #[error("Nothing to unstake")]
    NothingStaked {},

    #[error("Can not unstake more than has been staked")]
    ImpossibleUnstake {},

    #[error("Rewards can not be claimed until ({available_at})")]
    CooldownActive { available_at: u64 },

    #[error("Nothing to claim")]
    NothingToClaim {},
}
