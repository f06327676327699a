use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Uint128};

#[cw_serde]
pub enum ExecuteMsg {
    /// Locks AMOUNT tokens for the fixed staking period. The contract
    /// pulls the tokens with `TransferFrom`, so the sender must have
    /// approved at least AMOUNT beforehand.
    StakeFixed { amount: Uint128 },
    /// Withdraws a fixed stake. Fails before the stake has matured.
    UnstakeFixed { stake_id: u64 },
    /// Adds AMOUNT tokens to the sender's flexible stake.
    StakeFlexible { amount: Uint128 },
    /// Removes AMOUNT tokens from the sender's flexible stake. Unclaimed
    /// rewards are forfeited if the reward interval has not elapsed.
    UnstakeFlexible { amount: Uint128 },
    ClaimFlexibleRewards {},
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Addr)]
    StakingToken {},
    /// Ids of every fixed stake ever opened by ADDRESS.
    #[returns(Vec<u64>)]
    GetUserFixedStakes { address: String },
    /// A zeroed record is returned for ids that do not exist.
    #[returns(FixedStakeResponse)]
    FixedStakes { stake_id: u64 },
    #[returns(Uint128)]
    CalculateFixedReward {
        amount: Uint128,
        start_anchor: u64,
    },
    #[returns(FlexibleStakeResponse)]
    FlexibleStakes { address: String },
    #[returns(Uint128)]
    CalculateFlexibleReward { address: String },
    #[returns(u64)]
    FlexibleRewardInterval {},
    /// Annual rate of fixed stakes in basis points.
    #[returns(u64)]
    FixedApy {},
    /// Annual rate of flexible stakes in basis points.
    #[returns(u64)]
    FlexibleApy {},
}

#[cw_serde]
#[derive(Default)]
pub struct FixedStakeResponse {
    pub stake_id: u64,
    pub amount: Uint128,
    pub start_anchor: u64,
    pub withdrawn: bool,
}

#[cw_serde]
#[derive(Default)]
pub struct FlexibleStakeResponse {
    pub amount: Uint128,
    pub last_claim_anchor: u64,
}
