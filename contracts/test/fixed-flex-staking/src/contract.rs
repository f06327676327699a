#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    to_json_binary, Addr, Binary, Deps, DepsMut, Env, MessageInfo, Response, StdResult, Uint128,
    WasmMsg,
};
use cw2::set_contract_version;
use cw20::Cw20ExecuteMsg;

use crate::error::ContractError;
use crate::math;
use crate::msg::{ExecuteMsg, FixedStakeResponse, FlexibleStakeResponse, InstantiateMsg, QueryMsg};
use crate::state::{
    Config, FixedStake, FlexibleStake, CONFIG, FIXED_STAKES, FLEXIBLE_STAKES, STAKE_COUNT,
    USER_FIXED_STAKES,
};

pub(crate) const CONTRACT_NAME: &str = "crates.io:fixed-flex-staking";
pub(crate) const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    if msg.fixed_duration == 0
        || msg.flexible_reward_interval == 0
        || msg.anchor.units_per_year() == 0
    {
        return Err(ContractError::InvalidDuration {});
    }
    let config = Config {
        token_address: deps.api.addr_validate(&msg.token_address)?,
        anchor: msg.anchor,
        fixed_duration: msg.fixed_duration,
        fixed_apy_bps: msg.fixed_apy_bps,
        flexible_apy_bps: msg.flexible_apy_bps,
        flexible_reward_interval: msg.flexible_reward_interval,
    };
    CONFIG.save(deps.storage, &config)?;
    STAKE_COUNT.save(deps.storage, &0)?;

    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    Ok(Response::new()
        .add_attribute("method", "instantiate")
        .add_attribute("token", config.token_address))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        ExecuteMsg::StakeFixed { amount } => execute_stake_fixed(deps, env, info.sender, amount),
        ExecuteMsg::UnstakeFixed { stake_id } => {
            execute_unstake_fixed(deps, env, info.sender, stake_id)
        }
        ExecuteMsg::StakeFlexible { amount } => {
            execute_stake_flexible(deps, env, info.sender, amount)
        }
        ExecuteMsg::UnstakeFlexible { amount } => {
            execute_unstake_flexible(deps, env, info.sender, amount)
        }
        ExecuteMsg::ClaimFlexibleRewards {} => execute_claim_flexible(deps, env, info.sender),
    }
}

fn pull_msg(config: &Config, env: &Env, owner: &Addr, amount: Uint128) -> StdResult<WasmMsg> {
    Ok(WasmMsg::Execute {
        contract_addr: config.token_address.to_string(),
        msg: to_json_binary(&Cw20ExecuteMsg::TransferFrom {
            owner: owner.to_string(),
            recipient: env.contract.address.to_string(),
            amount,
        })?,
        funds: vec![],
    })
}

fn pay_msg(config: &Config, recipient: &Addr, amount: Uint128) -> StdResult<WasmMsg> {
    Ok(WasmMsg::Execute {
        contract_addr: config.token_address.to_string(),
        msg: to_json_binary(&Cw20ExecuteMsg::Transfer {
            recipient: recipient.to_string(),
            amount,
        })?,
        funds: vec![],
    })
}

fn fixed_reward(config: &Config, amount: Uint128, start: u64, now: u64) -> StdResult<Uint128> {
    let elapsed = now.saturating_sub(start).min(config.fixed_duration);
    math::reward(
        amount,
        config.fixed_apy_bps,
        elapsed,
        config.anchor.units_per_year(),
    )
}

fn flexible_reward(config: &Config, stake: &FlexibleStake, now: u64) -> StdResult<Uint128> {
    math::reward(
        stake.amount,
        config.flexible_apy_bps,
        now.saturating_sub(stake.last_claim_anchor),
        config.anchor.units_per_year(),
    )
}

/// Reward paid out when the flexible stake is touched at NOW. Zero if
/// the reward interval has not elapsed since the last claim.
fn vested_flexible_reward(config: &Config, stake: &FlexibleStake, now: u64) -> StdResult<Uint128> {
    if now.saturating_sub(stake.last_claim_anchor) < config.flexible_reward_interval {
        Ok(Uint128::zero())
    } else {
        flexible_reward(config, stake, now)
    }
}

pub fn execute_stake_fixed(
    deps: DepsMut,
    env: Env,
    sender: Addr,
    amount: Uint128,
) -> Result<Response, ContractError> {
    if amount.is_zero() {
        return Err(ContractError::ZeroAmount {});
    }
    let config = CONFIG.load(deps.storage)?;
    let stake_id = STAKE_COUNT.load(deps.storage)? + 1;
    STAKE_COUNT.save(deps.storage, &stake_id)?;

    let start_anchor = config.anchor.now(&env.block);
    FIXED_STAKES.save(
        deps.storage,
        stake_id,
        &FixedStake {
            owner: sender.clone(),
            amount,
            start_anchor,
            withdrawn: false,
        },
    )?;
    USER_FIXED_STAKES.update(deps.storage, &sender, |ids| -> StdResult<_> {
        let mut ids = ids.unwrap_or_default();
        ids.push(stake_id);
        Ok(ids)
    })?;

    Ok(Response::new()
        .add_message(pull_msg(&config, &env, &sender, amount)?)
        .add_attribute("action", "stake_fixed")
        .add_attribute("stake_id", stake_id.to_string())
        .add_attribute("amount", amount))
}

pub fn execute_unstake_fixed(
    deps: DepsMut,
    env: Env,
    sender: Addr,
    stake_id: u64,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let mut stake = FIXED_STAKES
        .may_load(deps.storage, stake_id)?
        .ok_or(ContractError::NoSuchStake { stake_id })?;
    if stake.owner != sender {
        return Err(ContractError::Unauthorized {});
    }
    if stake.withdrawn {
        return Err(ContractError::AlreadyWithdrawn { stake_id });
    }
    let now = config.anchor.now(&env.block);
    let unlocks_at = stake.start_anchor + config.fixed_duration;
    if now < unlocks_at {
        return Err(ContractError::StakeLocked { unlocks_at });
    }

    let reward = fixed_reward(&config, stake.amount, stake.start_anchor, now)?;
    stake.withdrawn = true;
    FIXED_STAKES.save(deps.storage, stake_id, &stake)?;

    Ok(Response::new()
        .add_message(pay_msg(&config, &sender, stake.amount.checked_add(reward)?)?)
        .add_attribute("action", "unstake_fixed")
        .add_attribute("stake_id", stake_id.to_string())
        .add_attribute("amount", stake.amount)
        .add_attribute("reward", reward))
}

pub fn execute_stake_flexible(
    deps: DepsMut,
    env: Env,
    sender: Addr,
    amount: Uint128,
) -> Result<Response, ContractError> {
    if amount.is_zero() {
        return Err(ContractError::ZeroAmount {});
    }
    let config = CONFIG.load(deps.storage)?;
    let now = config.anchor.now(&env.block);
    let mut stake = FLEXIBLE_STAKES
        .may_load(deps.storage, &sender)?
        .unwrap_or_default();

    let reward = vested_flexible_reward(&config, &stake, now)?;
    stake.amount = stake.amount.checked_add(amount)?;
    stake.last_claim_anchor = now;
    FLEXIBLE_STAKES.save(deps.storage, &sender, &stake)?;

    let mut response = Response::new().add_message(pull_msg(&config, &env, &sender, amount)?);
    if !reward.is_zero() {
        response = response.add_message(pay_msg(&config, &sender, reward)?);
    }
    Ok(response
        .add_attribute("action", "stake_flexible")
        .add_attribute("amount", amount)
        .add_attribute("reward", reward))
}

pub fn execute_unstake_flexible(
    deps: DepsMut,
    env: Env,
    sender: Addr,
    amount: Uint128,
) -> Result<Response, ContractError> {
    if amount.is_zero() {
        return Err(ContractError::ZeroAmount {});
    }
    let config = CONFIG.load(deps.storage)?;
    let now = config.anchor.now(&env.block);
    let mut stake = FLEXIBLE_STAKES
        .may_load(deps.storage, &sender)?
        .filter(|stake| !stake.amount.is_zero())
        .ok_or(ContractError::NothingStaked {})?;
    if amount > stake.amount {
        return Err(ContractError::ImpossibleUnstake {});
    }

    let reward = vested_flexible_reward(&config, &stake, now)?;
    stake.amount -= amount;
    stake.last_claim_anchor = now;
    // Emptied stakes keep their record so the claim anchor survives.
    FLEXIBLE_STAKES.save(deps.storage, &sender, &stake)?;

    Ok(Response::new()
        .add_message(pay_msg(&config, &sender, amount.checked_add(reward)?)?)
        .add_attribute("action", "unstake_flexible")
        .add_attribute("amount", amount)
        .add_attribute("reward", reward))
}

pub fn execute_claim_flexible(
    deps: DepsMut,
    env: Env,
    sender: Addr,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let now = config.anchor.now(&env.block);
    let mut stake = FLEXIBLE_STAKES
        .may_load(deps.storage, &sender)?
        .filter(|stake| !stake.amount.is_zero())
        .ok_or(ContractError::NothingStaked {})?;

    let available_at = stake.last_claim_anchor + config.flexible_reward_interval;
    if now < available_at {
        return Err(ContractError::CooldownActive { available_at });
    }
    let reward = flexible_reward(&config, &stake, now)?;
    if reward.is_zero() {
        return Err(ContractError::NothingToClaim {});
    }
    stake.last_claim_anchor = now;
    FLEXIBLE_STAKES.save(deps.storage, &sender, &stake)?;

    Ok(Response::new()
        .add_message(pay_msg(&config, &sender, reward)?)
        .add_attribute("action", "claim_flexible_rewards")
        .add_attribute("reward", reward))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::StakingToken {} => query_staking_token(deps),
        QueryMsg::GetUserFixedStakes { address } => query_user_fixed_stakes(deps, address),
        QueryMsg::FixedStakes { stake_id } => query_fixed_stake(deps, stake_id),
        QueryMsg::CalculateFixedReward {
            amount,
            start_anchor,
        } => query_fixed_reward(deps, env, amount, start_anchor),
        QueryMsg::FlexibleStakes { address } => query_flexible_stake(deps, address),
        QueryMsg::CalculateFlexibleReward { address } => {
            query_flexible_reward(deps, env, address)
        }
        QueryMsg::FlexibleRewardInterval {} => {
            to_json_binary(&CONFIG.load(deps.storage)?.flexible_reward_interval)
        }
        QueryMsg::FixedApy {} => to_json_binary(&CONFIG.load(deps.storage)?.fixed_apy_bps),
        QueryMsg::FlexibleApy {} => to_json_binary(&CONFIG.load(deps.storage)?.flexible_apy_bps),
    }
}

pub fn query_staking_token(deps: Deps) -> StdResult<Binary> {
    to_json_binary(&CONFIG.load(deps.storage)?.token_address)
}

pub fn query_user_fixed_stakes(deps: Deps, address: String) -> StdResult<Binary> {
    let address = deps.api.addr_validate(&address)?;
    let ids = USER_FIXED_STAKES
        .may_load(deps.storage, &address)?
        .unwrap_or_default();
    to_json_binary(&ids)
}

pub fn query_fixed_stake(deps: Deps, stake_id: u64) -> StdResult<Binary> {
    let response = FIXED_STAKES
        .may_load(deps.storage, stake_id)?
        .map(|stake| FixedStakeResponse {
            stake_id,
            amount: stake.amount,
            start_anchor: stake.start_anchor,
            withdrawn: stake.withdrawn,
        })
        .unwrap_or_default();
    to_json_binary(&response)
}

pub fn query_fixed_reward(
    deps: Deps,
    env: Env,
    amount: Uint128,
    start_anchor: u64,
) -> StdResult<Binary> {
    let config = CONFIG.load(deps.storage)?;
    let now = config.anchor.now(&env.block);
    to_json_binary(&fixed_reward(&config, amount, start_anchor, now)?)
}

pub fn query_flexible_stake(deps: Deps, address: String) -> StdResult<Binary> {
    let address = deps.api.addr_validate(&address)?;
    let stake = FLEXIBLE_STAKES
        .may_load(deps.storage, &address)?
        .unwrap_or_default();
    to_json_binary(&FlexibleStakeResponse {
        amount: stake.amount,
        last_claim_anchor: stake.last_claim_anchor,
    })
}

pub fn query_flexible_reward(deps: Deps, env: Env, address: String) -> StdResult<Binary> {
    let config = CONFIG.load(deps.storage)?;
    let address = deps.api.addr_validate(&address)?;
    let stake = FLEXIBLE_STAKES
        .may_load(deps.storage, &address)?
        .unwrap_or_default();
    let now = config.anchor.now(&env.block);
    to_json_binary(&flexible_reward(&config, &stake, now)?)
}
