use cosmwasm_std::{Addr, Uint128};
use cw20::{AllowanceResponse, BalanceResponse, Cw20QueryMsg};
use log::debug;
use stake_mirror_interface::msg::QueryMsg;

use crate::descriptors::StakingDescriptors;
use crate::error::StakeError;
use crate::gateway::{ChainGateway, Provider};
use crate::units::{format_bps, format_units};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenBalanceState {
    pub raw_balance: Uint128,
    pub decimals: u8,
}

impl TokenBalanceState {
    /// `raw_balance / 10^decimals`, recomputed on every call.
    pub fn display_balance(&self) -> Result<String, StakeError> {
        format_units(self.raw_balance, self.decimals)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowanceState {
    pub raw_allowance: Uint128,
}

impl AllowanceState {
    pub fn covers(&self, amount: Uint128) -> bool {
        self.raw_allowance >= amount
    }
}

/// Contract-wide figures shown next to the account's own position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketState {
    /// Tokens held by the staking contract.
    pub total_value_locked: Uint128,
    pub fixed_apy_bps: Option<u64>,
    pub flexible_apy_bps: Option<u64>,
}

impl MarketState {
    pub fn fixed_apy(&self) -> Option<String> {
        self.fixed_apy_bps.map(format_bps)
    }

    pub fn flexible_apy(&self) -> Option<String> {
        self.flexible_apy_bps.map(format_bps)
    }
}

/// Last known balance, allowance and market figures. Every refresh
/// overwrites the previous value with a fresh read; a failed refresh
/// leaves the previous value in place.
#[derive(Clone, Debug, Default)]
pub struct AccountStateCache {
    balance: Option<TokenBalanceState>,
    allowance: Option<AllowanceState>,
    market: Option<MarketState>,
}

impl AccountStateCache {
    pub fn balance(&self) -> Option<&TokenBalanceState> {
        self.balance.as_ref()
    }

    pub fn allowance(&self) -> Option<&AllowanceState> {
        self.allowance.as_ref()
    }

    pub fn market(&self) -> Option<&MarketState> {
        self.market.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn refresh_balance<P: Provider>(
        &mut self,
        gateway: &ChainGateway<P>,
        descriptors: &StakingDescriptors,
        owner: &Addr,
    ) -> Result<&TokenBalanceState, StakeError> {
        let response: BalanceResponse = gateway.read_call(
            &descriptors.token,
            &Cw20QueryMsg::Balance {
                address: owner.to_string(),
            },
        )?;
        debug!("balance of {owner}: {}", response.balance);
        Ok(&*self.balance.insert(TokenBalanceState {
            raw_balance: response.balance,
            decimals: descriptors.decimals,
        }))
    }

    pub fn refresh_allowance<P: Provider>(
        &mut self,
        gateway: &ChainGateway<P>,
        descriptors: &StakingDescriptors,
        owner: &Addr,
    ) -> Result<&AllowanceState, StakeError> {
        let response: AllowanceResponse = gateway.read_call(
            &descriptors.token,
            &Cw20QueryMsg::Allowance {
                owner: owner.to_string(),
                spender: descriptors.staking_contract.to_string(),
            },
        )?;
        debug!("allowance of {owner}: {}", response.allowance);
        Ok(&*self.allowance.insert(AllowanceState {
            raw_allowance: response.allowance,
        }))
    }

    pub fn refresh_market<P: Provider>(
        &mut self,
        gateway: &ChainGateway<P>,
        descriptors: &StakingDescriptors,
        with_fixed: bool,
        with_flexible: bool,
    ) -> Result<&MarketState, StakeError> {
        let locked: BalanceResponse = gateway.read_call(
            &descriptors.token,
            &Cw20QueryMsg::Balance {
                address: descriptors.staking_contract.to_string(),
            },
        )?;
        let fixed_apy_bps = if with_fixed {
            Some(gateway.read_call(&descriptors.staking_contract, &QueryMsg::FixedApy {})?)
        } else {
            None
        };
        let flexible_apy_bps = if with_flexible {
            Some(gateway.read_call(&descriptors.staking_contract, &QueryMsg::FlexibleApy {})?)
        } else {
            None
        };
        Ok(&*self.market.insert(MarketState {
            total_value_locked: locked.balance,
            fixed_apy_bps,
            flexible_apy_bps,
        }))
    }
}
