use cosmwasm_std::Addr;
use cw20::{Cw20QueryMsg, TokenInfoResponse};
use log::{debug, warn};
use stake_mirror_interface::msg::QueryMsg;

use crate::error::StakeError;
use crate::gateway::{ChainGateway, Provider};
use crate::units::MAX_DECIMALS;

/// Addresses and token metadata everything else reads through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakingDescriptors {
    pub staking_contract: Addr,
    pub token: Addr,
    pub symbol: String,
    pub decimals: u8,
}

/// Resolves the staking token once per connected identity.
#[derive(Debug)]
pub struct DescriptorRegistry {
    staking_contract: Addr,
    resolved: Option<StakingDescriptors>,
}

impl DescriptorRegistry {
    pub fn new(staking_contract: Addr) -> Self {
        Self {
            staking_contract,
            resolved: None,
        }
    }

    pub fn staking_contract(&self) -> &Addr {
        &self.staking_contract
    }

    pub fn get(&self) -> Option<&StakingDescriptors> {
        self.resolved.as_ref()
    }

    /// Cached descriptors, or `DescriptorUnavailable` if they have not
    /// been resolved since the last invalidation.
    pub fn require(&self) -> Result<&StakingDescriptors, StakeError> {
        self.resolved
            .as_ref()
            .ok_or_else(|| StakeError::DescriptorUnavailable {
                reason: "staking token has not been resolved".to_string(),
            })
    }

    pub fn invalidate(&mut self) {
        self.resolved = None;
    }

    /// Reads the staking token address from the staking contract and the
    /// token's metadata from the token. Cached until invalidated.
    pub fn resolve_staking_token<P: Provider>(
        &mut self,
        gateway: &ChainGateway<P>,
    ) -> Result<&StakingDescriptors, StakeError> {
        if self.resolved.is_none() {
            let descriptors = self.fetch(gateway).map_err(|err| {
                warn!("resolving staking token failed: {err}");
                StakeError::DescriptorUnavailable {
                    reason: err.to_string(),
                }
            })?;
            debug!(
                "staking token {} ({}, {} decimals)",
                descriptors.token, descriptors.symbol, descriptors.decimals
            );
            self.resolved = Some(descriptors);
        }
        self.require()
    }

    fn fetch<P: Provider>(
        &self,
        gateway: &ChainGateway<P>,
    ) -> Result<StakingDescriptors, StakeError> {
        let token: Addr = gateway.read_call(&self.staking_contract, &QueryMsg::StakingToken {})?;
        let info: TokenInfoResponse = gateway.read_call(&token, &Cw20QueryMsg::TokenInfo {})?;
        if info.decimals > MAX_DECIMALS {
            return Err(StakeError::decode(format!(
                "token reports {} decimals",
                info.decimals
            )));
        }
        Ok(StakingDescriptors {
            staking_contract: self.staking_contract.clone(),
            token,
            symbol: info.symbol,
            decimals: info.decimals,
        })
    }
}
