use cosmwasm_std::{Addr, Decimal, Decimal256, Timestamp, Uint128, Uint256};
use log::{debug, warn};
use stake_mirror_interface::msg::{FixedStakeResponse, FlexibleStakeResponse, QueryMsg};

use crate::anchor::{Anchor, ChainNow};
use crate::config::{AnchorKind, DashboardConfig};
use crate::descriptors::StakingDescriptors;
use crate::error::StakeError;
use crate::gateway::{ChainGateway, Provider};

const DAYS_PER_YEAR: u64 = 365;
const SECONDS_PER_YEAR: u64 = DAYS_PER_YEAR * 24 * 60 * 60;

/// Where a fixed stake's reward figure came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RewardProjection {
    /// Raw amount reported by the contract's reward calculation.
    Contract(Uint128),
    /// Local estimate in display units. Never used to build a
    /// transaction amount.
    Estimated(Decimal256),
    /// The stake has been withdrawn and its reward paid out.
    Settled,
}

fn display_amount(raw: Uint128, decimals: u8) -> Result<Decimal256, StakeError> {
    Decimal256::from_atomics(Uint256::from(raw), decimals.into()).map_err(StakeError::decode)
}

fn pro_rata(
    principal: Uint128,
    decimals: u8,
    annual_rate: Decimal,
    fraction: Decimal256,
) -> Result<Decimal256, StakeError> {
    display_amount(principal, decimals)?
        .checked_mul(Decimal256::from(annual_rate))
        .and_then(|yearly| yearly.checked_mul(fraction))
        .map_err(StakeError::decode)
}

/// `principal * annual_rate * (duration_days / 365)` in display units.
pub fn expected_fixed_reward(
    principal: Uint128,
    decimals: u8,
    annual_rate: Decimal,
    duration_days: u64,
) -> Result<Decimal256, StakeError> {
    pro_rata(
        principal,
        decimals,
        annual_rate,
        Decimal256::from_ratio(duration_days, DAYS_PER_YEAR),
    )
}

/// Reward accrued after ELAPSED seconds, capped at the lock period.
pub fn accrued_fixed_reward(
    principal: Uint128,
    decimals: u8,
    annual_rate: Decimal,
    elapsed: u64,
    duration: u64,
) -> Result<Decimal256, StakeError> {
    pro_rata(
        principal,
        decimals,
        annual_rate,
        Decimal256::from_ratio(elapsed.min(duration), SECONDS_PER_YEAR),
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedStakeRecord {
    pub stake_id: u64,
    pub principal: Uint128,
    pub origin: Anchor,
    pub maturity: Timestamp,
    pub withdrawn: bool,
    pub reward: RewardProjection,
    pub expected_total_reward: Decimal256,
}

impl FixedStakeRecord {
    pub fn is_mature(&self, now: Timestamp) -> bool {
        now >= self.maturity
    }

    pub fn time_until_maturity(&self, now: Timestamp) -> u64 {
        self.maturity.seconds().saturating_sub(now.seconds())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlexibleStakeRecord {
    pub principal: Uint128,
    pub last_claim: Anchor,
    pub accumulated_reward: Uint128,
    /// In seconds.
    pub reward_interval: u64,
    /// Seconds left when the record was read.
    pub cooldown_remaining: u64,
}

impl FlexibleStakeRecord {
    /// `max(0, reward_interval - (now - last_claim))`.
    pub fn cooldown_remaining_at(&self, now: &ChainNow) -> u64 {
        self.reward_interval
            .saturating_sub(self.last_claim.elapsed_seconds(now))
    }

    pub fn in_cooldown(&self, now: &ChainNow) -> bool {
        self.cooldown_remaining_at(now) > 0
    }
}

#[derive(Clone, Debug)]
struct LedgerSettings {
    anchor: AnchorKind,
    fixed_duration_days: u64,
    fixed_duration_seconds: u64,
    fixed_annual_rate: Decimal,
    fixed_reward_query: bool,
}

/// The account's stakes as last read from the contract, with the derived
/// fields the dashboard displays.
#[derive(Clone, Debug)]
pub struct StakeLedgerProjector {
    settings: LedgerSettings,
    fixed: Vec<FixedStakeRecord>,
    flexible: Option<FlexibleStakeRecord>,
    /// Protocol constant, in anchor units.
    reward_interval: Option<u64>,
}

impl StakeLedgerProjector {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            settings: LedgerSettings {
                anchor: config.anchor.clone(),
                fixed_duration_days: config.fixed_duration_days,
                fixed_duration_seconds: config.fixed_duration_seconds(),
                fixed_annual_rate: config.fixed_annual_rate,
                fixed_reward_query: config.capabilities.fixed_reward_query,
            },
            fixed: vec![],
            flexible: None,
            reward_interval: None,
        }
    }

    /// Ordered by stake id.
    pub fn fixed_stakes(&self) -> &[FixedStakeRecord] {
        &self.fixed
    }

    pub fn fixed_stake(&self, stake_id: u64) -> Option<&FixedStakeRecord> {
        self.fixed.iter().find(|stake| stake.stake_id == stake_id)
    }

    pub fn flexible_stake(&self) -> Option<&FlexibleStakeRecord> {
        self.flexible.as_ref()
    }

    /// Sum of principal over fixed stakes that are not withdrawn.
    pub fn total_active_fixed(&self) -> Uint128 {
        self.fixed
            .iter()
            .filter(|stake| !stake.withdrawn)
            .map(|stake| stake.principal)
            .sum()
    }

    pub fn clear(&mut self) {
        self.fixed.clear();
        self.flexible = None;
        self.reward_interval = None;
    }

    /// Re-reads every fixed stake of OWNER. The previous listing is only
    /// replaced once every read has succeeded.
    pub fn list_fixed_stakes<P: Provider>(
        &mut self,
        gateway: &ChainGateway<P>,
        descriptors: &StakingDescriptors,
        owner: &Addr,
        now: &ChainNow,
    ) -> Result<&[FixedStakeRecord], StakeError> {
        let ids: Vec<u64> = gateway.read_call(
            &descriptors.staking_contract,
            &QueryMsg::GetUserFixedStakes {
                address: owner.to_string(),
            },
        )?;
        let mut stakes = Vec::with_capacity(ids.len());
        for stake_id in ids {
            if let Some(stake) = self.project_fixed(gateway, descriptors, stake_id, now)? {
                stakes.push(stake);
            }
        }
        stakes.sort_by_key(|stake| stake.stake_id);
        stakes.dedup_by_key(|stake| stake.stake_id);
        debug!("{owner} has {} fixed stakes", stakes.len());
        self.fixed = stakes;
        Ok(&self.fixed)
    }

    /// Re-reads a single fixed stake in place. A stake that no longer
    /// exists is dropped from the listing.
    pub fn refresh_fixed_stake<P: Provider>(
        &mut self,
        gateway: &ChainGateway<P>,
        descriptors: &StakingDescriptors,
        stake_id: u64,
        now: &ChainNow,
    ) -> Result<Option<&FixedStakeRecord>, StakeError> {
        let projected = self.project_fixed(gateway, descriptors, stake_id, now)?;
        let position = self
            .fixed
            .binary_search_by_key(&stake_id, |stake| stake.stake_id);
        match (projected, position) {
            (Some(stake), Ok(index)) => self.fixed[index] = stake,
            (Some(stake), Err(index)) => self.fixed.insert(index, stake),
            (None, Ok(index)) => {
                self.fixed.remove(index);
            }
            (None, Err(_)) => {}
        }
        Ok(self.fixed_stake(stake_id))
    }

    fn project_fixed<P: Provider>(
        &self,
        gateway: &ChainGateway<P>,
        descriptors: &StakingDescriptors,
        stake_id: u64,
        now: &ChainNow,
    ) -> Result<Option<FixedStakeRecord>, StakeError> {
        let raw: FixedStakeResponse = gateway.read_call(
            &descriptors.staking_contract,
            &QueryMsg::FixedStakes { stake_id },
        )?;
        if raw.amount.is_zero() {
            debug!("skipping empty fixed stake {stake_id}");
            return Ok(None);
        }

        let settings = &self.settings;
        let origin = Anchor::from_raw(&settings.anchor, raw.start_anchor);
        let reward = if raw.withdrawn {
            RewardProjection::Settled
        } else {
            self.fixed_reward(gateway, descriptors, &raw, &origin, now)?
        };

        Ok(Some(FixedStakeRecord {
            stake_id,
            principal: raw.amount,
            origin,
            maturity: origin.time(now).plus_seconds(settings.fixed_duration_seconds),
            withdrawn: raw.withdrawn,
            reward,
            expected_total_reward: expected_fixed_reward(
                raw.amount,
                descriptors.decimals,
                settings.fixed_annual_rate,
                settings.fixed_duration_days,
            )?,
        }))
    }

    /// Prefers the contract's own calculation and falls back to the local
    /// formula when the contract lacks it or the read fails.
    fn fixed_reward<P: Provider>(
        &self,
        gateway: &ChainGateway<P>,
        descriptors: &StakingDescriptors,
        raw: &FixedStakeResponse,
        origin: &Anchor,
        now: &ChainNow,
    ) -> Result<RewardProjection, StakeError> {
        if self.settings.fixed_reward_query {
            let reward = gateway.read_call(
                &descriptors.staking_contract,
                &QueryMsg::CalculateFixedReward {
                    amount: raw.amount,
                    start_anchor: raw.start_anchor,
                },
            );
            match reward {
                Ok(reward) => return Ok(RewardProjection::Contract(reward)),
                Err(err) => warn!(
                    "reward query for fixed stake {} failed, estimating locally: {err}",
                    raw.stake_id
                ),
            }
        }
        accrued_fixed_reward(
            raw.amount,
            descriptors.decimals,
            self.settings.fixed_annual_rate,
            origin.elapsed_seconds(now),
            self.settings.fixed_duration_seconds,
        )
        .map(RewardProjection::Estimated)
    }

    /// Re-reads OWNER's flexible stake. A zero principal means there is
    /// no active stake, whatever the last claim anchor says.
    pub fn get_flexible_stake<P: Provider>(
        &mut self,
        gateway: &ChainGateway<P>,
        descriptors: &StakingDescriptors,
        owner: &Addr,
        now: &ChainNow,
    ) -> Result<Option<&FlexibleStakeRecord>, StakeError> {
        let contract = &descriptors.staking_contract;
        let raw: FlexibleStakeResponse = gateway.read_call(
            contract,
            &QueryMsg::FlexibleStakes {
                address: owner.to_string(),
            },
        )?;
        if raw.amount.is_zero() {
            self.flexible = None;
            return Ok(None);
        }

        let accumulated_reward: Uint128 = gateway.read_call(
            contract,
            &QueryMsg::CalculateFlexibleReward {
                address: owner.to_string(),
            },
        )?;
        let interval_units = match self.reward_interval {
            Some(units) => units,
            None => {
                let units: u64 = gateway.read_call(contract, &QueryMsg::FlexibleRewardInterval {})?;
                self.reward_interval = Some(units);
                units
            }
        };

        let last_claim = Anchor::from_raw(&self.settings.anchor, raw.last_claim_anchor);
        let reward_interval = last_claim.seconds_for(interval_units);
        let mut record = FlexibleStakeRecord {
            principal: raw.amount,
            last_claim,
            accumulated_reward,
            reward_interval,
            cooldown_remaining: 0,
        };
        record.cooldown_remaining = record.cooldown_remaining_at(now);
        Ok(Some(&*self.flexible.insert(record)))
    }
}
