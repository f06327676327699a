use cosmwasm_std::{Addr, Uint128};
use cw20::Cw20ExecuteMsg;
use log::{debug, info, warn};
use serde::Serialize;
use stake_mirror_interface::msg::ExecuteMsg;

use crate::account::{AccountStateCache, AllowanceState, MarketState, TokenBalanceState};
use crate::anchor::ChainNow;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, DashboardConfig};
use crate::descriptors::{DescriptorRegistry, StakingDescriptors};
use crate::error::StakeError;
use crate::gateway::{AccountContext, ChainGateway, Provider, TxHash, WalletEvent};
use crate::ledger::{FixedStakeRecord, FlexibleStakeRecord, StakeLedgerProjector};
use crate::orchestrator::{
    check_amount, check_claim, check_stake, check_unstake_fixed, check_unstake_flexible,
    ActionKind, ActionTarget, FlexibleUnstakeGate, PendingTransaction, RequestOutcome,
    TransactionOrchestrator, TransactionStatus,
};
use crate::units::parse_units;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RefreshSection {
    Descriptors,
    Balance,
    Allowance,
    Market,
    FixedStakes,
    FlexibleStake,
}

/// Sections that could not be refreshed. Each of them still holds its
/// last known good value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshReport {
    pub errors: Vec<(RefreshSection, StakeError)>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&self, section: RefreshSection) -> Option<&StakeError> {
        self.errors
            .iter()
            .find(|(failed, _)| *failed == section)
            .map(|(_, err)| err)
    }

    fn record<T>(&mut self, section: RefreshSection, result: Result<T, StakeError>) {
        if let Err(err) = result {
            warn!("refreshing {section:?} failed, keeping last known value: {err}");
            self.errors.push((section, err));
        }
    }
}

/// Everything the presentation layer renders, detached from the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardSnapshot {
    pub account: AccountContext,
    pub descriptors: Option<StakingDescriptors>,
    pub balance: Option<TokenBalanceState>,
    pub allowance: Option<AllowanceState>,
    pub market: Option<MarketState>,
    pub fixed_stakes: Vec<FixedStakeRecord>,
    pub flexible_stake: Option<FlexibleStakeRecord>,
    pub total_active_fixed: Uint128,
    pub transactions: Vec<PendingTransaction>,
    pub now: ChainNow,
}

pub struct StakeDashboard<P, C = SystemClock> {
    config: DashboardConfig,
    gateway: ChainGateway<P>,
    clock: C,
    descriptors: DescriptorRegistry,
    account: AccountStateCache,
    ledger: StakeLedgerProjector,
    orchestrator: TransactionOrchestrator,
    observed_height: u64,
}

impl<P: Provider> StakeDashboard<P, SystemClock> {
    pub fn new(config: DashboardConfig, provider: P) -> Result<Self, ConfigError> {
        Self::with_clock(config, provider, SystemClock)
    }
}

impl<P: Provider, C: Clock> StakeDashboard<P, C> {
    pub fn with_clock(config: DashboardConfig, provider: P, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            gateway: ChainGateway::new(provider, config.confirmation.clone()),
            clock,
            descriptors: DescriptorRegistry::new(Addr::unchecked(&config.staking_contract)),
            account: AccountStateCache::default(),
            ledger: StakeLedgerProjector::new(&config),
            orchestrator: TransactionOrchestrator::new(),
            observed_height: 0,
            config,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        self.gateway.provider()
    }

    pub fn provider_mut(&mut self) -> &mut P {
        self.gateway.provider_mut()
    }

    pub fn account(&self) -> &AccountContext {
        self.gateway.account()
    }

    pub fn descriptors(&self) -> Option<&StakingDescriptors> {
        self.descriptors.get()
    }

    pub fn balance(&self) -> Option<&TokenBalanceState> {
        self.account.balance()
    }

    pub fn allowance(&self) -> Option<&AllowanceState> {
        self.account.allowance()
    }

    pub fn market(&self) -> Option<&MarketState> {
        self.account.market()
    }

    pub fn fixed_stakes(&self) -> &[FixedStakeRecord] {
        self.ledger.fixed_stakes()
    }

    pub fn flexible_stake(&self) -> Option<&FlexibleStakeRecord> {
        self.ledger.flexible_stake()
    }

    pub fn total_active_fixed(&self) -> Uint128 {
        self.ledger.total_active_fixed()
    }

    pub fn transaction(&self, kind: ActionKind) -> Option<&PendingTransaction> {
        self.orchestrator.pending(kind)
    }

    pub fn transaction_status(&self, kind: ActionKind) -> TransactionStatus {
        self.orchestrator.status(kind)
    }

    /// Local clock time and the last block height seen by a refresh.
    pub fn now(&self) -> ChainNow {
        ChainNow {
            time: self.clock.now(),
            height: self.observed_height,
        }
    }

    /// Seconds until the flexible stake can be unstaked without
    /// forfeiting its reward, counted down with the local clock.
    pub fn cooldown_remaining(&self) -> Option<u64> {
        let now = self.now();
        self.ledger
            .flexible_stake()
            .map(|stake| stake.cooldown_remaining_at(&now))
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            account: self.account().clone(),
            descriptors: self.descriptors().cloned(),
            balance: self.balance().cloned(),
            allowance: self.allowance().cloned(),
            market: self.market().cloned(),
            fixed_stakes: self.fixed_stakes().to_vec(),
            flexible_stake: self.flexible_stake().cloned(),
            total_active_fixed: self.total_active_fixed(),
            transactions: self.orchestrator.snapshot(),
            now: self.now(),
        }
    }

    /// Converts an amount typed by the user with the staking token's
    /// decimals.
    pub fn parse_amount(&self, input: &str) -> Result<Uint128, StakeError> {
        let amount = parse_units(input, self.descriptors.require()?.decimals)?;
        check_amount(amount)?;
        Ok(amount)
    }

    /// Requests the wallet account and refreshes. Cached state and
    /// transaction slots are only dropped when the account or chain
    /// differs from the one already connected. A failed request leaves
    /// everything as it was.
    pub fn connect(&mut self) -> Result<RefreshReport, StakeError> {
        let previous = self.account().clone();
        let changed = *self.gateway.connect()? != previous;
        if changed {
            self.invalidate();
        }
        Ok(self.refresh())
    }

    pub fn disconnect(&mut self) {
        self.gateway.disconnect();
        self.invalidate();
    }

    /// Applies pending wallet notifications. Any of them invalidates all
    /// cached state; a refresh follows when an account is still
    /// connected.
    pub fn handle_wallet_events(&mut self) -> Option<RefreshReport> {
        let events = self.gateway.take_events();
        if events.is_empty() {
            return None;
        }
        self.invalidate();
        if events.contains(&WalletEvent::Disconnected) || !self.account().is_connected() {
            return None;
        }
        Some(self.refresh())
    }

    fn invalidate(&mut self) {
        self.descriptors.invalidate();
        self.account.clear();
        self.ledger.clear();
        self.orchestrator.reset();
        self.observed_height = 0;
    }

    fn owner(&self) -> Result<Addr, StakeError> {
        self.account()
            .address
            .clone()
            .ok_or(StakeError::NotConnected {})
    }

    /// Reads the chain head for block-anchored estimates. On failure the
    /// last observed height is used.
    fn chain_now(&mut self) -> ChainNow {
        match self.gateway.latest_block() {
            Ok(head) => self.observed_height = head.height,
            Err(err) => warn!("reading latest block failed: {err}"),
        }
        self.now()
    }

    /// Re-reads everything from the chain. Never fails as a whole.
    pub fn refresh(&mut self) -> RefreshReport {
        let mut report = RefreshReport::default();
        let owner = match self.owner() {
            Ok(owner) => owner,
            Err(err) => {
                report.errors.push((RefreshSection::Descriptors, err));
                return report;
            }
        };
        let descriptors = match self.descriptors.resolve_staking_token(&self.gateway) {
            Ok(descriptors) => descriptors.clone(),
            Err(err) => {
                report.record::<()>(RefreshSection::Descriptors, Err(err));
                return report;
            }
        };
        let now = self.chain_now();
        let capabilities = self.config.capabilities.clone();
        let gateway = &self.gateway;

        report.record(
            RefreshSection::Balance,
            self.account.refresh_balance(gateway, &descriptors, &owner),
        );
        report.record(
            RefreshSection::Allowance,
            self.account.refresh_allowance(gateway, &descriptors, &owner),
        );
        report.record(
            RefreshSection::Market,
            self.account.refresh_market(
                gateway,
                &descriptors,
                capabilities.fixed_staking,
                capabilities.flexible_staking,
            ),
        );
        if capabilities.fixed_staking {
            report.record(
                RefreshSection::FixedStakes,
                self.ledger
                    .list_fixed_stakes(gateway, &descriptors, &owner, &now),
            );
        }
        if capabilities.flexible_staking {
            report.record(
                RefreshSection::FlexibleStake,
                self.ledger
                    .get_flexible_stake(gateway, &descriptors, &owner, &now),
            );
        }
        debug!("refresh finished with {} errors", report.errors.len());
        report
    }

    /// Re-syncs what a confirmed transaction of KIND can have changed.
    fn resync(&mut self, kind: ActionKind, target: Option<ActionTarget>) -> RefreshReport {
        let mut report = RefreshReport::default();
        let (owner, descriptors) = match (self.owner(), self.descriptors.require()) {
            (Ok(owner), Ok(descriptors)) => (owner, descriptors.clone()),
            (Err(err), _) | (_, Err(err)) => {
                report.errors.push((RefreshSection::Descriptors, err));
                return report;
            }
        };
        let now = self.chain_now();
        let capabilities = self.config.capabilities.clone();
        let gateway = &self.gateway;

        report.record(
            RefreshSection::Balance,
            self.account.refresh_balance(gateway, &descriptors, &owner),
        );
        report.record(
            RefreshSection::Allowance,
            self.account.refresh_allowance(gateway, &descriptors, &owner),
        );
        if kind == ActionKind::Approve {
            return report;
        }
        report.record(
            RefreshSection::Market,
            self.account.refresh_market(
                gateway,
                &descriptors,
                capabilities.fixed_staking,
                capabilities.flexible_staking,
            ),
        );
        match (kind, target) {
            (ActionKind::UnstakeFixed, Some(ActionTarget::Stake(stake_id))) => report.record(
                RefreshSection::FixedStakes,
                self.ledger
                    .refresh_fixed_stake(gateway, &descriptors, stake_id, &now),
            ),
            (ActionKind::StakeFixed | ActionKind::UnstakeFixed, _) => report.record(
                RefreshSection::FixedStakes,
                self.ledger
                    .list_fixed_stakes(gateway, &descriptors, &owner, &now),
            ),
            _ => report.record(
                RefreshSection::FlexibleStake,
                self.ledger
                    .get_flexible_stake(gateway, &descriptors, &owner, &now),
            ),
        }
        report
    }

    fn submit(
        &mut self,
        kind: ActionKind,
        target: ActionTarget,
        contract: &Addr,
        msg: &impl Serialize,
    ) -> Result<TxHash, StakeError> {
        self.orchestrator.begin(kind, target)?;
        match self.gateway.write_call(contract, msg) {
            Ok(hash) => {
                info!("{kind} submitted as {hash}");
                self.orchestrator.submitted(kind, hash.clone());
                Ok(hash)
            }
            Err(err) => {
                self.orchestrator.fail(kind, err.clone());
                Err(err)
            }
        }
    }

    pub fn request_stake_fixed(&mut self, amount: Uint128) -> Result<RequestOutcome, StakeError> {
        self.request_stake(ActionKind::StakeFixed, amount)
    }

    pub fn request_stake_flexible(&mut self, amount: Uint128) -> Result<RequestOutcome, StakeError> {
        self.request_stake(ActionKind::StakeFlexible, amount)
    }

    /// Submits the stake when the allowance covers AMOUNT, otherwise an
    /// approval for the shortfall. The stake is never submitted in the
    /// same call as the approval.
    fn request_stake(&mut self, kind: ActionKind, amount: Uint128) -> Result<RequestOutcome, StakeError> {
        self.orchestrator.ensure_idle(kind)?;
        let owner = self.owner()?;
        let descriptors = self.descriptors.require()?.clone();
        check_amount(amount)?;

        let allowance = match self.account.allowance() {
            Some(allowance) => allowance.clone(),
            None => self
                .account
                .refresh_allowance(&self.gateway, &descriptors, &owner)?
                .clone(),
        };

        match check_stake(amount, &allowance) {
            Ok(()) => {
                let msg = match kind {
                    ActionKind::StakeFixed => ExecuteMsg::StakeFixed { amount },
                    _ => ExecuteMsg::StakeFlexible { amount },
                };
                let hash = self.submit(
                    kind,
                    ActionTarget::Amount(amount),
                    &descriptors.staking_contract,
                    &msg,
                )?;
                Ok(RequestOutcome::Submitted { kind, hash })
            }
            Err(StakeError::InsufficientAllowance { allowance, required }) => {
                info!("{kind} of {required} needs approval, allowance is {allowance}");
                let msg = Cw20ExecuteMsg::IncreaseAllowance {
                    spender: descriptors.staking_contract.to_string(),
                    amount: required - allowance,
                    expires: None,
                };
                let hash = self.submit(
                    ActionKind::Approve,
                    ActionTarget::Amount(required),
                    &descriptors.token,
                    &msg,
                )?;
                Ok(RequestOutcome::ApprovalSubmitted { hash, required })
            }
            Err(err) => Err(err),
        }
    }

    pub fn request_unstake_fixed(&mut self, stake_id: u64) -> Result<RequestOutcome, StakeError> {
        let kind = ActionKind::UnstakeFixed;
        self.orchestrator.ensure_idle(kind)?;
        let contract = self.descriptors.require()?.staking_contract.clone();
        check_unstake_fixed(stake_id, self.ledger.fixed_stake(stake_id))?;

        let hash = self.submit(
            kind,
            ActionTarget::Stake(stake_id),
            &contract,
            &ExecuteMsg::UnstakeFixed { stake_id },
        )?;
        Ok(RequestOutcome::Submitted { kind, hash })
    }

    /// Inside the cooldown this only returns the forfeit warning, unless
    /// FORFEIT_CONFIRMED is set.
    pub fn request_unstake_flexible(
        &mut self,
        amount: Uint128,
        forfeit_confirmed: bool,
    ) -> Result<RequestOutcome, StakeError> {
        let kind = ActionKind::UnstakeFlexible;
        self.orchestrator.ensure_idle(kind)?;
        let contract = self.descriptors.require()?.staking_contract.clone();
        let gate = check_unstake_flexible(
            amount,
            self.ledger.flexible_stake(),
            &self.now(),
            forfeit_confirmed,
        )?;
        if let FlexibleUnstakeGate::ConfirmForfeit {
            accumulated_reward,
            cooldown_remaining,
        } = gate
        {
            info!("unstaking {amount} forfeits {accumulated_reward}, waiting for confirmation");
            return Ok(RequestOutcome::ForfeitConfirmationRequired {
                accumulated_reward,
                cooldown_remaining,
            });
        }

        let hash = self.submit(
            kind,
            ActionTarget::Amount(amount),
            &contract,
            &ExecuteMsg::UnstakeFlexible { amount },
        )?;
        Ok(RequestOutcome::Submitted { kind, hash })
    }

    pub fn request_claim_flexible(&mut self) -> Result<RequestOutcome, StakeError> {
        let kind = ActionKind::ClaimFlexible;
        self.orchestrator.ensure_idle(kind)?;
        let contract = self.descriptors.require()?.staking_contract.clone();
        check_claim(self.ledger.flexible_stake())?;

        let hash = self.submit(
            kind,
            ActionTarget::Rewards,
            &contract,
            &ExecuteMsg::ClaimFlexibleRewards {},
        )?;
        Ok(RequestOutcome::Submitted { kind, hash })
    }

    /// Waits for the transaction of KIND submitted earlier. On success the
    /// balance, the allowance and the touched stake records are re-read;
    /// on failure nothing cached is changed.
    pub fn await_confirmation(&mut self, kind: ActionKind) -> Result<RefreshReport, StakeError> {
        let (hash, target) = self.orchestrator.awaiting(kind)?;
        match self.gateway.await_confirmation(&hash) {
            Ok(()) => {
                self.orchestrator.confirm(kind);
                Ok(self.resync(kind, target))
            }
            Err(err) => {
                self.orchestrator.fail(kind, err.clone());
                Err(err)
            }
        }
    }
}
