use std::collections::BTreeMap;
use std::fmt;

use cosmwasm_std::Uint128;
use log::{debug, warn};

use crate::account::AllowanceState;
use crate::anchor::ChainNow;
use crate::error::StakeError;
use crate::gateway::TxHash;
use crate::ledger::{FixedStakeRecord, FlexibleStakeRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    Approve,
    StakeFixed,
    StakeFlexible,
    UnstakeFixed,
    UnstakeFlexible,
    ClaimFlexible,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Approve,
        ActionKind::StakeFixed,
        ActionKind::StakeFlexible,
        ActionKind::UnstakeFixed,
        ActionKind::UnstakeFlexible,
        ActionKind::ClaimFlexible,
    ];
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Approve => "approve",
            ActionKind::StakeFixed => "stake fixed",
            ActionKind::StakeFlexible => "stake flexible",
            ActionKind::UnstakeFixed => "unstake fixed",
            ActionKind::UnstakeFlexible => "unstake flexible",
            ActionKind::ClaimFlexible => "claim flexible",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransactionStatus {
    #[default]
    Idle,
    Submitting,
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Submitting | TransactionStatus::AwaitingConfirmation
        )
    }
}

/// What a transaction acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionTarget {
    Amount(Uint128),
    Stake(u64),
    Rewards,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PendingTransaction {
    pub kind: ActionKind,
    pub target: Option<ActionTarget>,
    pub submitted_hash: Option<TxHash>,
    pub status: TransactionStatus,
    /// Why the last attempt failed, kept until the next one starts.
    pub error: Option<StakeError>,
}

impl PendingTransaction {
    pub fn idle(kind: ActionKind) -> Self {
        Self {
            kind,
            target: None,
            submitted_hash: None,
            status: TransactionStatus::Idle,
            error: None,
        }
    }
}

/// What a `request_*` call did.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestOutcome {
    Submitted { kind: ActionKind, hash: TxHash },
    /// The allowance did not cover the stake, so an approval was
    /// submitted instead. The stake has to be requested again once the
    /// approval confirms.
    ApprovalSubmitted { hash: TxHash, required: Uint128 },
    /// Unstaking now forfeits the accumulated reward. Nothing was
    /// submitted; repeat the request with the forfeit confirmed.
    ForfeitConfirmationRequired {
        accumulated_reward: Uint128,
        cooldown_remaining: u64,
    },
}

/// One transaction slot per action kind.
#[derive(Clone, Debug, Default)]
pub struct TransactionOrchestrator {
    slots: BTreeMap<ActionKind, PendingTransaction>,
}

impl TransactionOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, kind: ActionKind) -> TransactionStatus {
        self.slots
            .get(&kind)
            .map(|pending| pending.status)
            .unwrap_or_default()
    }

    pub fn pending(&self, kind: ActionKind) -> Option<&PendingTransaction> {
        self.slots.get(&kind)
    }

    /// Every kind, idle ones included, in `ActionKind` order.
    pub fn snapshot(&self) -> Vec<PendingTransaction> {
        ActionKind::ALL
            .iter()
            .map(|kind| {
                self.slots
                    .get(kind)
                    .cloned()
                    .unwrap_or_else(|| PendingTransaction::idle(*kind))
            })
            .collect()
    }

    pub fn ensure_idle(&self, kind: ActionKind) -> Result<(), StakeError> {
        if self.status(kind).is_active() {
            debug!("rejecting {kind}: already in progress");
            return Err(StakeError::ActionAlreadyInProgress { kind });
        }
        Ok(())
    }

    /// `Idle -> Submitting`.
    pub fn begin(&mut self, kind: ActionKind, target: ActionTarget) -> Result<(), StakeError> {
        self.ensure_idle(kind)?;
        self.slots.insert(
            kind,
            PendingTransaction {
                target: Some(target),
                status: TransactionStatus::Submitting,
                ..PendingTransaction::idle(kind)
            },
        );
        Ok(())
    }

    /// `Submitting -> AwaitingConfirmation`.
    pub fn submitted(&mut self, kind: ActionKind, hash: TxHash) {
        if let Some(pending) = self.slots.get_mut(&kind) {
            pending.submitted_hash = Some(hash);
            pending.status = TransactionStatus::AwaitingConfirmation;
        }
    }

    /// The hash and target of the transaction of KIND awaiting
    /// confirmation.
    pub fn awaiting(&self, kind: ActionKind) -> Result<(TxHash, Option<ActionTarget>), StakeError> {
        match self.slots.get(&kind) {
            Some(PendingTransaction {
                status: TransactionStatus::AwaitingConfirmation,
                submitted_hash: Some(hash),
                target,
                ..
            }) => Ok((hash.clone(), *target)),
            _ => Err(StakeError::NothingPending { kind }),
        }
    }

    pub fn confirm(&mut self, kind: ActionKind) {
        if let Some(pending) = self.slots.get_mut(&kind) {
            pending.status = TransactionStatus::Confirmed;
            pending.error = None;
        }
    }

    pub fn fail(&mut self, kind: ActionKind, err: StakeError) {
        warn!("{kind} failed: {err}");
        let pending = self
            .slots
            .entry(kind)
            .or_insert_with(|| PendingTransaction::idle(kind));
        pending.status = TransactionStatus::Failed;
        pending.error = Some(err);
    }

    /// Drops every slot. Used when the connected identity changes.
    pub fn reset(&mut self) {
        self.slots.clear();
    }
}

/// Outcome of the flexible unstake precondition check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlexibleUnstakeGate {
    Proceed,
    ConfirmForfeit {
        accumulated_reward: Uint128,
        cooldown_remaining: u64,
    },
}

pub fn check_amount(amount: Uint128) -> Result<(), StakeError> {
    if amount.is_zero() {
        return Err(StakeError::ZeroAmount {});
    }
    Ok(())
}

/// Stakes need an allowance covering the whole amount before the stake
/// call is attempted.
pub fn check_stake(amount: Uint128, allowance: &AllowanceState) -> Result<(), StakeError> {
    check_amount(amount)?;
    if !allowance.covers(amount) {
        return Err(StakeError::InsufficientAllowance {
            allowance: allowance.raw_allowance,
            required: amount,
        });
    }
    Ok(())
}

pub fn check_unstake_fixed(
    stake_id: u64,
    stake: Option<&FixedStakeRecord>,
) -> Result<&FixedStakeRecord, StakeError> {
    let stake = stake.ok_or(StakeError::UnknownStake { stake_id })?;
    if stake.withdrawn {
        return Err(StakeError::StakeAlreadyWithdrawn { stake_id });
    }
    Ok(stake)
}

/// Unstaking inside the cooldown forfeits the accumulated reward, so it
/// only proceeds once FORFEIT_CONFIRMED is set.
pub fn check_unstake_flexible(
    amount: Uint128,
    stake: Option<&FlexibleStakeRecord>,
    now: &ChainNow,
    forfeit_confirmed: bool,
) -> Result<FlexibleUnstakeGate, StakeError> {
    check_amount(amount)?;
    let staked = stake.map(|stake| stake.principal).unwrap_or_default();
    let stake = match stake {
        Some(stake) if amount <= stake.principal => stake,
        _ => {
            return Err(StakeError::InvalidUnstakeAmount {
                requested: amount,
                staked,
            })
        }
    };
    let cooldown_remaining = stake.cooldown_remaining_at(now);
    if cooldown_remaining > 0 && !forfeit_confirmed {
        return Ok(FlexibleUnstakeGate::ConfirmForfeit {
            accumulated_reward: stake.accumulated_reward,
            cooldown_remaining,
        });
    }
    Ok(FlexibleUnstakeGate::Proceed)
}

pub fn check_claim(stake: Option<&FlexibleStakeRecord>) -> Result<Uint128, StakeError> {
    match stake {
        Some(stake) if !stake.accumulated_reward.is_zero() => Ok(stake.accumulated_reward),
        _ => Err(StakeError::NothingToClaim {}),
    }
}
