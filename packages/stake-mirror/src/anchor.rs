use cosmwasm_std::{Decimal, Timestamp, Uint128};

use crate::config::AnchorKind;

/// The chain as seen at one instant: the local clock's time and the
/// latest known block height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainNow {
    pub time: Timestamp,
    pub height: u64,
}

/// The point a stake is measured from, as reported by the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    Timestamp(Timestamp),
    BlockNumber {
        height: u64,
        block_time_seconds: Decimal,
    },
}

fn blocks_to_seconds(blocks: u64, block_time_seconds: Decimal) -> u64 {
    let seconds = Uint128::from(blocks) * block_time_seconds;
    u64::try_from(seconds.u128()).unwrap_or(u64::MAX)
}

impl Anchor {
    pub fn from_raw(kind: &AnchorKind, raw: u64) -> Self {
        match kind {
            AnchorKind::Timestamp => Anchor::Timestamp(Timestamp::from_seconds(raw)),
            AnchorKind::BlockNumber { block_time_seconds } => Anchor::BlockNumber {
                height: raw,
                block_time_seconds: *block_time_seconds,
            },
        }
    }

    /// The raw value the contract reported.
    pub fn raw(&self) -> u64 {
        match self {
            Anchor::Timestamp(time) => time.seconds(),
            Anchor::BlockNumber { height, .. } => *height,
        }
    }

    /// Seconds between the anchor and NOW. Estimated for block anchors.
    pub fn elapsed_seconds(&self, now: &ChainNow) -> u64 {
        match self {
            Anchor::Timestamp(time) => now.time.seconds().saturating_sub(time.seconds()),
            Anchor::BlockNumber {
                height,
                block_time_seconds,
            } => blocks_to_seconds(now.height.saturating_sub(*height), *block_time_seconds),
        }
    }

    /// Converts UNITS of this anchor's kind (seconds or blocks) to
    /// seconds.
    pub fn seconds_for(&self, units: u64) -> u64 {
        match self {
            Anchor::Timestamp(_) => units,
            Anchor::BlockNumber {
                block_time_seconds, ..
            } => blocks_to_seconds(units, *block_time_seconds),
        }
    }

    /// Wall-clock time of the anchor. Estimated for block anchors.
    pub fn time(&self, now: &ChainNow) -> Timestamp {
        match self {
            Anchor::Timestamp(time) => *time,
            Anchor::BlockNumber { .. } => now.time.minus_seconds(self.elapsed_seconds(now)),
        }
    }
}
