//! The only place the engine touches the outside world. Everything that
//! leaves this module is a [`StakeError`]; raw provider failures never do.

use std::fmt;
use std::thread;

use cosmwasm_std::{from_json, to_json_binary, Addr, Binary, Timestamp};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfirmationPolicy;
use crate::error::StakeError;

/// Identifier the network assigns to a broadcast transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TxHash {
    fn from(hash: &str) -> Self {
        TxHash(hash.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainHead {
    pub height: u64,
    pub time: Timestamp,
}

/// Whether a broadcast transaction has made it into a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inclusion {
    Pending,
    Included,
    Reverted { reason: Option<String> },
}

/// Notifications pushed by the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    Disconnected,
    AccountChanged(Addr),
    ChainChanged(String),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("no wallet provider is installed")]
    NoProvider,

    #[error("request rejected by the wallet")]
    Rejected,

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// A wallet plus the network endpoint it signs for.
pub trait Provider {
    /// Asks the wallet for access to its active account.
    fn request_account(&mut self) -> Result<Addr, ProviderError>;

    fn chain_id(&self) -> Result<String, ProviderError>;

    /// Drains wallet notifications received since the last call.
    fn take_events(&mut self) -> Vec<WalletEvent>;

    fn latest_block(&self) -> Result<ChainHead, ProviderError>;

    /// Runs a smart query against CONTRACT and returns the raw JSON
    /// response.
    fn query_smart(&self, contract: &Addr, msg: Binary) -> Result<Binary, ProviderError>;

    /// Signs and broadcasts an execute message. Returns once the network
    /// has accepted the transaction, not once it is included.
    fn broadcast(
        &mut self,
        sender: &Addr,
        contract: &Addr,
        msg: Binary,
    ) -> Result<TxHash, ProviderError>;

    fn inclusion(&mut self, hash: &TxHash) -> Result<Inclusion, ProviderError>;
}

/// Who is connected, and to which chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountContext {
    pub address: Option<Addr>,
    pub chain_id: Option<String>,
}

impl AccountContext {
    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }
}

pub struct ChainGateway<P> {
    provider: P,
    account: AccountContext,
    policy: ConfirmationPolicy,
}

impl<P: Provider> ChainGateway<P> {
    pub fn new(provider: P, policy: ConfirmationPolicy) -> Self {
        Self {
            provider,
            account: AccountContext::default(),
            policy,
        }
    }

    pub fn account(&self) -> &AccountContext {
        &self.account
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn connect(&mut self) -> Result<&AccountContext, StakeError> {
        let address = self.provider.request_account()?;
        let chain_id = self.provider.chain_id()?;
        info!("connected {address} on {chain_id}");
        self.account = AccountContext {
            address: Some(address),
            chain_id: Some(chain_id),
        };
        Ok(&self.account)
    }

    pub fn disconnect(&mut self) {
        if let Some(address) = self.account.address.take() {
            info!("disconnected {address}");
        }
        self.account = AccountContext::default();
    }

    /// Drains pending wallet notifications and applies them to the
    /// account context. The events are returned so dependants can drop
    /// state that belonged to the previous identity.
    pub fn take_events(&mut self) -> Vec<WalletEvent> {
        let events = self.provider.take_events();
        for event in &events {
            info!("wallet event: {event:?}");
            match event {
                WalletEvent::Disconnected => self.account = AccountContext::default(),
                WalletEvent::AccountChanged(address) => {
                    if self.account.is_connected() {
                        self.account.address = Some(address.clone());
                    }
                }
                WalletEvent::ChainChanged(chain_id) => {
                    if self.account.is_connected() {
                        self.account.chain_id = Some(chain_id.clone());
                    }
                }
            }
        }
        events
    }

    pub fn latest_block(&self) -> Result<ChainHead, StakeError> {
        Ok(self.provider.latest_block()?)
    }

    pub fn read_call<T: DeserializeOwned>(
        &self,
        target: &Addr,
        msg: &impl Serialize,
    ) -> Result<T, StakeError> {
        let msg = to_json_binary(msg).map_err(StakeError::decode)?;
        debug!("query {target}: {}", String::from_utf8_lossy(msg.as_slice()));
        let data = self.provider.query_smart(target, msg)?;
        from_json(&data).map_err(StakeError::decode)
    }

    pub fn write_call(&mut self, target: &Addr, msg: &impl Serialize) -> Result<TxHash, StakeError> {
        let sender = self
            .account
            .address
            .clone()
            .ok_or(StakeError::NotConnected {})?;
        let msg = to_json_binary(msg).map_err(StakeError::decode)?;
        let hash = self.provider.broadcast(&sender, target, msg)?;
        info!("broadcast {hash} from {sender} to {target}");
        Ok(hash)
    }

    /// Polls until HASH is included or reverted. Transport failures while
    /// polling are not treated as an outcome; running out of polls gives
    /// a timeout, which says nothing about whether the transaction will
    /// still land.
    pub fn await_confirmation(&mut self, hash: &TxHash) -> Result<(), StakeError> {
        for poll in 0..self.policy.max_polls {
            if poll > 0 {
                thread::sleep(self.policy.poll_interval());
            }
            match self.provider.inclusion(hash) {
                Ok(Inclusion::Pending) => continue,
                Ok(Inclusion::Included) => {
                    info!("{hash} confirmed");
                    return Ok(());
                }
                Ok(Inclusion::Reverted { reason }) => {
                    warn!("{hash} reverted: {reason:?}");
                    return Err(StakeError::TransactionReverted {
                        hash: hash.clone(),
                        reason,
                    });
                }
                Err(err) => warn!("checking {hash} failed: {err:#}"),
            }
        }
        warn!("{hash} not confirmed after {} polls", self.policy.max_polls);
        Err(StakeError::TransactionTimeout { hash: hash.clone() })
    }
}
