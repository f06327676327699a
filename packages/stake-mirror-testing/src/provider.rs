use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use anyhow::anyhow;
use cosmwasm_std::{
    to_json_binary, to_json_vec, Addr, Binary, ContractResult, CosmosMsg, Empty, QueryRequest,
    SystemResult, Timestamp, WasmMsg, WasmQuery,
};
use cw_multi_test::{App, Executor};
use log::debug;
use serde::Serialize;
use stake_mirror::clock::Clock;
use stake_mirror::gateway::{ChainHead, Inclusion, ProviderError, TxHash, WalletEvent};
use stake_mirror::Provider;

/// Seconds per block when the suite advances the chain.
pub const BLOCK_TIME_SECONDS: u64 = 5;

/// A browser wallet as seen by the dashboard.
#[derive(Clone, Debug)]
pub struct MockWallet {
    pub installed: bool,
    pub reject_connect: bool,
    pub reject_signing: bool,
    pub account: Addr,
    pub chain_id: String,
    pub events: Vec<WalletEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallCounters {
    pub queries: u32,
    pub broadcasts: u32,
    pub inclusion_polls: u32,
}

#[derive(Clone, Debug)]
enum TxState {
    Queued {
        sender: Addr,
        contract: Addr,
        msg: Binary,
    },
    Done(Inclusion),
}

pub struct ChainState {
    pub app: App,
    pub wallet: MockWallet,
    pub counters: CallCounters,
    /// Keep broadcast transactions out of blocks until released.
    pub hold: bool,
    /// Fail every query and chain head read.
    pub offline: bool,
    /// Inclusion polls that fail with a transport error before the next
    /// one gets through.
    pub flaky_polls: u32,
    /// Broadcast transactions by hash, in submission order.
    txs: BTreeMap<TxHash, TxState>,
    overrides: HashMap<(Addr, Binary), Binary>,
}

impl ChainState {
    pub fn new(app: App, account: Addr) -> Self {
        let chain_id = app.block_info().chain_id;
        Self {
            app,
            wallet: MockWallet {
                installed: true,
                reject_connect: false,
                reject_signing: false,
                account,
                chain_id,
                events: vec![],
            },
            counters: CallCounters::default(),
            hold: false,
            offline: false,
            flaky_polls: 0,
            txs: BTreeMap::new(),
            overrides: HashMap::new(),
        }
    }

    /// Answers MSG sent to CONTRACT with RESPONSE instead of asking the
    /// contract.
    pub fn override_query(
        &mut self,
        contract: &Addr,
        msg: &impl Serialize,
        response: &impl Serialize,
    ) -> anyhow::Result<()> {
        self.overrides
            .insert((contract.clone(), to_json_binary(msg)?), to_json_binary(response)?);
        Ok(())
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    /// Hashes of transactions that were broadcast but are not in a block.
    pub fn queued(&self) -> Vec<TxHash> {
        self.txs
            .iter()
            .filter(|(_, state)| matches!(state, TxState::Queued { .. }))
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    /// Executes every queued transaction, as a block would.
    pub fn release(&mut self) {
        self.hold = false;
        for hash in self.queued() {
            self.include(&hash);
        }
    }

    fn include(&mut self, hash: &TxHash) -> Inclusion {
        let inclusion = match self.txs.get(hash) {
            Some(TxState::Queued {
                sender,
                contract,
                msg,
            }) => {
                let execute = WasmMsg::Execute {
                    contract_addr: contract.to_string(),
                    msg: msg.clone(),
                    funds: vec![],
                };
                match self
                    .app
                    .execute(sender.clone(), CosmosMsg::<Empty>::Wasm(execute))
                {
                    Ok(_) => Inclusion::Included,
                    Err(err) => Inclusion::Reverted {
                        reason: Some(err.root_cause().to_string()),
                    },
                }
            }
            Some(TxState::Done(inclusion)) => return inclusion.clone(),
            None => return Inclusion::Pending,
        };
        debug!("{hash} included: {inclusion:?}");
        self.txs.insert(hash.clone(), TxState::Done(inclusion.clone()));
        inclusion
    }
}

/// `Provider` backed by a shared multi-test chain. Clones share the
/// same chain.
#[derive(Clone)]
pub struct MultiTestProvider {
    state: Rc<RefCell<ChainState>>,
}

impl MultiTestProvider {
    pub fn new(state: Rc<RefCell<ChainState>>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> Rc<RefCell<ChainState>> {
        self.state.clone()
    }
}

fn offline() -> ProviderError {
    ProviderError::Transport(anyhow!("connection refused"))
}

impl Provider for MultiTestProvider {
    fn request_account(&mut self) -> Result<Addr, ProviderError> {
        let state = self.state.borrow();
        if !state.wallet.installed {
            return Err(ProviderError::NoProvider);
        }
        if state.wallet.reject_connect {
            return Err(ProviderError::Rejected);
        }
        Ok(state.wallet.account.clone())
    }

    fn chain_id(&self) -> Result<String, ProviderError> {
        Ok(self.state.borrow().wallet.chain_id.clone())
    }

    fn take_events(&mut self) -> Vec<WalletEvent> {
        std::mem::take(&mut self.state.borrow_mut().wallet.events)
    }

    fn latest_block(&self) -> Result<ChainHead, ProviderError> {
        let state = self.state.borrow();
        if state.offline {
            return Err(offline());
        }
        let block = state.app.block_info();
        Ok(ChainHead {
            height: block.height,
            time: block.time,
        })
    }

    fn query_smart(&self, contract: &Addr, msg: Binary) -> Result<Binary, ProviderError> {
        let mut state = self.state.borrow_mut();
        state.counters.queries += 1;
        if state.offline {
            return Err(offline());
        }
        if let Some(response) = state.overrides.get(&(contract.clone(), msg.clone())) {
            return Ok(response.clone());
        }

        let request: QueryRequest<Empty> = QueryRequest::Wasm(WasmQuery::Smart {
            contract_addr: contract.to_string(),
            msg,
        });
        let raw = to_json_vec(&request).map_err(|err| ProviderError::Transport(err.into()))?;
        match state.app.wrap().raw_query(&raw) {
            SystemResult::Ok(ContractResult::Ok(data)) => Ok(data),
            SystemResult::Ok(ContractResult::Err(err)) => Err(ProviderError::Transport(anyhow!(err))),
            SystemResult::Err(err) => Err(ProviderError::Transport(anyhow!(err.to_string()))),
        }
    }

    fn broadcast(
        &mut self,
        sender: &Addr,
        contract: &Addr,
        msg: Binary,
    ) -> Result<TxHash, ProviderError> {
        let mut state = self.state.borrow_mut();
        state.counters.broadcasts += 1;
        if state.wallet.reject_signing || *sender != state.wallet.account {
            return Err(ProviderError::Rejected);
        }
        let hash = TxHash(format!("TX{:04}", state.txs.len() + 1));
        state.txs.insert(
            hash.clone(),
            TxState::Queued {
                sender: sender.clone(),
                contract: contract.clone(),
                msg,
            },
        );
        Ok(hash)
    }

    fn inclusion(&mut self, hash: &TxHash) -> Result<Inclusion, ProviderError> {
        let mut state = self.state.borrow_mut();
        state.counters.inclusion_polls += 1;
        if state.flaky_polls > 0 {
            state.flaky_polls -= 1;
            return Err(ProviderError::Transport(anyhow!("timed out reaching node")));
        }
        if !state.txs.contains_key(hash) {
            return Err(ProviderError::Transport(anyhow!("unknown transaction {hash}")));
        }
        if state.hold && state.queued().contains(hash) {
            return Ok(Inclusion::Pending);
        }
        Ok(state.include(hash))
    }
}

/// Reads the local time from the chain's latest block.
#[derive(Clone)]
pub struct AppClock {
    state: Rc<RefCell<ChainState>>,
}

impl AppClock {
    pub fn new(state: Rc<RefCell<ChainState>>) -> Self {
        Self { state }
    }
}

impl Clock for AppClock {
    fn now(&self) -> Timestamp {
        self.state.borrow().app.block_info().time
    }
}
