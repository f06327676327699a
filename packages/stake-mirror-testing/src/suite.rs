use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use cosmwasm_std::{Addr, Decimal, Uint128};
use cw20::{Cw20Coin, Cw20ExecuteMsg};
use cw_multi_test::{App, AppResponse, Executor};
use fixed_flex_staking::msg::InstantiateMsg;
use fixed_flex_staking::state::AnchorMode;
use stake_mirror::config::{
    AnchorKind, ConfirmationPolicy, DashboardConfig, StakingCapabilities,
};
use stake_mirror::StakeDashboard;
use stake_mirror_interface::msg::ExecuteMsg;

use crate::contracts::{cw20_base_contract, fixed_flex_staking_contract};
use crate::provider::{AppClock, ChainState, MultiTestProvider, BLOCK_TIME_SECONDS};

pub const OWNER: &str = "owner";
pub const STAKER: &str = "staker";
pub const OTHER: &str = "other";

pub const DAY: u64 = 24 * 60 * 60;
pub const DECIMALS: u8 = 6;
/// One whole token in raw units.
pub const TOKEN: u128 = 1_000_000;

pub type TestDashboard = StakeDashboard<MultiTestProvider, AppClock>;

pub struct SuiteBuilder {
    pub initial_balances: Vec<Cw20Coin>,
    pub reward_pool: Uint128,
    /// Anchor the staking contract uses. Block anchors assume
    /// `BLOCK_TIME_SECONDS` per block.
    pub block_anchors: bool,
    pub fixed_duration_days: u64,
    pub fixed_apy_bps: u64,
    pub flexible_apy_bps: u64,
    pub flexible_reward_interval_seconds: u64,
    pub capabilities: StakingCapabilities,
    pub max_polls: u32,
}

impl Default for SuiteBuilder {
    fn default() -> Self {
        Self {
            initial_balances: vec![
                Cw20Coin {
                    address: STAKER.to_string(),
                    amount: Uint128::new(1_000 * TOKEN),
                },
                Cw20Coin {
                    address: OTHER.to_string(),
                    amount: Uint128::new(1_000 * TOKEN),
                },
            ],
            reward_pool: Uint128::new(1_000_000 * TOKEN),
            block_anchors: false,
            fixed_duration_days: 30,
            fixed_apy_bps: 3_000,
            flexible_apy_bps: 1_000,
            flexible_reward_interval_seconds: DAY,
            capabilities: StakingCapabilities::default(),
            max_polls: 3,
        }
    }
}

impl SuiteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_balances(mut self, initial_balances: Vec<Cw20Coin>) -> Self {
        self.initial_balances = initial_balances;
        self
    }

    pub fn with_block_anchors(mut self) -> Self {
        self.block_anchors = true;
        self
    }

    pub fn with_fixed_duration_days(mut self, days: u64) -> Self {
        self.fixed_duration_days = days;
        self
    }

    pub fn with_flexible_reward_interval(mut self, seconds: u64) -> Self {
        self.flexible_reward_interval_seconds = seconds;
        self
    }

    pub fn with_capabilities(mut self, capabilities: StakingCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Converts seconds to the staking contract's anchor units.
    fn anchor_units(&self, seconds: u64) -> u64 {
        if self.block_anchors {
            seconds / BLOCK_TIME_SECONDS
        } else {
            seconds
        }
    }

    pub fn build(self) -> Suite {
        let mut app = App::default();
        let owner = Addr::unchecked(OWNER);

        let cw20_id = app.store_code(cw20_base_contract());
        let staking_id = app.store_code(fixed_flex_staking_contract());

        let mut initial_balances = self.initial_balances.clone();
        initial_balances.push(Cw20Coin {
            address: OWNER.to_string(),
            amount: self.reward_pool,
        });
        let token = app
            .instantiate_contract(
                cw20_id,
                owner.clone(),
                &cw20_base::msg::InstantiateMsg {
                    name: "Mirror Token".to_string(),
                    symbol: "MIRROR".to_string(),
                    decimals: DECIMALS,
                    initial_balances,
                    mint: None,
                    marketing: None,
                },
                &[],
                "token",
                None,
            )
            .unwrap();

        let anchor = if self.block_anchors {
            AnchorMode::Height {
                blocks_per_year: self.anchor_units(365 * DAY),
            }
        } else {
            AnchorMode::Time {}
        };
        let staking = app
            .instantiate_contract(
                staking_id,
                owner.clone(),
                &InstantiateMsg {
                    token_address: token.to_string(),
                    anchor,
                    fixed_duration: self.anchor_units(self.fixed_duration_days * DAY),
                    fixed_apy_bps: self.fixed_apy_bps,
                    flexible_apy_bps: self.flexible_apy_bps,
                    flexible_reward_interval: self
                        .anchor_units(self.flexible_reward_interval_seconds),
                },
                &[],
                "staking",
                None,
            )
            .unwrap();

        app.execute_contract(
            owner,
            token.clone(),
            &Cw20ExecuteMsg::Transfer {
                recipient: staking.to_string(),
                amount: self.reward_pool,
            },
            &[],
        )
        .unwrap();

        let config = DashboardConfig {
            staking_contract: staking.to_string(),
            anchor: if self.block_anchors {
                AnchorKind::BlockNumber {
                    block_time_seconds: Decimal::from_ratio(BLOCK_TIME_SECONDS, 1u64),
                }
            } else {
                AnchorKind::Timestamp
            },
            fixed_duration_days: self.fixed_duration_days,
            fixed_annual_rate: Decimal::from_ratio(self.fixed_apy_bps, 10_000u64),
            capabilities: self.capabilities,
            confirmation: ConfirmationPolicy {
                max_polls: self.max_polls,
                poll_interval_ms: 0,
            },
        };

        let chain = Rc::new(RefCell::new(ChainState::new(app, Addr::unchecked(STAKER))));
        let dashboard = StakeDashboard::with_clock(
            config,
            MultiTestProvider::new(chain.clone()),
            AppClock::new(chain.clone()),
        )
        .unwrap();

        Suite {
            dashboard,
            chain,
            token,
            staking,
        }
    }
}

pub struct Suite {
    pub dashboard: TestDashboard,
    pub chain: Rc<RefCell<ChainState>>,
    pub token: Addr,
    pub staking: Addr,
}

impl Suite {
    pub fn chain(&self) -> Ref<'_, ChainState> {
        self.chain.borrow()
    }

    pub fn chain_mut(&self) -> RefMut<'_, ChainState> {
        self.chain.borrow_mut()
    }

    /// Moves the chain forward by SECONDS, one block per
    /// `BLOCK_TIME_SECONDS`.
    pub fn advance(&self, seconds: u64) {
        self.chain_mut().app.update_block(|block| {
            block.time = block.time.plus_seconds(seconds);
            block.height += seconds / BLOCK_TIME_SECONDS;
        });
    }

    pub fn balance(&self, address: &str) -> Uint128 {
        let response: cw20::BalanceResponse = self
            .chain()
            .app
            .wrap()
            .query_wasm_smart(
                &self.token,
                &cw20::Cw20QueryMsg::Balance {
                    address: address.to_string(),
                },
            )
            .unwrap();
        response.balance
    }

    /// Executes a token message as SENDER, bypassing the dashboard.
    pub fn execute_token(&self, sender: &str, msg: &Cw20ExecuteMsg) -> anyhow::Result<AppResponse> {
        let token = self.token.clone();
        self.chain_mut()
            .app
            .execute_contract(Addr::unchecked(sender), token, msg, &[])
    }

    /// Executes a staking message as SENDER, bypassing the dashboard.
    pub fn execute_staking(&self, sender: &str, msg: &ExecuteMsg) -> anyhow::Result<AppResponse> {
        let staking = self.staking.clone();
        self.chain_mut()
            .app
            .execute_contract(Addr::unchecked(sender), staking, msg, &[])
    }

    pub fn approve(&self, sender: &str, amount: u128) {
        self.execute_token(
            sender,
            &Cw20ExecuteMsg::IncreaseAllowance {
                spender: self.staking.to_string(),
                amount: Uint128::new(amount),
                expires: None,
            },
        )
        .unwrap();
    }

    /// Approves and stakes AMOUNT as a fixed stake for SENDER directly on
    /// chain.
    pub fn stake_fixed_on_chain(&self, sender: &str, amount: u128) {
        self.approve(sender, amount);
        self.execute_staking(
            sender,
            &ExecuteMsg::StakeFixed {
                amount: Uint128::new(amount),
            },
        )
        .unwrap();
    }

    pub fn stake_flexible_on_chain(&self, sender: &str, amount: u128) {
        self.approve(sender, amount);
        self.execute_staking(
            sender,
            &ExecuteMsg::StakeFlexible {
                amount: Uint128::new(amount),
            },
        )
        .unwrap();
    }
}
