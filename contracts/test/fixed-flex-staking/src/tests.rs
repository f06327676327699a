use cosmwasm_std::{Addr, Empty, Uint128};
use cw20::Cw20Coin;
use cw_multi_test::{App, AppResponse, Contract, ContractWrapper, Executor};

use anyhow::Result as AnyResult;

use crate::msg::{ExecuteMsg, FixedStakeResponse, FlexibleStakeResponse, InstantiateMsg, QueryMsg};
use crate::state::AnchorMode;
use crate::ContractError;

const ADDR1: &str = "addr0001";
const ADDR2: &str = "addr0002";

const DAY: u64 = 24 * 60 * 60;
const REWARD_POOL: u128 = 100_000_000;
const USER_BALANCE: u128 = 10_000_000;

pub fn contract_staking() -> Box<dyn Contract<Empty>> {
    let contract = ContractWrapper::new(
        crate::contract::execute,
        crate::contract::instantiate,
        crate::contract::query,
    );
    Box::new(contract)
}

pub fn contract_cw20() -> Box<dyn Contract<Empty>> {
    let contract = ContractWrapper::new(
        cw20_base::contract::execute,
        cw20_base::contract::instantiate,
        cw20_base::contract::query,
    );
    Box::new(contract)
}

fn mock_app() -> App {
    App::default()
}

fn instantiate_cw20(app: &mut App, initial_balances: Vec<Cw20Coin>) -> Addr {
    let cw20_id = app.store_code(contract_cw20());
    let msg = cw20_base::msg::InstantiateMsg {
        name: String::from("Test"),
        symbol: String::from("TEST"),
        decimals: 6,
        initial_balances,
        mint: None,
        marketing: None,
    };

    app.instantiate_contract(cw20_id, Addr::unchecked(ADDR1), &msg, &[], "cw20", None)
        .unwrap()
}

fn instantiate_staking(app: &mut App, cw20: &Addr, anchor: AnchorMode, fixed_duration: u64) -> Addr {
    let staking_code_id = app.store_code(contract_staking());
    let msg = InstantiateMsg {
        token_address: cw20.to_string(),
        anchor,
        fixed_duration,
        fixed_apy_bps: 3_000,
        flexible_apy_bps: 1_000,
        flexible_reward_interval: DAY,
    };
    app.instantiate_contract(
        staking_code_id,
        Addr::unchecked(ADDR1),
        &msg,
        &[],
        "staking",
        None,
    )
    .unwrap()
}

fn setup_test_case(app: &mut App, anchor: AnchorMode, fixed_duration: u64) -> (Addr, Addr) {
    let cw20_addr = instantiate_cw20(
        app,
        vec![
            Cw20Coin {
                address: ADDR1.to_string(),
                amount: Uint128::new(REWARD_POOL),
            },
            Cw20Coin {
                address: ADDR2.to_string(),
                amount: Uint128::new(USER_BALANCE),
            },
        ],
    );
    let staking_addr = instantiate_staking(app, &cw20_addr, anchor, fixed_duration);
    app.execute_contract(
        Addr::unchecked(ADDR1),
        cw20_addr.clone(),
        &cw20::Cw20ExecuteMsg::Transfer {
            recipient: staking_addr.to_string(),
            amount: Uint128::new(REWARD_POOL),
        },
        &[],
    )
    .unwrap();
    (staking_addr, cw20_addr)
}

fn advance(app: &mut App, seconds: u64) {
    app.update_block(|block| {
        block.time = block.time.plus_seconds(seconds);
        block.height += seconds / 5;
    });
}

fn get_balance(app: &App, cw20: &Addr, address: &str) -> Uint128 {
    let result: cw20::BalanceResponse = app
        .wrap()
        .query_wasm_smart(
            cw20,
            &cw20::Cw20QueryMsg::Balance {
                address: address.to_string(),
            },
        )
        .unwrap();
    result.balance
}

fn approve(app: &mut App, cw20: &Addr, staking: &Addr, amount: u128) {
    app.execute_contract(
        Addr::unchecked(ADDR2),
        cw20.clone(),
        &cw20::Cw20ExecuteMsg::IncreaseAllowance {
            spender: staking.to_string(),
            amount: Uint128::new(amount),
            expires: None,
        },
        &[],
    )
    .unwrap();
}

fn execute(app: &mut App, staking: &Addr, msg: ExecuteMsg) -> AnyResult<AppResponse> {
    app.execute_contract(Addr::unchecked(ADDR2), staking.clone(), &msg, &[])
}

fn query_user_stakes(app: &App, staking: &Addr) -> Vec<u64> {
    app.wrap()
        .query_wasm_smart(
            staking,
            &QueryMsg::GetUserFixedStakes {
                address: ADDR2.to_string(),
            },
        )
        .unwrap()
}

fn query_fixed(app: &App, staking: &Addr, stake_id: u64) -> FixedStakeResponse {
    app.wrap()
        .query_wasm_smart(staking, &QueryMsg::FixedStakes { stake_id })
        .unwrap()
}

fn query_flexible(app: &App, staking: &Addr) -> FlexibleStakeResponse {
    app.wrap()
        .query_wasm_smart(
            staking,
            &QueryMsg::FlexibleStakes {
                address: ADDR2.to_string(),
            },
        )
        .unwrap()
}

fn query_flexible_reward(app: &App, staking: &Addr) -> Uint128 {
    app.wrap()
        .query_wasm_smart(
            staking,
            &QueryMsg::CalculateFlexibleReward {
                address: ADDR2.to_string(),
            },
        )
        .unwrap()
}

#[test]
fn test_stake_fixed_requires_allowance() {
    let mut app = mock_app();
    let (staking, cw20) = setup_test_case(&mut app, AnchorMode::Time {}, 30 * DAY);

    execute(
        &mut app,
        &staking,
        ExecuteMsg::StakeFixed {
            amount: Uint128::new(1_000),
        },
    )
    .unwrap_err();

    assert!(query_user_stakes(&app, &staking).is_empty());
    assert_eq!(get_balance(&app, &cw20, ADDR2), Uint128::new(USER_BALANCE));
}

#[test]
fn test_fixed_stake_lifecycle() {
    let mut app = mock_app();
    let (staking, cw20) = setup_test_case(&mut app, AnchorMode::Time {}, 30 * DAY);
    let start = app.block_info().time.seconds();

    approve(&mut app, &cw20, &staking, 1_000);
    execute(
        &mut app,
        &staking,
        ExecuteMsg::StakeFixed {
            amount: Uint128::new(1_000),
        },
    )
    .unwrap();

    assert_eq!(query_user_stakes(&app, &staking), vec![1]);
    assert_eq!(
        query_fixed(&app, &staking, 1),
        FixedStakeResponse {
            stake_id: 1,
            amount: Uint128::new(1_000),
            start_anchor: start,
            withdrawn: false,
        }
    );
    assert_eq!(
        get_balance(&app, &cw20, ADDR2),
        Uint128::new(USER_BALANCE - 1_000)
    );

    let err: ContractError = execute(&mut app, &staking, ExecuteMsg::UnstakeFixed { stake_id: 1 })
        .unwrap_err()
        .downcast()
        .unwrap();
    assert_eq!(
        err,
        ContractError::StakeLocked {
            unlocks_at: start + 30 * DAY
        }
    );

    advance(&mut app, 30 * DAY);
    execute(&mut app, &staking, ExecuteMsg::UnstakeFixed { stake_id: 1 }).unwrap();

    // 1_000 * 30% * 30 / 365 rounds down to 24.
    assert_eq!(
        get_balance(&app, &cw20, ADDR2),
        Uint128::new(USER_BALANCE + 24)
    );
    assert!(query_fixed(&app, &staking, 1).withdrawn);

    let err: ContractError = execute(&mut app, &staking, ExecuteMsg::UnstakeFixed { stake_id: 1 })
        .unwrap_err()
        .downcast()
        .unwrap();
    assert_eq!(err, ContractError::AlreadyWithdrawn { stake_id: 1 });
}

#[test]
fn test_unknown_fixed_stake_is_zeroed() {
    let mut app = mock_app();
    let (staking, _) = setup_test_case(&mut app, AnchorMode::Time {}, 30 * DAY);
    assert_eq!(query_fixed(&app, &staking, 42), FixedStakeResponse::default());
}

#[test]
fn test_flexible_claim_cooldown() {
    let mut app = mock_app();
    let (staking, cw20) = setup_test_case(&mut app, AnchorMode::Time {}, 30 * DAY);
    let start = app.block_info().time.seconds();

    approve(&mut app, &cw20, &staking, 1_000_000);
    execute(
        &mut app,
        &staking,
        ExecuteMsg::StakeFlexible {
            amount: Uint128::new(1_000_000),
        },
    )
    .unwrap();

    let err: ContractError = execute(&mut app, &staking, ExecuteMsg::ClaimFlexibleRewards {})
        .unwrap_err()
        .downcast()
        .unwrap();
    assert_eq!(
        err,
        ContractError::CooldownActive {
            available_at: start + DAY
        }
    );

    advance(&mut app, DAY);
    // 1_000_000 * 10% / 365 rounds down to 273.
    assert_eq!(query_flexible_reward(&app, &staking), Uint128::new(273));
    execute(&mut app, &staking, ExecuteMsg::ClaimFlexibleRewards {}).unwrap();

    assert_eq!(
        get_balance(&app, &cw20, ADDR2),
        Uint128::new(USER_BALANCE - 1_000_000 + 273)
    );
    assert_eq!(
        query_flexible(&app, &staking),
        FlexibleStakeResponse {
            amount: Uint128::new(1_000_000),
            last_claim_anchor: start + DAY,
        }
    );
    assert_eq!(query_flexible_reward(&app, &staking), Uint128::zero());
}

#[test]
fn test_flexible_unstake_forfeits_inside_interval() {
    let mut app = mock_app();
    let (staking, cw20) = setup_test_case(&mut app, AnchorMode::Time {}, 30 * DAY);

    approve(&mut app, &cw20, &staking, 1_000_000);
    execute(
        &mut app,
        &staking,
        ExecuteMsg::StakeFlexible {
            amount: Uint128::new(1_000_000),
        },
    )
    .unwrap();

    advance(&mut app, DAY / 2);
    assert!(!query_flexible_reward(&app, &staking).is_zero());

    let err: ContractError = execute(
        &mut app,
        &staking,
        ExecuteMsg::UnstakeFlexible {
            amount: Uint128::new(1_000_001),
        },
    )
    .unwrap_err()
    .downcast()
    .unwrap();
    assert_eq!(err, ContractError::ImpossibleUnstake {});

    execute(
        &mut app,
        &staking,
        ExecuteMsg::UnstakeFlexible {
            amount: Uint128::new(400_000),
        },
    )
    .unwrap();

    assert_eq!(
        get_balance(&app, &cw20, ADDR2),
        Uint128::new(USER_BALANCE - 600_000)
    );
    assert_eq!(
        query_flexible(&app, &staking),
        FlexibleStakeResponse {
            amount: Uint128::new(600_000),
            last_claim_anchor: app.block_info().time.seconds(),
        }
    );
}

#[test]
fn test_emptied_flexible_stake_keeps_anchor() {
    let mut app = mock_app();
    let (staking, cw20) = setup_test_case(&mut app, AnchorMode::Time {}, 30 * DAY);

    approve(&mut app, &cw20, &staking, 500);
    execute(
        &mut app,
        &staking,
        ExecuteMsg::StakeFlexible {
            amount: Uint128::new(500),
        },
    )
    .unwrap();
    execute(
        &mut app,
        &staking,
        ExecuteMsg::UnstakeFlexible {
            amount: Uint128::new(500),
        },
    )
    .unwrap();

    let stake = query_flexible(&app, &staking);
    assert!(stake.amount.is_zero());
    assert_eq!(stake.last_claim_anchor, app.block_info().time.seconds());

    let err: ContractError = execute(&mut app, &staking, ExecuteMsg::ClaimFlexibleRewards {})
        .unwrap_err()
        .downcast()
        .unwrap();
    assert_eq!(err, ContractError::NothingStaked {});
}

#[test]
fn test_height_anchors() {
    let mut app = mock_app();
    let (staking, cw20) = setup_test_case(
        &mut app,
        AnchorMode::Height {
            blocks_per_year: 6_307_200,
        },
        100,
    );
    let start = app.block_info().height;

    approve(&mut app, &cw20, &staking, 1_000);
    execute(
        &mut app,
        &staking,
        ExecuteMsg::StakeFixed {
            amount: Uint128::new(1_000),
        },
    )
    .unwrap();
    assert_eq!(query_fixed(&app, &staking, 1).start_anchor, start);

    app.update_block(|block| block.height += 99);
    let err: ContractError = execute(&mut app, &staking, ExecuteMsg::UnstakeFixed { stake_id: 1 })
        .unwrap_err()
        .downcast()
        .unwrap();
    assert_eq!(err, ContractError::StakeLocked { unlocks_at: start + 100 });

    app.update_block(|block| block.height += 1);
    execute(&mut app, &staking, ExecuteMsg::UnstakeFixed { stake_id: 1 }).unwrap();
    assert!(query_fixed(&app, &staking, 1).withdrawn);
}

#[test]
fn test_instantiate_rejects_zero_durations() {
    let mut app = mock_app();
    let cw20 = instantiate_cw20(&mut app, vec![]);
    let code_id = app.store_code(contract_staking());
    let err: ContractError = app
        .instantiate_contract(
            code_id,
            Addr::unchecked(ADDR1),
            &InstantiateMsg {
                token_address: cw20.to_string(),
                anchor: AnchorMode::Time {},
                fixed_duration: 0,
                fixed_apy_bps: 3_000,
                flexible_apy_bps: 1_000,
                flexible_reward_interval: DAY,
            },
            &[],
            "staking",
            None,
        )
        .unwrap_err()
        .downcast()
        .unwrap();
    assert_eq!(err, ContractError::InvalidDuration {});
}
