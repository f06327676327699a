use cosmwasm_std::Empty;
use cw_multi_test::{Contract, ContractWrapper};

pub fn cw20_base_contract() -> Box<dyn Contract<Empty>> {
    let contract = ContractWrapper::new(
        cw20_base::contract::execute,
        cw20_base::contract::instantiate,
        cw20_base::contract::query,
    );
    Box::new(contract)
}

pub fn fixed_flex_staking_contract() -> Box<dyn Contract<Empty>> {
    let contract = ContractWrapper::new(
        fixed_flex_staking::contract::execute,
        fixed_flex_staking::contract::instantiate,
        fixed_flex_staking::contract::query,
    );
    Box::new(contract)
}
