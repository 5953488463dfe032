#![allow(dead_code)]

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use invest_ledger::adapters::MemoryStore;
use invest_ledger::config::Config;
use invest_ledger::domain::{Actor, InvestmentPlan, PaymentMethod, Role, TransactionStatus, User};
use invest_ledger::use_cases::DepositInput;
use invest_ledger::AppState;

pub fn dec(s: &str) -> BigDecimal {
    s.parse().unwrap()
}

pub fn setup() -> (AppState, Arc<MemoryStore>) {
    setup_with(Config::default())
}

pub fn setup_with(config: Config) -> (AppState, Arc<MemoryStore>) {
    invest_ledger::in_memory(&config)
}

pub fn admin() -> Actor {
    Actor::admin(Uuid::new_v4())
}

pub async fn register(state: &AppState, name: &str, referred_by: Option<Uuid>) -> User {
    state.users.register(name, referred_by, Role::User).await.unwrap()
}

/// Deposits `amount` and completes it as an admin.
pub async fn fund(state: &AppState, user_id: Uuid, amount: &str) {
    let deposit = state
        .deposits
        .execute(DepositInput {
            user_id,
            amount: dec(amount),
            payment_method: PaymentMethod::BankTransfer,
            payment_details: None,
            reference: None,
        })
        .await
        .unwrap();
    state
        .ledger
        .settle(deposit.transaction_id, TransactionStatus::Completed, &admin(), None)
        .await
        .unwrap();
}

pub async fn balance(state: &AppState, user_id: Uuid) -> BigDecimal {
    state.users.wallet(user_id).await.unwrap().balance
}

pub fn add_plan(store: &MemoryStore, min: &str, max: &str, days: i32, roi: &str) -> InvestmentPlan {
    let plan = InvestmentPlan::new("Test Plan", dec(min), dec(max), days, dec(roi));
    store.add_plan(plan.clone());
    plan
}
