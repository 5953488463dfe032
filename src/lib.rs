pub mod adapters;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;
pub mod use_cases;

use std::sync::Arc;

use crate::adapters::{MemoryStore, PostgresStore};
use crate::config::Config;
use crate::ports::{LedgerStore, PlanCatalog, ReferralGraph};
use crate::services::{
    CommissionService, EngineSettings, EventEmitter, InvestmentEngine, TransactionLedger,
    UserDirectory,
};
use crate::use_cases::{RequestDeposit, RequestWithdrawal, WithdrawalPolicy};

/// Every service wired over one store.
#[derive(Clone)]
pub struct AppState {
    pub events: EventEmitter,
    pub users: Arc<UserDirectory>,
    pub ledger: Arc<TransactionLedger>,
    pub commissions: Arc<CommissionService>,
    pub investments: Arc<InvestmentEngine>,
    pub deposits: Arc<RequestDeposit>,
    pub withdrawals: Arc<RequestWithdrawal>,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, config: &Config) -> Self
    where
        S: LedgerStore + ReferralGraph + PlanCatalog + 'static,
    {
        let events = EventEmitter::new(config.event_buffer_size);
        let ledger_store: Arc<dyn LedgerStore> = store.clone();
        let graph: Arc<dyn ReferralGraph> = store.clone();
        let plans: Arc<dyn PlanCatalog> = store;

        let ledger = Arc::new(TransactionLedger::new(
            ledger_store.clone(),
            events.clone(),
            &config.currency,
        ));
        let commissions = Arc::new(CommissionService::new(
            ledger_store.clone(),
            graph,
            ledger.clone(),
            events.clone(),
            config.commission_rates.clone(),
        ));
        let investments = Arc::new(InvestmentEngine::new(
            ledger_store.clone(),
            plans,
            ledger.clone(),
            commissions.clone(),
            events.clone(),
            EngineSettings {
                currency: config.currency.clone(),
                min_investment_amount: config.min_investment_amount.clone(),
                strict_status_transitions: config.strict_status_transitions,
            },
        ));

        Self {
            users: Arc::new(UserDirectory::new(ledger_store, &config.currency)),
            deposits: Arc::new(RequestDeposit::new(ledger.clone(), events.clone())),
            withdrawals: Arc::new(RequestWithdrawal::new(
                ledger.clone(),
                events.clone(),
                WithdrawalPolicy::from_config(config),
            )),
            events,
            ledger,
            commissions,
            investments,
        }
    }
}

pub fn in_memory(config: &Config) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (AppState::new(store.clone(), config), store)
}

pub fn postgres(pool: sqlx::PgPool, config: &Config) -> (AppState, Arc<PostgresStore>) {
    let store = Arc::new(PostgresStore::new(pool));
    (AppState::new(store.clone(), config), store)
}
