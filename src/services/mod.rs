pub mod commission;
pub mod events;
pub mod investment_engine;
pub mod ledger;
pub mod users;

pub use commission::{calculate_commissions, resolve_chain, CommissionEntry, CommissionService};
pub use events::EventEmitter;
pub use investment_engine::{
    AccrualReport, CreateInvestment, EngineSettings, InvestmentEngine, InvestmentStats, PlanQuote,
};
pub use ledger::{DailyBalance, NewTransaction, TransactionLedger, TypeTotals};
pub use users::{ReferralNode, ReferralSummary, UserDirectory};
