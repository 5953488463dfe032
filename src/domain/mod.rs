pub mod events;
pub mod investment;
pub mod money;
pub mod plan;
pub mod transaction;
pub mod user;

pub use events::DomainEvent;
pub use investment::{Investment, InvestmentStatus, ProfitEntry, WithdrawalEntry};
pub use plan::InvestmentPlan;
pub use transaction::{
    Direction, LifecyclePolicy, PaymentMethod, SettlementEffect, Transaction, TransactionStatus,
    TransactionType,
};
pub use user::{Actor, Role, User, Wallet};
