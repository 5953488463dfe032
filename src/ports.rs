//! Storage ports. Services depend on these traits; adapters implement them.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Investment, InvestmentPlan, InvestmentStatus, Transaction, TransactionStatus, TransactionType,
    User,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        available: BigDecimal,
        required: BigDecimal,
    },

    #[error("daily limit of {limit} reached")]
    DailyLimitExceeded { limit: u32 },

    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("cannot decode stored record: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return RepositoryError::NotFound("row".to_string());
        }
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };
        match code.as_deref() {
            // serialization_failure, deadlock_detected, lock_not_available
            Some("40001") | Some("40P01") | Some("55P03") => RepositoryError::Conflict(err.to_string()),
            Some("23505") => RepositoryError::Duplicate(err.to_string()),
            _ => RepositoryError::Database(err),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// At most `limit` transactions of `tx_type` per user created on `day` (UTC).
/// Checked under the same wallet lock as the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCap {
    pub tx_type: TransactionType,
    pub limit: u32,
    pub day: NaiveDate,
}

impl DailyCap {
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.day.and_time(chrono::NaiveTime::MIN).and_utc();
        (start, start + chrono::Duration::days(1))
    }
}

/// A new transaction plus the guards that apply while recording it.
/// The wallet effect is the transaction's own `creation_delta`.
#[derive(Debug, Clone)]
pub struct Posting {
    pub transaction: Transaction,
    pub daily_cap: Option<DailyCap>,
}

impl Posting {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            daily_cap: None,
        }
    }

    pub fn with_daily_cap(mut self, cap: DailyCap) -> Self {
        self.daily_cap = Some(cap);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PostingOutcome {
    pub transaction: Transaction,
    /// Wallet balance after the posting (or current balance on replay).
    pub balance: BigDecimal,
    /// True when the reference already existed and nothing was applied.
    pub replayed: bool,
}

#[derive(Debug, Clone)]
pub struct SettleCommand {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub processed_by: Option<Uuid>,
    pub admin_notes: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SettleOutcome {
    pub transaction: Transaction,
    /// False when the transaction was already terminal.
    pub applied: bool,
    pub refund: Option<Transaction>,
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub amount: BigDecimal,
    pub count: usize,
    pub balance: BigDecimal,
    pub transaction_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user_id: Option<Uuid>,
    pub tx_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl TransactionFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn of_type(mut self, tx_type: TransactionType) -> Self {
        self.tx_type = Some(tx_type);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.user_id.map_or(true, |id| tx.user_id == id)
            && self.tx_type.map_or(true, |t| tx.tx_type == t)
            && self.status.map_or(true, |s| tx.status == s)
            && self.from.map_or(true, |from| tx.created_at >= from)
            && self.to.map_or(true, |to| tx.created_at < to)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvestmentFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<InvestmentStatus>,
}

impl InvestmentFilter {
    pub fn matches(&self, investment: &Investment) -> bool {
        self.user_id.map_or(true, |id| investment.user_id == id)
            && self.status.map_or(true, |s| investment.status == s)
    }
}

/// A referrer's standing on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferrerRank {
    pub user_id: Uuid,
    pub display_name: String,
    pub referral_code: String,
    pub total_referrals: i64,
    pub active_referrals: i64,
}

/// Durable keyed storage for users, transactions and investments.
///
/// Every method that touches a wallet runs as one atomic unit serialized
/// per user: the balance check, the guards, the record write and the
/// balance write either all happen or none do.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> RepositoryResult<User>;
    async fn get_user(&self, id: Uuid) -> RepositoryResult<User>;
    async fn find_user_by_referral_code(&self, code: &str) -> RepositoryResult<Option<User>>;
    async fn count_referrals(&self, user_id: Uuid) -> RepositoryResult<i64>;
    /// Users directly referred by `user_id`, newest first.
    async fn list_referrals(&self, user_id: Uuid) -> RepositoryResult<Vec<User>>;
    /// Users with at least one referral, by total then active referrals.
    async fn top_referrers(&self, limit: i64) -> RepositoryResult<Vec<ReferrerRank>>;

    /// Records a transaction and applies its creation-time wallet effect.
    /// A reference that already exists is a replay: nothing is applied.
    async fn record(&self, posting: Posting) -> RepositoryResult<PostingOutcome>;
    /// Moves a pending transaction to a terminal status with its wallet
    /// effect. Terminal transactions are returned unchanged.
    async fn settle(&self, command: &SettleCommand) -> RepositoryResult<SettleOutcome>;
    /// Completes every pending transaction of `tx_type` for the user and
    /// credits their sum in a single wallet write.
    async fn claim_pending(
        &self,
        user_id: Uuid,
        tx_type: TransactionType,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Option<ClaimOutcome>>;
    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction>;
    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<Transaction>>;
    async fn list_transactions(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>>;

    /// Persists a new investment together with its funding debit.
    async fn insert_investment(
        &self,
        investment: &Investment,
        funding: Posting,
    ) -> RepositoryResult<PostingOutcome>;
    /// Compare-and-swap on `version`, optionally with a wallet posting.
    /// On a replayed posting the stored investment is returned untouched.
    async fn update_investment(
        &self,
        investment: &Investment,
        expected_version: i64,
        posting: Option<Posting>,
    ) -> RepositoryResult<(Investment, Option<PostingOutcome>)>;
    async fn get_investment(&self, id: Uuid) -> RepositoryResult<Investment>;
    async fn list_investments(&self, filter: &InvestmentFilter) -> RepositoryResult<Vec<Investment>>;
}

/// Upward referral edges.
#[async_trait]
pub trait ReferralGraph: Send + Sync {
    /// The user's referrer, if it exists.
    async fn referrer_of(&self, user_id: Uuid) -> RepositoryResult<Option<Uuid>>;
}

/// Read-only plan catalog.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn get_plan(&self, id: Uuid) -> RepositoryResult<InvestmentPlan>;
    async fn active_plans(&self) -> RepositoryResult<Vec<InvestmentPlan>>;
}
