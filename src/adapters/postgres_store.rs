//! Postgres implementation of the ledger ports.
//!
//! Wallet serialization uses a row lock on the owning `users` row
//! (`SELECT ... FOR UPDATE`) taken at the start of every wallet-touching
//! database transaction. Rows of other users are never locked.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::{apply_delta, check_replay};
use crate::domain::{
    money, Investment, InvestmentPlan, ProfitEntry, SettlementEffect, Transaction,
    TransactionType, User, Wallet, WithdrawalEntry,
};
use crate::ports::{
    ClaimOutcome, InvestmentFilter, LedgerStore, PlanCatalog, Posting, PostingOutcome,
    ReferralGraph, ReferrerRank, RepositoryError, RepositoryResult, SettleCommand, SettleOutcome,
    TransactionFilter,
};

type PgTransaction<'c> = sqlx::Transaction<'c, Postgres>;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_plan(&self, plan: &InvestmentPlan) -> RepositoryResult<InvestmentPlan> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            INSERT INTO investment_plans (
                id, name, description, min_amount, max_amount, duration_days, roi_percent, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(plan.id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(&plan.min_amount)
        .bind(&plan.max_amount)
        .bind(plan.duration_days)
        .bind(&plan.roi_percent)
        .bind(plan.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain())
    }
}

async fn lock_balance(db: &mut PgTransaction<'_>, user_id: Uuid) -> RepositoryResult<BigDecimal> {
    let row: Option<(BigDecimal,)> =
        sqlx::query_as("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **db)
            .await?;
    row.map(|(balance,)| balance)
        .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user_id)))
}

async fn write_balance(
    db: &mut PgTransaction<'_>,
    user_id: Uuid,
    balance: &BigDecimal,
    at: DateTime<Utc>,
) -> RepositoryResult<()> {
    sqlx::query("UPDATE users SET balance = $2, updated_at = $3 WHERE id = $1")
        .bind(user_id)
        .bind(balance)
        .bind(at)
        .execute(&mut **db)
        .await?;
    Ok(())
}

async fn by_reference(
    db: &mut PgTransaction<'_>,
    reference: &str,
) -> RepositoryResult<Option<Transaction>> {
    let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(&mut **db)
        .await?;
    row.map(TransactionRow::into_domain).transpose()
}

async fn insert_transaction(db: &mut PgTransaction<'_>, tx: &Transaction) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, user_id, investment_id, tx_type, amount, fees, net_amount, currency, status,
            description, reference, payment_method, metadata, admin_notes, processed_at,
            processed_by, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.investment_id)
    .bind(tx.tx_type.as_str())
    .bind(&tx.amount)
    .bind(&tx.fees)
    .bind(&tx.net_amount)
    .bind(&tx.currency)
    .bind(tx.status.as_str())
    .bind(&tx.description)
    .bind(&tx.reference)
    .bind(tx.payment_method.as_str())
    .bind(&tx.metadata)
    .bind(&tx.admin_notes)
    .bind(tx.processed_at)
    .bind(tx.processed_by)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(&mut **db)
    .await?;
    Ok(())
}

async fn mark_settled(db: &mut PgTransaction<'_>, tx: &Transaction) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        UPDATE transactions
        SET status = $2, processed_at = $3, processed_by = $4, admin_notes = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(tx.id)
    .bind(tx.status.as_str())
    .bind(tx.processed_at)
    .bind(tx.processed_by)
    .bind(&tx.admin_notes)
    .bind(tx.updated_at)
    .execute(&mut **db)
    .await?;
    Ok(())
}

/// Validates and writes a posting. The owner's row lock must already be held.
async fn apply_posting(
    db: &mut PgTransaction<'_>,
    balance: &BigDecimal,
    posting: Posting,
) -> RepositoryResult<PostingOutcome> {
    let tx = posting.transaction;
    if let Some(cap) = posting.daily_cap {
        let (start, end) = cap.window();
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE user_id = $1 AND tx_type = $2 AND created_at >= $3 AND created_at < $4
            "#,
        )
        .bind(tx.user_id)
        .bind(cap.tx_type.as_str())
        .bind(start)
        .bind(end)
        .fetch_one(&mut **db)
        .await?;
        if count >= cap.limit as i64 {
            return Err(RepositoryError::DailyLimitExceeded { limit: cap.limit });
        }
    }

    let delta = tx.creation_delta();
    let next = apply_delta(balance, delta.as_ref())?;
    insert_transaction(db, &tx).await?;
    if delta.is_some() {
        write_balance(db, tx.user_id, &next, tx.created_at).await?;
    }

    Ok(PostingOutcome {
        transaction: tx,
        balance: next,
        replayed: false,
    })
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn insert_user(&self, user: &User) -> RepositoryResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (
                id, display_name, referral_code, referred_by, role, balance, currency,
                is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.display_name)
        .bind(&user.referral_code)
        .bind(user.referred_by)
        .bind(user.role.as_str())
        .bind(&user.wallet.balance)
        .bind(&user.wallet.currency)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_user(&self, id: Uuid) -> RepositoryResult<User> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?
            .into_domain()
    }

    async fn find_user_by_referral_code(&self, code: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE referral_code = $1")
            .bind(code.to_uppercase())
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_domain).transpose()
    }

    async fn count_referrals(&self, user_id: Uuid) -> RepositoryResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE referred_by = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_referrals(&self, user_id: Uuid) -> RepositoryResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE referred_by = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserRow::into_domain).collect()
    }

    async fn top_referrers(&self, limit: i64) -> RepositoryResult<Vec<ReferrerRank>> {
        let rows: Vec<(Uuid, String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.id, p.display_name, p.referral_code,
                   COUNT(c.id) AS total_referrals,
                   COUNT(c.id) FILTER (WHERE c.is_active) AS active_referrals
            FROM users p
            JOIN users c ON c.referred_by = p.id
            GROUP BY p.id, p.display_name, p.referral_code
            ORDER BY total_referrals DESC, active_referrals DESC, p.id
            LIMIT $1
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(user_id, display_name, referral_code, total_referrals, active_referrals)| {
                    ReferrerRank {
                        user_id,
                        display_name,
                        referral_code,
                        total_referrals,
                        active_referrals,
                    }
                },
            )
            .collect())
    }

    async fn record(&self, posting: Posting) -> RepositoryResult<PostingOutcome> {
        let mut db = self.pool.begin().await?;
        let balance = lock_balance(&mut db, posting.transaction.user_id).await?;

        if let Some(existing) = by_reference(&mut db, &posting.transaction.reference).await? {
            check_replay(&existing, &posting.transaction)?;
            return Ok(PostingOutcome {
                transaction: existing,
                balance,
                replayed: true,
            });
        }

        let outcome = apply_posting(&mut db, &balance, posting).await?;
        db.commit().await?;
        Ok(outcome)
    }

    async fn settle(&self, command: &SettleCommand) -> RepositoryResult<SettleOutcome> {
        let owner: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM transactions WHERE id = $1")
            .bind(command.transaction_id)
            .fetch_optional(&self.pool)
            .await?;
        let (owner,) = owner.ok_or_else(|| {
            RepositoryError::NotFound(format!("transaction {}", command.transaction_id))
        })?;

        let mut db = self.pool.begin().await?;
        let mut balance = lock_balance(&mut db, owner).await?;

        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(command.transaction_id)
        .fetch_one(&mut *db)
        .await?;
        let mut tx = row.into_domain()?;

        if tx.status.is_terminal() {
            return Ok(SettleOutcome {
                transaction: tx,
                applied: false,
                refund: None,
            });
        }

        let mut refund = None;
        match tx.settlement_effect(command.status) {
            SettlementEffect::None => {}
            SettlementEffect::Credit(amount) => {
                balance = apply_delta(&balance, Some(&amount))?;
                write_balance(&mut db, owner, &balance, command.at).await?;
            }
            SettlementEffect::Refund(refund_tx) => {
                if by_reference(&mut db, &refund_tx.reference).await?.is_none() {
                    let outcome = apply_posting(&mut db, &balance, Posting::new(refund_tx)).await?;
                    refund = Some(outcome.transaction);
                }
            }
        }

        tx.mark_settled(
            command.status,
            command.processed_by,
            command.admin_notes.clone(),
            command.at,
        );
        mark_settled(&mut db, &tx).await?;
        db.commit().await?;

        Ok(SettleOutcome {
            transaction: tx,
            applied: true,
            refund,
        })
    }

    async fn claim_pending(
        &self,
        user_id: Uuid,
        tx_type: TransactionType,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Option<ClaimOutcome>> {
        let mut db = self.pool.begin().await?;
        let balance = lock_balance(&mut db, user_id).await?;

        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1 AND tx_type = $2 AND status = 'pending'
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(tx_type.as_str())
        .fetch_all(&mut *db)
        .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut amount = money::zero();
        let mut transaction_ids = Vec::with_capacity(rows.len());
        for row in rows {
            amount = amount + &row.net_amount;
            transaction_ids.push(row.id);
        }
        let next = apply_delta(&balance, Some(&amount))?;

        sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'completed', processed_at = $2, processed_by = $3, updated_at = $2
            WHERE id = ANY($1)
            "#,
        )
        .bind(&transaction_ids)
        .bind(at)
        .bind(user_id)
        .execute(&mut *db)
        .await?;
        write_balance(&mut db, user_id, &next, at).await?;
        db.commit().await?;

        Ok(Some(ClaimOutcome {
            amount,
            count: transaction_ids.len(),
            balance: next,
            transaction_ids,
        }))
    }

    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE reference = $1")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>> {
        // NULL parameters disable their predicate; LIMIT NULL means no limit.
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR tx_type = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at < $5)
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.tx_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit)
        .bind(filter.offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn insert_investment(
        &self,
        investment: &Investment,
        funding: Posting,
    ) -> RepositoryResult<PostingOutcome> {
        let mut db = self.pool.begin().await?;
        let balance = lock_balance(&mut db, investment.user_id).await?;

        if let Some(existing) = by_reference(&mut db, &funding.transaction.reference).await? {
            check_replay(&existing, &funding.transaction)?;
            return Ok(PostingOutcome {
                transaction: existing,
                balance,
                replayed: true,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO investments (
                id, user_id, plan_id, amount, currency, duration_days, roi_percent, status,
                start_date, end_date, total_profit, profit_history, withdrawal_history,
                last_accrued_on, notes, admin_notes, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(investment.id)
        .bind(investment.user_id)
        .bind(investment.plan_id)
        .bind(&investment.amount)
        .bind(&investment.currency)
        .bind(investment.duration_days)
        .bind(&investment.roi_percent)
        .bind(investment.status.as_str())
        .bind(investment.start_date)
        .bind(investment.end_date)
        .bind(&investment.total_profit)
        .bind(Json(&investment.profit_history))
        .bind(Json(&investment.withdrawal_history))
        .bind(investment.last_accrued_on)
        .bind(&investment.notes)
        .bind(&investment.admin_notes)
        .bind(investment.version)
        .bind(investment.created_at)
        .bind(investment.updated_at)
        .execute(&mut *db)
        .await?;

        let outcome = apply_posting(&mut db, &balance, funding).await?;
        db.commit().await?;
        Ok(outcome)
    }

    async fn update_investment(
        &self,
        investment: &Investment,
        expected_version: i64,
        posting: Option<Posting>,
    ) -> RepositoryResult<(Investment, Option<PostingOutcome>)> {
        let mut db = self.pool.begin().await?;
        let balance = lock_balance(&mut db, investment.user_id).await?;

        if let Some(posting) = posting.as_ref() {
            if let Some(existing) = by_reference(&mut db, &posting.transaction.reference).await? {
                check_replay(&existing, &posting.transaction)?;
                let stored = sqlx::query_as::<_, InvestmentRow>("SELECT * FROM investments WHERE id = $1")
                    .bind(investment.id)
                    .fetch_one(&mut *db)
                    .await?
                    .into_domain()?;
                return Ok((
                    stored,
                    Some(PostingOutcome {
                        transaction: existing,
                        balance,
                        replayed: true,
                    }),
                ));
            }
        }

        let row = sqlx::query_as::<_, InvestmentRow>(
            r#"
            UPDATE investments
            SET status = $3, end_date = $4, total_profit = $5, profit_history = $6,
                withdrawal_history = $7, last_accrued_on = $8, admin_notes = $9,
                version = version + 1, updated_at = $10
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(investment.id)
        .bind(expected_version)
        .bind(investment.status.as_str())
        .bind(investment.end_date)
        .bind(&investment.total_profit)
        .bind(Json(&investment.profit_history))
        .bind(Json(&investment.withdrawal_history))
        .bind(investment.last_accrued_on)
        .bind(&investment.admin_notes)
        .bind(investment.updated_at)
        .fetch_optional(&mut *db)
        .await?;

        let Some(row) = row else {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT version FROM investments WHERE id = $1")
                .bind(investment.id)
                .fetch_optional(&mut *db)
                .await?;
            return Err(match exists {
                Some((version,)) => RepositoryError::Conflict(format!(
                    "investment {} is at version {}, expected {}",
                    investment.id, version, expected_version
                )),
                None => RepositoryError::NotFound(format!("investment {}", investment.id)),
            });
        };

        let outcome = match posting {
            Some(posting) => Some(apply_posting(&mut db, &balance, posting).await?),
            None => None,
        };
        db.commit().await?;
        Ok((row.into_domain()?, outcome))
    }

    async fn get_investment(&self, id: Uuid) -> RepositoryResult<Investment> {
        let row = sqlx::query_as::<_, InvestmentRow>("SELECT * FROM investments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("investment {}", id)))?
            .into_domain()
    }

    async fn list_investments(&self, filter: &InvestmentFilter) -> RepositoryResult<Vec<Investment>> {
        let rows = sqlx::query_as::<_, InvestmentRow>(
            r#"
            SELECT * FROM investments
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InvestmentRow::into_domain).collect()
    }
}

#[async_trait]
impl ReferralGraph for PostgresStore {
    async fn referrer_of(&self, user_id: Uuid) -> RepositoryResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT p.id FROM users u JOIN users p ON p.id = u.referred_by WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }
}

#[async_trait]
impl PlanCatalog for PostgresStore {
    async fn get_plan(&self, id: Uuid) -> RepositoryResult<InvestmentPlan> {
        let row = sqlx::query_as::<_, PlanRow>("SELECT * FROM investment_plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(PlanRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("plan {}", id)))
    }

    async fn active_plans(&self) -> RepositoryResult<Vec<InvestmentPlan>> {
        let rows = sqlx::query_as::<_, PlanRow>(
            "SELECT * FROM investment_plans WHERE is_active ORDER BY min_amount",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PlanRow::into_domain).collect())
    }
}

fn decode<T: std::str::FromStr<Err = String>>(value: &str) -> RepositoryResult<T> {
    value.parse().map_err(RepositoryError::Decode)
}

// Internal row types for SQLx. Not exposed outside the adapter.

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    display_name: String,
    referral_code: String,
    referred_by: Option<Uuid>,
    role: String,
    balance: BigDecimal,
    currency: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> RepositoryResult<User> {
        Ok(User {
            id: self.id,
            display_name: self.display_name,
            referral_code: self.referral_code,
            referred_by: self.referred_by,
            role: decode(&self.role)?,
            wallet: Wallet {
                balance: self.balance,
                currency: self.currency,
            },
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    investment_id: Option<Uuid>,
    tx_type: String,
    amount: BigDecimal,
    fees: BigDecimal,
    net_amount: BigDecimal,
    currency: String,
    status: String,
    description: String,
    reference: String,
    payment_method: String,
    metadata: serde_json::Value,
    admin_notes: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    processed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            investment_id: self.investment_id,
            tx_type: decode(&self.tx_type)?,
            amount: self.amount,
            fees: self.fees,
            net_amount: self.net_amount,
            currency: self.currency,
            status: decode(&self.status)?,
            description: self.description,
            reference: self.reference,
            payment_method: decode(&self.payment_method)?,
            metadata: self.metadata,
            admin_notes: self.admin_notes,
            processed_at: self.processed_at,
            processed_by: self.processed_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvestmentRow {
    id: Uuid,
    user_id: Uuid,
    plan_id: Uuid,
    amount: BigDecimal,
    currency: String,
    duration_days: i32,
    roi_percent: BigDecimal,
    status: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    total_profit: BigDecimal,
    profit_history: Json<Vec<ProfitEntry>>,
    withdrawal_history: Json<Vec<WithdrawalEntry>>,
    last_accrued_on: Option<NaiveDate>,
    notes: Option<String>,
    admin_notes: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvestmentRow {
    fn into_domain(self) -> RepositoryResult<Investment> {
        Ok(Investment {
            id: self.id,
            user_id: self.user_id,
            plan_id: self.plan_id,
            amount: self.amount,
            currency: self.currency,
            duration_days: self.duration_days,
            roi_percent: self.roi_percent,
            status: decode(&self.status)?,
            start_date: self.start_date,
            end_date: self.end_date,
            total_profit: self.total_profit,
            profit_history: self.profit_history.0,
            withdrawal_history: self.withdrawal_history.0,
            last_accrued_on: self.last_accrued_on,
            notes: self.notes,
            admin_notes: self.admin_notes,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    name: String,
    description: String,
    min_amount: BigDecimal,
    max_amount: BigDecimal,
    duration_days: i32,
    roi_percent: BigDecimal,
    is_active: bool,
}

impl PlanRow {
    fn into_domain(self) -> InvestmentPlan {
        InvestmentPlan {
            id: self.id,
            name: self.name,
            description: self.description,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            duration_days: self.duration_days,
            roi_percent: self.roi_percent,
            is_active: self.is_active,
        }
    }
}
