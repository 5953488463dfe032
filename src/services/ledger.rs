//! Transaction ledger: the only path by which a wallet balance changes.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    money, Actor, DomainEvent, PaymentMethod, Transaction, TransactionStatus, TransactionType,
};
use crate::error::LedgerError;
use crate::ports::{LedgerStore, Posting, PostingOutcome, SettleCommand, SettleOutcome, TransactionFilter};
use crate::services::events::EventEmitter;

/// Caller-supplied fields of a transaction about to be posted.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub amount: BigDecimal,
    pub fees: BigDecimal,
    pub investment_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub description: Option<String>,
    /// Idempotency key; generated when absent.
    pub reference: Option<String>,
    pub payment_method: PaymentMethod,
}

impl NewTransaction {
    pub fn new(user_id: Uuid, tx_type: TransactionType, amount: BigDecimal) -> Self {
        Self {
            user_id,
            tx_type,
            amount,
            fees: money::zero(),
            investment_id: None,
            metadata: serde_json::json!({}),
            description: None,
            reference: None,
            payment_method: PaymentMethod::Internal,
        }
    }

    pub fn with_fees(mut self, fees: BigDecimal) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_investment(mut self, investment_id: Uuid) -> Self {
        self.investment_id = Some(investment_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_payment_method(mut self, payment_method: PaymentMethod) -> Self {
        self.payment_method = payment_method;
        self
    }
}

/// Per-type totals for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeTotals {
    pub tx_type: TransactionType,
    pub count: usize,
    pub total_amount: BigDecimal,
    pub total_net_amount: BigDecimal,
}

/// Completed net flows for one UTC day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBalance {
    pub day: NaiveDate,
    pub deposits: BigDecimal,
    pub withdrawals: BigDecimal,
    pub profits: BigDecimal,
    pub referral_bonuses: BigDecimal,
}

impl DailyBalance {
    fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            deposits: money::zero(),
            withdrawals: money::zero(),
            profits: money::zero(),
            referral_bonuses: money::zero(),
        }
    }
}

pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    events: EventEmitter,
    currency: String,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn LedgerStore>, events: EventEmitter, currency: &str) -> Self {
        Self {
            store,
            events,
            currency: currency.to_string(),
        }
    }

    /// Validates the amounts and builds the transaction without persisting it.
    pub fn draft(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        if new.amount < money::min_transaction_amount() {
            return Err(LedgerError::InvalidAmount(format!(
                "amount {} is below the minimum of {}",
                new.amount,
                money::MIN_TRANSACTION_AMOUNT
            )));
        }
        if !money::is_cent_precise(&new.amount) || !money::is_cent_precise(&new.fees) {
            return Err(LedgerError::InvalidAmount(format!(
                "amount {} and fees {} must be whole cents",
                new.amount, new.fees
            )));
        }
        if new.fees < money::zero() || new.fees > new.amount {
            return Err(LedgerError::InvalidAmount(format!(
                "fees {} must be between 0 and the amount {}",
                new.fees, new.amount
            )));
        }

        let mut tx = Transaction::new(new.user_id, new.tx_type, new.amount, new.fees)
            .with_currency(&self.currency)
            .with_metadata(new.metadata)
            .with_payment_method(new.payment_method);
        if let Some(investment_id) = new.investment_id {
            tx = tx.with_investment(investment_id);
        }
        if let Some(description) = new.description {
            tx = tx.with_description(description);
        }
        if let Some(reference) = new.reference {
            tx = tx.with_reference(reference);
        }
        Ok(tx)
    }

    /// Creates a transaction and applies its creation-time wallet effect.
    pub async fn post(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        let tx = self.draft(new)?;
        Ok(self.apply_to_wallet(Posting::new(tx)).await?.transaction)
    }

    /// Records the posting and moves the wallet in one atomic step.
    /// A known reference replays the stored transaction.
    pub async fn apply_to_wallet(&self, posting: Posting) -> Result<PostingOutcome, LedgerError> {
        let outcome = self.store.record(posting).await?;
        let tx = &outcome.transaction;
        if outcome.replayed {
            tracing::debug!("Replayed reference {}, nothing applied", tx.reference);
        } else {
            tracing::info!(
                "Posted {} {} {} for user {} ({}), balance {}",
                tx.tx_type,
                tx.amount,
                tx.currency,
                tx.user_id,
                tx.status,
                outcome.balance
            );
        }
        Ok(outcome)
    }

    /// Admin settlement of a pending transaction.
    ///
    /// Settling a transaction that is already terminal returns it unchanged.
    pub async fn settle(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        admin: &Actor,
        admin_notes: Option<String>,
    ) -> Result<SettleOutcome, LedgerError> {
        admin.require_admin()?;
        if status == TransactionStatus::Pending {
            let current = self.store.get_transaction(transaction_id).await?;
            return Err(LedgerError::InvalidTransition {
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        let outcome = self
            .store
            .settle(&SettleCommand {
                transaction_id,
                status,
                processed_by: Some(admin.user_id),
                admin_notes,
                at: Utc::now(),
            })
            .await?;

        let tx = &outcome.transaction;
        if !outcome.applied {
            tracing::debug!("Transaction {} already {}, settle is a no-op", tx.id, tx.status);
            return Ok(outcome);
        }

        tracing::info!(
            "Settled {} {} as {} by admin {}",
            tx.tx_type,
            tx.id,
            tx.status,
            admin.user_id
        );
        if let Some(refund) = &outcome.refund {
            tracing::info!("Refunded {} to user {} ({})", refund.amount, refund.user_id, refund.reference);
        }
        self.events.emit(DomainEvent::TransactionSettled {
            transaction_id: tx.id,
            user_id: tx.user_id,
            tx_type: tx.tx_type,
            status: tx.status,
            amount: tx.amount.clone(),
            at: tx.updated_at,
        });
        Ok(outcome)
    }

    pub async fn get(&self, id: Uuid) -> Result<Transaction, LedgerError> {
        Ok(self.store.get_transaction(id).await?)
    }

    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.store.find_transaction_by_reference(reference).await?)
    }

    /// Newest first.
    pub async fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.store.list_transactions(filter).await?)
    }

    /// Admin queue of transactions awaiting settlement, oldest first.
    pub async fn pending(&self, tx_type: Option<TransactionType>) -> Result<Vec<Transaction>, LedgerError> {
        let filter = TransactionFilter {
            tx_type,
            status: Some(TransactionStatus::Pending),
            ..Default::default()
        };
        let mut rows = self.store.list_transactions(&filter).await?;
        rows.reverse();
        Ok(rows)
    }

    /// Count, amount and net amount per transaction type, across all statuses.
    pub async fn stats(&self, user_id: Uuid) -> Result<Vec<TypeTotals>, LedgerError> {
        let rows = self
            .store
            .list_transactions(&TransactionFilter::for_user(user_id))
            .await?;

        let mut totals: HashMap<TransactionType, TypeTotals> = HashMap::new();
        for tx in rows {
            let entry = totals.entry(tx.tx_type).or_insert_with(|| TypeTotals {
                tx_type: tx.tx_type,
                count: 0,
                total_amount: money::zero(),
                total_net_amount: money::zero(),
            });
            entry.count += 1;
            entry.total_amount = &entry.total_amount + &tx.amount;
            entry.total_net_amount = &entry.total_net_amount + &tx.net_amount;
        }

        let mut totals: Vec<TypeTotals> = totals.into_values().collect();
        totals.sort_by(|a, b| a.tx_type.as_str().cmp(b.tx_type.as_str()));
        Ok(totals)
    }

    /// Completed net amounts per UTC day over the last `days` days, oldest
    /// day first. Days with no completed transaction are absent.
    pub async fn balance_history(
        &self,
        user_id: Uuid,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyBalance>, LedgerError> {
        let filter = TransactionFilter {
            user_id: Some(user_id),
            status: Some(TransactionStatus::Completed),
            from: Some(now - Duration::days(days.max(0))),
            ..Default::default()
        };
        let rows = self.store.list_transactions(&filter).await?;

        let mut by_day: BTreeMap<NaiveDate, DailyBalance> = BTreeMap::new();
        for tx in rows {
            let day = tx.created_at.date_naive();
            let entry = by_day.entry(day).or_insert_with(|| DailyBalance::empty(day));
            let bucket = match tx.tx_type {
                TransactionType::Deposit => &mut entry.deposits,
                TransactionType::Withdrawal => &mut entry.withdrawals,
                TransactionType::Profit => &mut entry.profits,
                TransactionType::ReferralBonus => &mut entry.referral_bonuses,
                _ => continue,
            };
            *bucket = &*bucket + &tx.net_amount;
        }
        Ok(by_day.into_values().collect())
    }
}
