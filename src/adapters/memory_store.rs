//! In-process implementation of the ledger ports.
//!
//! Each user owns a mutex; every wallet-touching operation holds exactly
//! that user's lock for its whole read-validate-write sequence, so writes
//! on different users never contend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{apply_delta, check_replay};
use crate::domain::{
    money, Investment, InvestmentPlan, SettlementEffect, Transaction, TransactionStatus,
    TransactionType, User,
};
use crate::ports::{
    ClaimOutcome, DailyCap, InvestmentFilter, LedgerStore, PlanCatalog, Posting, PostingOutcome,
    ReferralGraph, ReferrerRank, RepositoryError, RepositoryResult, SettleCommand, SettleOutcome,
    TransactionFilter,
};

struct UserRecord {
    user: User,
    transaction_ids: Vec<Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, Arc<Mutex<UserRecord>>>,
    transactions: DashMap<Uuid, Transaction>,
    references: DashMap<String, Uuid>,
    referral_codes: DashMap<String, Uuid>,
    investments: DashMap<Uuid, Investment>,
    plans: DashMap<Uuid, InvestmentPlan>,
}

fn lock(cell: &Mutex<UserRecord>) -> RepositoryResult<MutexGuard<'_, UserRecord>> {
    cell.lock()
        .map_err(|_| RepositoryError::Conflict("wallet lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plan(&self, plan: InvestmentPlan) {
        self.plans.insert(plan.id, plan);
    }

    fn user_cell(&self, id: Uuid) -> RepositoryResult<Arc<Mutex<UserRecord>>> {
        self.users
            .get(&id)
            .map(|cell| Arc::clone(cell.value()))
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }

    fn by_reference(&self, reference: &str) -> RepositoryResult<Option<Transaction>> {
        let Some(id) = self.references.get(reference).map(|r| *r.value()) else {
            return Ok(None);
        };
        self.transactions
            .get(&id)
            .map(|tx| Some(tx.value().clone()))
            .ok_or_else(|| RepositoryError::Conflict(format!("reference {} is in flight", reference)))
    }

    fn all_users(&self) -> RepositoryResult<Vec<User>> {
        let cells: Vec<_> = self.users.iter().map(|e| Arc::clone(e.value())).collect();
        cells
            .iter()
            .map(|cell| lock(cell).map(|record| record.user.clone()))
            .collect()
    }

    fn transaction(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.transactions
            .get(&id)
            .map(|tx| tx.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    fn investment(&self, id: Uuid) -> RepositoryResult<Investment> {
        self.investments
            .get(&id)
            .map(|inv| inv.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("investment {}", id)))
    }

    fn count_today(&self, record: &UserRecord, cap: &DailyCap) -> usize {
        let (start, end) = cap.window();
        record
            .transaction_ids
            .iter()
            .filter(|id| {
                self.transactions.get(*id).map_or(false, |tx| {
                    tx.tx_type == cap.tx_type && tx.created_at >= start && tx.created_at < end
                })
            })
            .count()
    }

    fn reserve_reference(&self, tx: &Transaction) -> RepositoryResult<()> {
        match self.references.entry(tx.reference.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Duplicate(format!(
                "reference {}",
                tx.reference
            ))),
            Entry::Vacant(slot) => {
                slot.insert(tx.id);
                Ok(())
            }
        }
    }

    /// Validates and applies a posting while the owner's lock is held.
    fn apply_posting(
        &self,
        record: &mut UserRecord,
        posting: Posting,
    ) -> RepositoryResult<PostingOutcome> {
        let tx = posting.transaction;
        if let Some(cap) = posting.daily_cap {
            if self.count_today(record, &cap) >= cap.limit as usize {
                return Err(RepositoryError::DailyLimitExceeded { limit: cap.limit });
            }
        }
        let delta = tx.creation_delta();
        let balance = apply_delta(&record.user.wallet.balance, delta.as_ref())?;

        self.reserve_reference(&tx)?;
        self.transactions.insert(tx.id, tx.clone());
        record.transaction_ids.push(tx.id);
        record.user.wallet.balance = balance.clone();
        record.user.updated_at = Utc::now();

        Ok(PostingOutcome {
            transaction: tx,
            balance,
            replayed: false,
        })
    }

    fn replay(
        &self,
        record: &UserRecord,
        incoming: &Transaction,
    ) -> RepositoryResult<Option<PostingOutcome>> {
        let Some(existing) = self.by_reference(&incoming.reference)? else {
            return Ok(None);
        };
        check_replay(&existing, incoming)?;
        Ok(Some(PostingOutcome {
            transaction: existing,
            balance: record.user.wallet.balance.clone(),
            replayed: true,
        }))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> RepositoryResult<User> {
        match self.referral_codes.entry(user.referral_code.clone()) {
            Entry::Occupied(_) => {
                return Err(RepositoryError::Duplicate(format!(
                    "referral code {}",
                    user.referral_code
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }
        match self.users.entry(user.id) {
            Entry::Occupied(_) => {
                self.referral_codes.remove(&user.referral_code);
                Err(RepositoryError::Duplicate(format!("user {}", user.id)))
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(UserRecord {
                    user: user.clone(),
                    transaction_ids: Vec::new(),
                })));
                Ok(user.clone())
            }
        }
    }

    async fn get_user(&self, id: Uuid) -> RepositoryResult<User> {
        let cell = self.user_cell(id)?;
        let record = lock(&cell)?;
        Ok(record.user.clone())
    }

    async fn find_user_by_referral_code(&self, code: &str) -> RepositoryResult<Option<User>> {
        let Some(id) = self.referral_codes.get(&code.to_uppercase()).map(|id| *id.value()) else {
            return Ok(None);
        };
        let cell = self.user_cell(id)?;
        let record = lock(&cell)?;
        Ok(Some(record.user.clone()))
    }

    async fn count_referrals(&self, user_id: Uuid) -> RepositoryResult<i64> {
        let cells: Vec<_> = self.users.iter().map(|e| Arc::clone(e.value())).collect();
        let mut count = 0;
        for cell in cells {
            if lock(&cell)?.user.referred_by == Some(user_id) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_referrals(&self, user_id: Uuid) -> RepositoryResult<Vec<User>> {
        let mut referrals: Vec<User> = self
            .all_users()?
            .into_iter()
            .filter(|user| user.referred_by == Some(user_id))
            .collect();
        referrals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(referrals)
    }

    async fn top_referrers(&self, limit: i64) -> RepositoryResult<Vec<ReferrerRank>> {
        let users = self.all_users()?;
        let mut ranks: Vec<ReferrerRank> = users
            .iter()
            .filter_map(|parent| {
                let children = users.iter().filter(|u| u.referred_by == Some(parent.id));
                let (total, active) = children.fold((0, 0), |(total, active), child| {
                    (total + 1, active + i64::from(child.is_active))
                });
                (total > 0).then(|| ReferrerRank {
                    user_id: parent.id,
                    display_name: parent.display_name.clone(),
                    referral_code: parent.referral_code.clone(),
                    total_referrals: total,
                    active_referrals: active,
                })
            })
            .collect();
        ranks.sort_by(|a, b| {
            b.total_referrals
                .cmp(&a.total_referrals)
                .then(b.active_referrals.cmp(&a.active_referrals))
                .then(a.user_id.cmp(&b.user_id))
        });
        ranks.truncate(limit.max(0) as usize);
        Ok(ranks)
    }

    async fn record(&self, posting: Posting) -> RepositoryResult<PostingOutcome> {
        let cell = self.user_cell(posting.transaction.user_id)?;
        let mut record = lock(&cell)?;
        if let Some(replayed) = self.replay(&record, &posting.transaction)? {
            return Ok(replayed);
        }
        self.apply_posting(&mut record, posting)
    }

    async fn settle(&self, command: &SettleCommand) -> RepositoryResult<SettleOutcome> {
        let owner = self.transaction(command.transaction_id)?.user_id;
        let cell = self.user_cell(owner)?;
        let mut record = lock(&cell)?;

        let mut tx = self.transaction(command.transaction_id)?;
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
                record.user.wallet.balance =
                    apply_delta(&record.user.wallet.balance, Some(&amount))?;
            }
            SettlementEffect::Refund(refund_tx) => {
                // A refund already on file means an earlier settle got this far.
                if self.by_reference(&refund_tx.reference)?.is_none() {
                    let outcome = self.apply_posting(&mut record, Posting::new(refund_tx))?;
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
        self.transactions.insert(tx.id, tx.clone());
        record.user.updated_at = command.at;

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
        let cell = self.user_cell(user_id)?;
        let mut record = lock(&cell)?;

        let mut pending: Vec<Transaction> = record
            .transaction_ids
            .iter()
            .filter_map(|id| self.transactions.get(id).map(|tx| tx.value().clone()))
            .filter(|tx| tx.tx_type == tx_type && tx.status == TransactionStatus::Pending)
            .collect();
        if pending.is_empty() {
            return Ok(None);
        }

        let amount = pending
            .iter()
            .fold(money::zero(), |acc, tx| acc + &tx.net_amount);
        let balance = apply_delta(&record.user.wallet.balance, Some(&amount))?;

        let mut transaction_ids = Vec::with_capacity(pending.len());
        for tx in pending.iter_mut() {
            tx.mark_settled(TransactionStatus::Completed, Some(user_id), None, at);
            transaction_ids.push(tx.id);
            self.transactions.insert(tx.id, tx.clone());
        }
        record.user.wallet.balance = balance.clone();
        record.user.updated_at = at;

        Ok(Some(ClaimOutcome {
            amount,
            count: transaction_ids.len(),
            balance,
            transaction_ids,
        }))
    }

    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.transaction(id)
    }

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        self.by_reference(reference)
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|tx| filter.matches(tx.value()))
            .map(|tx| tx.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = filter.offset.max(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_investment(
        &self,
        investment: &Investment,
        funding: Posting,
    ) -> RepositoryResult<PostingOutcome> {
        let cell = self.user_cell(investment.user_id)?;
        let mut record = lock(&cell)?;
        if let Some(replayed) = self.replay(&record, &funding.transaction)? {
            return Ok(replayed);
        }
        if self.investments.contains_key(&investment.id) {
            return Err(RepositoryError::Duplicate(format!("investment {}", investment.id)));
        }
        let outcome = self.apply_posting(&mut record, funding)?;
        self.investments.insert(investment.id, investment.clone());
        Ok(outcome)
    }

    async fn update_investment(
        &self,
        investment: &Investment,
        expected_version: i64,
        posting: Option<Posting>,
    ) -> RepositoryResult<(Investment, Option<PostingOutcome>)> {
        let cell = self.user_cell(investment.user_id)?;
        let mut record = lock(&cell)?;

        let stored = self.investment(investment.id)?;
        if let Some(posting) = posting.as_ref() {
            if let Some(replayed) = self.replay(&record, &posting.transaction)? {
                return Ok((stored, Some(replayed)));
            }
        }
        if stored.version != expected_version {
            return Err(RepositoryError::Conflict(format!(
                "investment {} is at version {}, expected {}",
                investment.id, stored.version, expected_version
            )));
        }

        let outcome = match posting {
            Some(posting) => Some(self.apply_posting(&mut record, posting)?),
            None => None,
        };
        let mut updated = investment.clone();
        updated.version = expected_version + 1;
        self.investments.insert(updated.id, updated.clone());
        Ok((updated, outcome))
    }

    async fn get_investment(&self, id: Uuid) -> RepositoryResult<Investment> {
        self.investment(id)
    }

    async fn list_investments(&self, filter: &InvestmentFilter) -> RepositoryResult<Vec<Investment>> {
        let mut rows: Vec<Investment> = self
            .investments
            .iter()
            .filter(|inv| filter.matches(inv.value()))
            .map(|inv| inv.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl ReferralGraph for MemoryStore {
    async fn referrer_of(&self, user_id: Uuid) -> RepositoryResult<Option<Uuid>> {
        let parent = self.get_user(user_id).await?.referred_by;
        Ok(parent.filter(|id| self.users.contains_key(id)))
    }
}

#[async_trait]
impl PlanCatalog for MemoryStore {
    async fn get_plan(&self, id: Uuid) -> RepositoryResult<InvestmentPlan> {
        self.plans
            .get(&id)
            .map(|plan| plan.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("plan {}", id)))
    }

    async fn active_plans(&self) -> RepositoryResult<Vec<InvestmentPlan>> {
        let mut plans: Vec<InvestmentPlan> = self
            .plans
            .iter()
            .filter(|plan| plan.is_active)
            .map(|plan| plan.value().clone())
            .collect();
        plans.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
        Ok(plans)
    }
}
