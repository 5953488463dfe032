//! Investment lifecycle: funding, daily accrual, profit withdrawal and
//! admin status changes.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    money, Actor, DomainEvent, Investment, InvestmentPlan, InvestmentStatus, ProfitEntry,
    TransactionType,
};
use crate::error::LedgerError;
use crate::ports::{InvestmentFilter, LedgerStore, PlanCatalog, Posting, RepositoryError};
use crate::services::commission::CommissionService;
use crate::services::events::EventEmitter;
use crate::services::ledger::{NewTransaction, TransactionLedger};

/// Re-reads after a lost version race on system-driven updates.
const MAX_ACCRUAL_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub currency: String,
    pub min_investment_amount: BigDecimal,
    pub strict_status_transitions: bool,
}

#[derive(Debug, Clone)]
pub struct CreateInvestment {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount: BigDecimal,
    pub notes: Option<String>,
    /// Client idempotency key for the funding debit.
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccrualReport {
    pub credited: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentStats {
    pub total_invested: BigDecimal,
    pub total_profit: BigDecimal,
    pub active_count: usize,
    pub completed_count: usize,
    pub average_roi: BigDecimal,
    pub daily_earnings: BigDecimal,
    pub days_remaining: i64,
}

/// What an amount would earn on a plan if held to term.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanQuote {
    pub plan_id: Uuid,
    pub amount: BigDecimal,
    pub daily_roi: BigDecimal,
    pub daily_profit: BigDecimal,
    pub total_profit: BigDecimal,
    pub total_return: BigDecimal,
}

pub struct InvestmentEngine {
    store: Arc<dyn LedgerStore>,
    plans: Arc<dyn PlanCatalog>,
    ledger: Arc<TransactionLedger>,
    commissions: Arc<CommissionService>,
    events: EventEmitter,
    settings: EngineSettings,
}

impl InvestmentEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        plans: Arc<dyn PlanCatalog>,
        ledger: Arc<TransactionLedger>,
        commissions: Arc<CommissionService>,
        events: EventEmitter,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            plans,
            ledger,
            commissions,
            events,
            settings,
        }
    }

    /// Funds a new investment from the wallet and pays referral commissions.
    ///
    /// The investment is stored `active` together with its funding debit.
    /// Replaying a reference returns the investment it created without
    /// distributing commissions again.
    pub async fn create(&self, request: CreateInvestment) -> Result<Investment, LedgerError> {
        if let Some(existing) = self
            .replayed_investment(
                request.reference.as_deref(),
                request.user_id,
                TransactionType::Investment,
                None,
            )
            .await?
        {
            return Ok(existing);
        }

        let plan = self.plans.get_plan(request.plan_id).await?;
        if !plan.is_active {
            return Err(LedgerError::PlanInactive(plan.name));
        }
        if request.amount < self.settings.min_investment_amount || !plan.accepts(&request.amount) {
            return Err(LedgerError::InvalidAmount(format!(
                "{} must be between {} and {} for plan {} (global minimum {})",
                request.amount,
                plan.min_amount,
                plan.max_amount,
                plan.name,
                self.settings.min_investment_amount
            )));
        }
        self.store.get_user(request.user_id).await?;

        let mut investment = Investment::new(
            request.user_id,
            &plan,
            request.amount.clone(),
            request.notes,
            Utc::now(),
        );
        investment.currency = self.settings.currency.clone();

        let funding = self.ledger.draft(
            NewTransaction::new(request.user_id, TransactionType::Investment, request.amount)
                .with_investment(investment.id)
                .with_reference(request.reference)
                .with_description(format!("Investment in {}", plan.name))
                .with_metadata(serde_json::json!({
                    "plan_id": plan.id,
                    "plan_name": plan.name,
                    "duration_days": plan.duration_days,
                    "roi_percent": plan.roi_percent.to_string(),
                })),
        )?;
        investment.activate()?;

        let outcome = self
            .store
            .insert_investment(&investment, Posting::new(funding))
            .await?;
        if outcome.replayed {
            return self.investment_for(&outcome.transaction.reference, outcome.transaction.investment_id).await;
        }

        tracing::info!(
            "Investment {} of {} created for user {} on plan {}, balance {}",
            investment.id,
            investment.amount,
            investment.user_id,
            plan.name,
            outcome.balance
        );
        self.events.emit(DomainEvent::InvestmentCreated {
            investment_id: investment.id,
            user_id: investment.user_id,
            amount: investment.amount.clone(),
            at: investment.created_at,
        });

        let bonuses = self.commissions.distribute(&investment).await;
        tracing::debug!("Investment {} paid {} commission(s)", investment.id, bonuses.len());

        Ok(investment)
    }

    /// Looks up a client reference. A hit only counts as a replay when it
    /// was posted for the same owner and operation, and for `investment_id`
    /// when one is given.
    async fn replayed_investment(
        &self,
        reference: Option<&str>,
        user_id: Uuid,
        tx_type: TransactionType,
        investment_id: Option<Uuid>,
    ) -> Result<Option<Investment>, LedgerError> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        let Some(tx) = self.store.find_transaction_by_reference(reference).await? else {
            return Ok(None);
        };
        let same_investment = investment_id.map_or(true, |id| tx.investment_id == Some(id));
        if tx.user_id != user_id || tx.tx_type != tx_type || !same_investment {
            return Err(LedgerError::Conflict(format!(
                "reference {} belongs to another operation",
                reference
            )));
        }
        self.investment_for(reference, tx.investment_id).await.map(Some)
    }

    async fn investment_for(
        &self,
        reference: &str,
        investment_id: Option<Uuid>,
    ) -> Result<Investment, LedgerError> {
        let id = investment_id.ok_or_else(|| {
            LedgerError::Conflict(format!("reference {} belongs to another operation", reference))
        })?;
        tracing::debug!("Replayed investment {} for reference {}", id, reference);
        Ok(self.store.get_investment(id).await?)
    }

    /// Accrues one day of profit. A day that was already accrued, or a
    /// term that is fully paid, returns `None` and changes nothing.
    pub async fn accrue_daily_profit(
        &self,
        investment_id: Uuid,
        on: NaiveDate,
    ) -> Result<Option<ProfitEntry>, LedgerError> {
        let mut attempt = 1;
        loop {
            let mut investment = self.store.get_investment(investment_id).await?;
            let expected = investment.version;
            let Some(entry) = investment.accrue(on, Utc::now())? else {
                tracing::debug!("Investment {} already accrued for {}", investment_id, on);
                return Ok(None);
            };

            match self.store.update_investment(&investment, expected, None).await {
                Ok(_) => {
                    tracing::info!(
                        "Accrued {} on investment {} for {}, total profit {}",
                        entry.amount,
                        investment_id,
                        on,
                        investment.total_profit
                    );
                    return Ok(Some(entry));
                }
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_ACCRUAL_ATTEMPTS => {
                    tracing::debug!("Accrual on {} lost a race ({}), retrying", investment_id, reason);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Scheduler hook: accrues `on` for every active investment.
    pub async fn accrue_all(&self, on: NaiveDate) -> Result<AccrualReport, LedgerError> {
        let active = self
            .store
            .list_investments(&InvestmentFilter {
                status: Some(InvestmentStatus::Active),
                ..Default::default()
            })
            .await?;

        let mut report = AccrualReport::default();
        for investment in active {
            match self.accrue_daily_profit(investment.id, on).await {
                Ok(Some(_)) => report.credited += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::error!("Failed to accrue investment {} for {}: {}", investment.id, on, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Accrual for {}: {} credited, {} skipped, {} failed",
            on,
            report.credited,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Moves accrued profit into the owner's wallet as a `profit` credit.
    pub async fn withdraw_profit(
        &self,
        investment_id: Uuid,
        actor: &Actor,
        amount: BigDecimal,
        reference: Option<String>,
    ) -> Result<Investment, LedgerError> {
        let mut investment = self.store.get_investment(investment_id).await?;
        if investment.user_id != actor.user_id && actor.require_admin().is_err() {
            return Err(LedgerError::Unauthorized(format!(
                "user {} does not own investment {}",
                actor.user_id, investment_id
            )));
        }
        if let Some(existing) = self
            .replayed_investment(
                reference.as_deref(),
                investment.user_id,
                TransactionType::Profit,
                Some(investment.id),
            )
            .await?
        {
            tracing::debug!("Profit withdrawal on {} replayed", investment_id);
            return Ok(existing);
        }
        let expected = investment.version;

        let credit = self.ledger.draft(
            NewTransaction::new(investment.user_id, TransactionType::Profit, amount.clone())
                .with_investment(investment.id)
                .with_reference(reference)
                .with_description("Profit withdrawal")
                .with_metadata(serde_json::json!({ "source": "profit_withdrawal" })),
        )?;
        let now = Utc::now();
        investment.withdraw_profit(&amount, credit.id, now)?;

        let (updated, outcome) = self
            .store
            .update_investment(&investment, expected, Some(Posting::new(credit)))
            .await?;
        let Some(outcome) = outcome.filter(|o| !o.replayed) else {
            tracing::debug!("Profit withdrawal on {} replayed", investment_id);
            return Ok(updated);
        };

        tracing::info!(
            "Withdrew {} profit from investment {} for user {}, balance {}",
            amount,
            investment_id,
            updated.user_id,
            outcome.balance
        );
        self.events.emit(DomainEvent::ProfitWithdrawn {
            investment_id,
            user_id: updated.user_id,
            transaction_id: outcome.transaction.id,
            amount,
            at: now,
        });
        Ok(updated)
    }

    /// Admin status change, checked against the transition table.
    pub async fn transition_status(
        &self,
        investment_id: Uuid,
        to: InvestmentStatus,
        admin: &Actor,
        admin_notes: Option<String>,
    ) -> Result<Investment, LedgerError> {
        admin.require_admin()?;
        let investment = self.store.get_investment(investment_id).await?;
        let updated = self.apply_transition(investment, to, admin_notes, Utc::now()).await?;
        tracing::info!(
            "Admin {} moved investment {} to {}",
            admin.user_id,
            investment_id,
            updated.status
        );
        Ok(updated)
    }

    async fn apply_transition(
        &self,
        mut investment: Investment,
        to: InvestmentStatus,
        admin_notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Investment, LedgerError> {
        let expected = investment.version;
        let from = investment.transition(to, admin_notes, self.settings.strict_status_transitions, at)?;
        let (updated, _) = self.store.update_investment(&investment, expected, None).await?;

        self.events.emit(DomainEvent::InvestmentStatusChanged {
            investment_id: updated.id,
            user_id: updated.user_id,
            from,
            to,
            amount: updated.amount.clone(),
            at,
        });
        Ok(updated)
    }

    /// Completes every active investment whose term ended by `now`.
    pub async fn complete_matured(&self, now: DateTime<Utc>) -> Result<Vec<Investment>, LedgerError> {
        let active = self
            .store
            .list_investments(&InvestmentFilter {
                status: Some(InvestmentStatus::Active),
                ..Default::default()
            })
            .await?;

        let mut completed = Vec::new();
        for investment in active.into_iter().filter(|inv| inv.is_matured(now)) {
            let id = investment.id;
            match self
                .apply_transition(investment, InvestmentStatus::Completed, None, now)
                .await
            {
                Ok(updated) => {
                    tracing::info!("Investment {} matured", id);
                    completed.push(updated);
                }
                Err(e) => tracing::warn!("Failed to complete matured investment {}: {}", id, e),
            }
        }
        Ok(completed)
    }

    /// Active plans, cheapest entry first.
    pub async fn available_plans(&self) -> Result<Vec<InvestmentPlan>, LedgerError> {
        Ok(self.plans.active_plans().await?)
    }

    pub async fn quote(&self, plan_id: Uuid, amount: &BigDecimal) -> Result<PlanQuote, LedgerError> {
        let plan = self.plans.get_plan(plan_id).await?;
        if !plan.is_active {
            return Err(LedgerError::PlanInactive(plan.name));
        }
        if !plan.accepts(amount) {
            return Err(LedgerError::InvalidAmount(format!(
                "{} must be between {} and {} for plan {}",
                amount, plan.min_amount, plan.max_amount, plan.name
            )));
        }
        let total_profit = plan.projected_profit(amount, plan.duration_days);
        Ok(PlanQuote {
            plan_id: plan.id,
            amount: amount.clone(),
            daily_roi: plan.daily_roi(),
            daily_profit: plan.projected_profit(amount, 1),
            total_return: amount + &total_profit,
            total_profit,
        })
    }

    pub async fn get(&self, investment_id: Uuid) -> Result<Investment, LedgerError> {
        Ok(self.store.get_investment(investment_id).await?)
    }

    pub async fn list(&self, filter: &InvestmentFilter) -> Result<Vec<Investment>, LedgerError> {
        Ok(self.store.list_investments(filter).await?)
    }

    pub async fn stats(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<InvestmentStats, LedgerError> {
        let investments = self
            .store
            .list_investments(&InvestmentFilter {
                user_id: Some(user_id),
                ..Default::default()
            })
            .await?;

        let mut stats = InvestmentStats {
            total_invested: money::zero(),
            total_profit: money::zero(),
            active_count: 0,
            completed_count: 0,
            average_roi: money::zero(),
            daily_earnings: money::zero(),
            days_remaining: 0,
        };
        let mut roi_sum = money::zero();
        for inv in &investments {
            stats.total_invested = &stats.total_invested + &inv.amount;
            stats.total_profit = &stats.total_profit + &inv.total_profit;
            roi_sum = roi_sum + &inv.roi_percent;
            match inv.status {
                InvestmentStatus::Active => {
                    stats.active_count += 1;
                    stats.daily_earnings = &stats.daily_earnings + &inv.daily_profit();
                    stats.days_remaining += inv.remaining_days(now);
                }
                InvestmentStatus::Completed => stats.completed_count += 1,
                _ => {}
            }
        }
        if !investments.is_empty() {
            stats.average_roi =
                money::round_scale(&(roi_sum / BigDecimal::from(investments.len() as i64)), 4);
        }
        Ok(stats)
    }
}
