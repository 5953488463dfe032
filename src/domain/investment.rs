//! Investment aggregate: lifecycle, profit accrual and profit withdrawal.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::money;
use crate::domain::plan::InvestmentPlan;
use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
    Suspended,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "pending",
            InvestmentStatus::Active => "active",
            InvestmentStatus::Completed => "completed",
            InvestmentStatus::Cancelled => "cancelled",
            InvestmentStatus::Suspended => "suspended",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvestmentStatus::Completed | InvestmentStatus::Cancelled)
    }

    /// Admin transition table.
    ///
    /// Suspend, cancel and complete are reachable from any state unless
    /// `strict` forbids leaving a terminal state. `active` is only reachable
    /// as a resume from `suspended`; `pending` is never a target.
    pub fn admin_can_move_to(&self, to: InvestmentStatus, strict: bool) -> bool {
        use InvestmentStatus::*;
        if *self == to {
            return false;
        }
        if strict && self.is_terminal() {
            return false;
        }
        match (*self, to) {
            (_, Pending) => false,
            (Suspended, Active) => true,
            (_, Active) => false,
            (_, Suspended | Cancelled | Completed) => true,
        }
    }
}

impl fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvestmentStatus::Pending),
            "active" => Ok(InvestmentStatus::Active),
            "completed" => Ok(InvestmentStatus::Completed),
            "cancelled" => Ok(InvestmentStatus::Cancelled),
            "suspended" => Ok(InvestmentStatus::Suspended),
            other => Err(format!("unknown investment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitEntry {
    pub date: DateTime<Utc>,
    pub accrued_on: NaiveDate,
    pub amount: BigDecimal,
    pub percent: BigDecimal,
}

/// A completed profit withdrawal and the `profit` credit that paid it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalEntry {
    pub date: DateTime<Utc>,
    pub amount: BigDecimal,
    pub transaction_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub duration_days: i32,
    pub roi_percent: BigDecimal,
    pub status: InvestmentStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Accrued and not yet withdrawn.
    pub total_profit: BigDecimal,
    pub profit_history: Vec<ProfitEntry>,
    pub withdrawal_history: Vec<WithdrawalEntry>,
    pub last_accrued_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    /// Optimistic concurrency token, bumped on every persisted change.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Investment {
    pub fn new(
        user_id: Uuid,
        plan: &InvestmentPlan,
        amount: BigDecimal,
        notes: Option<String>,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            plan_id: plan.id,
            amount,
            currency: "USD".to_string(),
            duration_days: plan.duration_days,
            roi_percent: plan.roi_percent.clone(),
            status: InvestmentStatus::Pending,
            start_date,
            end_date: start_date + Duration::days(plan.duration_days as i64),
            total_profit: money::zero(),
            profit_history: Vec::new(),
            withdrawal_history: Vec::new(),
            last_accrued_on: None,
            notes,
            admin_notes: None,
            version: 0,
            created_at: start_date,
            updated_at: start_date,
        }
    }

    /// `pending -> active`, once the funding debit has gone through.
    pub fn activate(&mut self) -> Result<(), LedgerError> {
        if self.status != InvestmentStatus::Pending {
            return Err(LedgerError::InvalidTransition {
                from: self.status.to_string(),
                to: InvestmentStatus::Active.to_string(),
            });
        }
        self.status = InvestmentStatus::Active;
        Ok(())
    }

    /// `amount * roi / (100 * duration)`, rounded to cents.
    pub fn daily_profit(&self) -> BigDecimal {
        let divisor = BigDecimal::from(100) * BigDecimal::from(self.duration_days.max(1));
        money::round_cents(&(&self.amount * &self.roi_percent / divisor))
    }

    /// Daily profit, except the last day of the term pays whatever rounding
    /// left over, so the term sums to exactly `amount * roi_percent / 100`.
    fn next_accrual_amount(&self) -> BigDecimal {
        if self.profit_history.len() + 1 < self.duration_days.max(1) as usize {
            return self.daily_profit();
        }
        let accrued = self
            .profit_history
            .iter()
            .fold(money::zero(), |acc, entry| acc + &entry.amount);
        money::percent_of(&self.amount, &self.roi_percent) - accrued
    }

    pub fn daily_percent(&self) -> BigDecimal {
        money::round_scale(
            &(self.roi_percent.clone() / BigDecimal::from(self.duration_days.max(1))),
            4,
        )
    }

    /// Credits one day of profit for `on`.
    ///
    /// Returns `None` when `on` was already accrued (or an earlier scheduler
    /// run covered a later day) and once every day of the term is paid.
    pub fn accrue(&mut self, on: NaiveDate, at: DateTime<Utc>) -> Result<Option<ProfitEntry>, LedgerError> {
        if self.status != InvestmentStatus::Active {
            return Err(LedgerError::InvalidState(format!(
                "investment {} is {}, only active investments accrue profit",
                self.id, self.status
            )));
        }
        if matches!(self.last_accrued_on, Some(last) if last >= on) {
            return Ok(None);
        }
        if self.profit_history.len() >= self.duration_days.max(0) as usize {
            return Ok(None);
        }

        let entry = ProfitEntry {
            date: at,
            accrued_on: on,
            amount: self.next_accrual_amount(),
            percent: self.daily_percent(),
        };
        self.total_profit = &self.total_profit + &entry.amount;
        self.profit_history.push(entry.clone());
        self.last_accrued_on = Some(on);
        self.updated_at = at;
        Ok(Some(entry))
    }

    pub fn withdraw_profit(
        &mut self,
        amount: &BigDecimal,
        transaction_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if self.status != InvestmentStatus::Active {
            return Err(LedgerError::InvalidState(format!(
                "can only withdraw from active investments, {} is {}",
                self.id, self.status
            )));
        }
        if *amount < money::min_transaction_amount() {
            return Err(LedgerError::InvalidAmount(format!(
                "withdrawal amount {} is below {}",
                amount,
                money::MIN_TRANSACTION_AMOUNT
            )));
        }
        if *amount > self.total_profit {
            return Err(LedgerError::InsufficientProfit {
                available: self.total_profit.clone(),
                requested: amount.clone(),
            });
        }

        self.total_profit = &self.total_profit - amount;
        self.withdrawal_history.push(WithdrawalEntry {
            date: at,
            amount: amount.clone(),
            transaction_id,
        });
        self.updated_at = at;
        Ok(())
    }

    /// Admin status change; returns the previous status.
    pub fn transition(
        &mut self,
        to: InvestmentStatus,
        admin_notes: Option<String>,
        strict: bool,
        at: DateTime<Utc>,
    ) -> Result<InvestmentStatus, LedgerError> {
        let from = self.status;
        if !from.admin_can_move_to(to, strict) {
            return Err(LedgerError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        if admin_notes.is_some() {
            self.admin_notes = admin_notes;
        }
        if to == InvestmentStatus::Completed && at < self.end_date {
            self.end_date = at;
        }
        self.updated_at = at;
        Ok(from)
    }

    pub fn is_matured(&self, now: DateTime<Utc>) -> bool {
        self.status == InvestmentStatus::Active && self.end_date <= now
    }

    pub fn remaining_days(&self, now: DateTime<Utc>) -> i64 {
        if self.status != InvestmentStatus::Active {
            return 0;
        }
        let remaining = self.end_date - now;
        let seconds = remaining.num_seconds();
        if seconds <= 0 {
            return 0;
        }
        // Partial days count as a whole day.
        (seconds + 86_399) / 86_400
    }

    pub fn progress_percentage(&self, now: DateTime<Utc>) -> f64 {
        if self.status != InvestmentStatus::Active || self.duration_days <= 0 {
            return 0.0;
        }
        let elapsed = self.duration_days as i64 - self.remaining_days(now);
        (elapsed as f64 * 100.0 / self.duration_days as f64).clamp(0.0, 100.0)
    }

    pub fn current_value(&self) -> BigDecimal {
        &self.amount + &self.total_profit
    }
}
