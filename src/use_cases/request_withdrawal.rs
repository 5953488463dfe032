//! Request withdrawal use case.
//!
//! Gates a user-initiated withdrawal and, once accepted, debits the full
//! amount immediately as a pending `withdrawal` transaction. A failed or
//! cancelled settlement refunds it.

use bigdecimal::BigDecimal;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{money, DomainEvent, PaymentMethod, TransactionType};
use crate::error::LedgerError;
use crate::ports::{DailyCap, Posting};
use crate::services::events::EventEmitter;
use crate::services::ledger::{NewTransaction, TransactionLedger};

#[derive(Debug, Clone)]
pub struct WithdrawalPolicy {
    pub min_amount: BigDecimal,
    pub fee_percent: BigDecimal,
    pub daily_limit: u32,
}

impl WithdrawalPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_amount: config.min_withdrawal_amount.clone(),
            fee_percent: config.withdrawal_fee_percent.clone(),
            daily_limit: config.daily_withdrawal_limit,
        }
    }

    pub fn fee_for(&self, amount: &BigDecimal) -> BigDecimal {
        money::percent_of(amount, &self.fee_percent)
    }
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Input for the RequestWithdrawal use case.
#[derive(Debug)]
pub struct WithdrawalInput {
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub payment_method: PaymentMethod,
    pub payment_details: Option<serde_json::Value>,
    pub reference: Option<String>,
}

/// Output of the RequestWithdrawal use case.
#[derive(Debug)]
pub struct WithdrawalOutput {
    pub transaction_id: Uuid,
    pub reference: String,
    pub amount: BigDecimal,
    pub fees: BigDecimal,
    pub net_amount: BigDecimal,
    pub balance: BigDecimal,
    pub replayed: bool,
}

pub struct RequestWithdrawal {
    ledger: Arc<TransactionLedger>,
    events: EventEmitter,
    policy: WithdrawalPolicy,
}

impl RequestWithdrawal {
    pub fn new(ledger: Arc<TransactionLedger>, events: EventEmitter, policy: WithdrawalPolicy) -> Self {
        Self {
            ledger,
            events,
            policy,
        }
    }

    pub async fn execute(&self, input: WithdrawalInput) -> Result<WithdrawalOutput, LedgerError> {
        if input.amount < self.policy.min_amount {
            return Err(LedgerError::BelowMinimum {
                minimum: self.policy.min_amount.clone(),
            });
        }

        let fees = self.policy.fee_for(&input.amount);
        let draft = self.ledger.draft(
            NewTransaction::new(input.user_id, TransactionType::Withdrawal, input.amount)
                .with_fees(fees)
                .with_payment_method(input.payment_method)
                .with_description(format!("Withdrawal via {}", input.payment_method.as_str()))
                .with_reference(input.reference)
                .with_metadata(serde_json::json!({
                    "payment_details": input.payment_details.unwrap_or(serde_json::Value::Null),
                })),
        )?;

        // Counted under the wallet lock, all statuses included.
        let cap = DailyCap {
            tx_type: TransactionType::Withdrawal,
            limit: self.policy.daily_limit,
            day: Utc::now().date_naive(),
        };
        let outcome = self
            .ledger
            .apply_to_wallet(Posting::new(draft).with_daily_cap(cap))
            .await?;

        let tx = outcome.transaction;
        if !outcome.replayed {
            self.events.emit(DomainEvent::WithdrawalRequested {
                transaction_id: tx.id,
                user_id: tx.user_id,
                amount: tx.amount.clone(),
                fees: tx.fees.clone(),
                at: tx.created_at,
            });
        }

        Ok(WithdrawalOutput {
            transaction_id: tx.id,
            reference: tx.reference,
            amount: tx.amount,
            fees: tx.fees,
            net_amount: tx.net_amount,
            balance: outcome.balance,
            replayed: outcome.replayed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_fee_is_two_percent_rounded_to_cents() {
        let policy = WithdrawalPolicy::default();
        assert_eq!(policy.fee_for(&dec("100")), dec("2.00"));
        assert_eq!(policy.fee_for(&dec("10.25")), dec("0.21"));
        assert_eq!(policy.daily_limit, 2);
        assert_eq!(policy.min_amount, dec("10"));
    }
}
