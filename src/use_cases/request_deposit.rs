//! Request deposit use case.
//! Records a pending deposit; the wallet is credited when an admin completes it.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{DomainEvent, PaymentMethod, TransactionType};
use crate::error::LedgerError;
use crate::ports::Posting;
use crate::services::events::EventEmitter;
use crate::services::ledger::{NewTransaction, TransactionLedger};

/// Input for the RequestDeposit use case.
#[derive(Debug)]
pub struct DepositInput {
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub payment_method: PaymentMethod,
    pub payment_details: Option<serde_json::Value>,
    pub reference: Option<String>,
}

/// Output of the RequestDeposit use case.
#[derive(Debug)]
pub struct DepositOutput {
    pub transaction_id: Uuid,
    pub reference: String,
    pub amount: BigDecimal,
    pub replayed: bool,
}

pub struct RequestDeposit {
    ledger: Arc<TransactionLedger>,
    events: EventEmitter,
}

impl RequestDeposit {
    pub fn new(ledger: Arc<TransactionLedger>, events: EventEmitter) -> Self {
        Self { ledger, events }
    }

    pub async fn execute(&self, input: DepositInput) -> Result<DepositOutput, LedgerError> {
        let draft = self.ledger.draft(
            NewTransaction::new(input.user_id, TransactionType::Deposit, input.amount)
                .with_payment_method(input.payment_method)
                .with_description(format!("Deposit via {}", input.payment_method.as_str()))
                .with_reference(input.reference)
                .with_metadata(serde_json::json!({
                    "payment_details": input.payment_details.unwrap_or(serde_json::Value::Null),
                })),
        )?;
        let outcome = self.ledger.apply_to_wallet(Posting::new(draft)).await?;

        let tx = outcome.transaction;
        if !outcome.replayed {
            self.events.emit(DomainEvent::DepositRequested {
                transaction_id: tx.id,
                user_id: tx.user_id,
                amount: tx.amount.clone(),
                at: tx.created_at,
            });
        }

        Ok(DepositOutput {
            transaction_id: tx.id,
            reference: tx.reference,
            amount: tx.amount,
            replayed: outcome.replayed,
        })
    }
}
