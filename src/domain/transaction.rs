//! Transaction domain entity.
//! Framework-agnostic record of one money movement and its settlement state.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Profit,
    ReferralBonus,
    Investment,
    Refund,
    Fee,
}

/// Which way a settled transaction moves the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

/// How a transaction type reaches the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePolicy {
    /// Completed at creation; the wallet moves immediately.
    Immediate(Direction),
    /// Pending at creation; the net amount is credited on completion.
    CreditOnSettle,
    /// Full amount debited at creation; refunded if the request fails or is cancelled.
    DebitThenRefund,
    /// Pending until the beneficiary claims it.
    ClaimLater,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Profit => "profit",
            TransactionType::ReferralBonus => "referral_bonus",
            TransactionType::Investment => "investment",
            TransactionType::Refund => "refund",
            TransactionType::Fee => "fee",
        }
    }

    pub fn policy(&self) -> LifecyclePolicy {
        match self {
            TransactionType::Deposit => LifecyclePolicy::CreditOnSettle,
            TransactionType::Withdrawal => LifecyclePolicy::DebitThenRefund,
            TransactionType::ReferralBonus => LifecyclePolicy::ClaimLater,
            TransactionType::Investment | TransactionType::Fee => {
                LifecyclePolicy::Immediate(Direction::Debit)
            }
            TransactionType::Profit | TransactionType::Refund => {
                LifecyclePolicy::Immediate(Direction::Credit)
            }
        }
    }

    /// Reference prefix: first three letters of the type name.
    pub fn reference_prefix(&self) -> String {
        self.as_str()[..3].to_uppercase()
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "profit" => Ok(TransactionType::Profit),
            "referral_bonus" => Ok(TransactionType::ReferralBonus),
            "investment" => Ok(TransactionType::Investment),
            "refund" => Ok(TransactionType::Refund),
            "fee" => Ok(TransactionType::Fee),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Crypto,
    CreditCard,
    Paypal,
    Internal,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Crypto => "crypto",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Internal => "internal",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "crypto" => Ok(PaymentMethod::Crypto),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "paypal" => Ok(PaymentMethod::Paypal),
            "internal" => Ok(PaymentMethod::Internal),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

/// Domain entity representing a transaction.
///
/// `amount` is always positive; the direction comes from the type's
/// [`LifecyclePolicy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub investment_id: Option<Uuid>,
    pub tx_type: TransactionType,
    pub amount: BigDecimal,
    pub fees: BigDecimal,
    pub net_amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub description: String,
    pub reference: String,
    pub payment_method: PaymentMethod,
    pub metadata: serde_json::Value,
    pub admin_notes: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wallet consequence of settling a pending transaction.
#[derive(Debug, Clone)]
pub enum SettlementEffect {
    None,
    Credit(BigDecimal),
    Refund(Transaction),
}

impl Transaction {
    pub fn new(user_id: Uuid, tx_type: TransactionType, amount: BigDecimal, fees: BigDecimal) -> Self {
        let now = Utc::now();
        let net_amount = &amount - &fees;
        let status = match tx_type.policy() {
            LifecyclePolicy::Immediate(_) => TransactionStatus::Completed,
            _ => TransactionStatus::Pending,
        };
        Self {
            id: Uuid::new_v4(),
            user_id,
            investment_id: None,
            tx_type,
            amount,
            fees,
            net_amount,
            currency: "USD".to_string(),
            status,
            description: tx_type.as_str().replace('_', " "),
            reference: generate_reference(tx_type, now),
            payment_method: PaymentMethod::Internal,
            metadata: serde_json::json!({}),
            admin_notes: None,
            processed_at: status.is_terminal().then_some(now),
            processed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_investment(mut self, investment_id: Uuid) -> Self {
        self.investment_id = Some(investment_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_payment_method(mut self, payment_method: PaymentMethod) -> Self {
        self.payment_method = payment_method;
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    /// Signed wallet delta applied when the transaction is recorded.
    pub fn creation_delta(&self) -> Option<BigDecimal> {
        match self.tx_type.policy() {
            LifecyclePolicy::Immediate(Direction::Credit) => Some(self.net_amount.clone()),
            LifecyclePolicy::Immediate(Direction::Debit) => Some(-self.amount.clone()),
            LifecyclePolicy::DebitThenRefund => Some(-self.amount.clone()),
            LifecyclePolicy::CreditOnSettle | LifecyclePolicy::ClaimLater => None,
        }
    }

    /// Wallet consequence of moving this (pending) transaction to `to`.
    pub fn settlement_effect(&self, to: TransactionStatus) -> SettlementEffect {
        if self.status.is_terminal() {
            return SettlementEffect::None;
        }
        match (self.tx_type.policy(), to) {
            (LifecyclePolicy::CreditOnSettle, TransactionStatus::Completed)
            | (LifecyclePolicy::ClaimLater, TransactionStatus::Completed) => {
                SettlementEffect::Credit(self.net_amount.clone())
            }
            (
                LifecyclePolicy::DebitThenRefund,
                TransactionStatus::Failed | TransactionStatus::Cancelled,
            ) => SettlementEffect::Refund(self.refund()),
            _ => SettlementEffect::None,
        }
    }

    /// Completed refund returning the full debited amount of this transaction.
    pub fn refund(&self) -> Transaction {
        let mut refund = Transaction::new(
            self.user_id,
            TransactionType::Refund,
            self.amount.clone(),
            money::zero(),
        )
        .with_reference(format!("RFD{}", self.reference))
        .with_currency(&self.currency)
        .with_description(format!("Refund of {} {}", self.tx_type, self.reference))
        .with_metadata(serde_json::json!({ "refund_of": self.id }));
        refund.investment_id = self.investment_id;
        refund
    }

    /// Applies the terminal status and audit fields.
    pub fn mark_settled(
        &mut self,
        to: TransactionStatus,
        processed_by: Option<Uuid>,
        admin_notes: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.status = to;
        self.processed_at = Some(at);
        self.processed_by = processed_by;
        if admin_notes.is_some() {
            self.admin_notes = admin_notes;
        }
        self.updated_at = at;
    }
}

/// `type prefix + base36 millis + 6 random base36 chars`, upper-cased.
pub fn generate_reference(tx_type: TransactionType, at: DateTime<Utc>) -> String {
    let random: String = to_base36(Uuid::new_v4().as_u128()).chars().take(6).collect();
    format!(
        "{}{}{}",
        tx_type.reference_prefix(),
        to_base36(at.timestamp_millis().max(0) as u128),
        random
    )
    .to_uppercase()
}

pub fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_internal_types_complete_at_creation() {
        let user = Uuid::new_v4();
        let debit = Transaction::new(user, TransactionType::Investment, dec("100"), dec("0"));
        assert_eq!(debit.status, TransactionStatus::Completed);
        assert!(debit.processed_at.is_some());
        assert_eq!(debit.creation_delta(), Some(dec("-100")));

        let profit = Transaction::new(user, TransactionType::Profit, dec("20"), dec("0"));
        assert_eq!(profit.creation_delta(), Some(dec("20")));
    }

    #[test]
    fn test_external_types_start_pending() {
        let user = Uuid::new_v4();
        for tx_type in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::ReferralBonus,
        ] {
            let tx = Transaction::new(user, tx_type, dec("50"), dec("0"));
            assert_eq!(tx.status, TransactionStatus::Pending);
            assert!(tx.processed_at.is_none());
        }
    }

    #[test]
    fn test_withdrawal_debits_gross_amount() {
        let tx = Transaction::new(Uuid::new_v4(), TransactionType::Withdrawal, dec("100"), dec("2"));
        assert_eq!(tx.net_amount, dec("98"));
        assert_eq!(tx.creation_delta(), Some(dec("-100")));
    }

    #[test]
    fn test_deposit_credits_on_completion_only() {
        let tx = Transaction::new(Uuid::new_v4(), TransactionType::Deposit, dec("75"), dec("0"));
        assert!(tx.creation_delta().is_none());
        match tx.settlement_effect(TransactionStatus::Completed) {
            SettlementEffect::Credit(amount) => assert_eq!(amount, dec("75")),
            other => panic!("unexpected effect {:?}", other),
        }
        assert!(matches!(
            tx.settlement_effect(TransactionStatus::Failed),
            SettlementEffect::None
        ));
    }

    #[test]
    fn test_failed_withdrawal_refunds_full_amount() {
        let tx = Transaction::new(Uuid::new_v4(), TransactionType::Withdrawal, dec("100"), dec("2"));
        match tx.settlement_effect(TransactionStatus::Failed) {
            SettlementEffect::Refund(refund) => {
                assert_eq!(refund.tx_type, TransactionType::Refund);
                assert_eq!(refund.status, TransactionStatus::Completed);
                assert_eq!(refund.creation_delta(), Some(dec("100")));
                assert_eq!(refund.reference, format!("RFD{}", tx.reference));
            }
            other => panic!("unexpected effect {:?}", other),
        }
        assert!(matches!(
            tx.settlement_effect(TransactionStatus::Completed),
            SettlementEffect::None
        ));
    }

    #[test]
    fn test_terminal_transaction_has_no_effect() {
        let mut tx = Transaction::new(Uuid::new_v4(), TransactionType::Deposit, dec("10"), dec("0"));
        tx.mark_settled(TransactionStatus::Completed, None, None, Utc::now());
        assert!(matches!(
            tx.settlement_effect(TransactionStatus::Completed),
            SettlementEffect::None
        ));
    }

    #[test]
    fn test_reference_format() {
        let reference = generate_reference(TransactionType::Withdrawal, Utc::now());
        assert!(reference.starts_with("WIT"));
        assert_eq!(reference, reference.to_uppercase());
        let other = generate_reference(TransactionType::Withdrawal, Utc::now());
        assert_ne!(reference, other);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_type_round_trips_through_str() {
        for tx_type in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::Profit,
            TransactionType::ReferralBonus,
            TransactionType::Investment,
            TransactionType::Refund,
            TransactionType::Fee,
        ] {
            assert_eq!(tx_type.as_str().parse::<TransactionType>().unwrap(), tx_type);
        }
    }
}
