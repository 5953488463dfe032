//! Domain events handed to the notification collaborator.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::investment::InvestmentStatus;
use crate::domain::transaction::{TransactionStatus, TransactionType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    InvestmentCreated {
        investment_id: Uuid,
        user_id: Uuid,
        amount: BigDecimal,
        at: DateTime<Utc>,
    },
    ReferralBonusEarned {
        transaction_id: Uuid,
        beneficiary_id: Uuid,
        referred_user_id: Uuid,
        level: u8,
        amount: BigDecimal,
        at: DateTime<Utc>,
    },
    ReferralBonusClaimed {
        user_id: Uuid,
        amount: BigDecimal,
        count: usize,
        at: DateTime<Utc>,
    },
    ProfitWithdrawn {
        investment_id: Uuid,
        user_id: Uuid,
        transaction_id: Uuid,
        amount: BigDecimal,
        at: DateTime<Utc>,
    },
    InvestmentStatusChanged {
        investment_id: Uuid,
        user_id: Uuid,
        from: InvestmentStatus,
        to: InvestmentStatus,
        amount: BigDecimal,
        at: DateTime<Utc>,
    },
    TransactionSettled {
        transaction_id: Uuid,
        user_id: Uuid,
        tx_type: TransactionType,
        status: TransactionStatus,
        amount: BigDecimal,
        at: DateTime<Utc>,
    },
    DepositRequested {
        transaction_id: Uuid,
        user_id: Uuid,
        amount: BigDecimal,
        at: DateTime<Utc>,
    },
    WithdrawalRequested {
        transaction_id: Uuid,
        user_id: Uuid,
        amount: BigDecimal,
        fees: BigDecimal,
        at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// User the notification is addressed to.
    pub fn recipient(&self) -> Uuid {
        match self {
            DomainEvent::InvestmentCreated { user_id, .. }
            | DomainEvent::ReferralBonusClaimed { user_id, .. }
            | DomainEvent::ProfitWithdrawn { user_id, .. }
            | DomainEvent::InvestmentStatusChanged { user_id, .. }
            | DomainEvent::TransactionSettled { user_id, .. }
            | DomainEvent::DepositRequested { user_id, .. }
            | DomainEvent::WithdrawalRequested { user_id, .. } => *user_id,
            DomainEvent::ReferralBonusEarned { beneficiary_id, .. } => *beneficiary_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::InvestmentCreated { .. } => "investment_created",
            DomainEvent::ReferralBonusEarned { .. } => "referral_bonus_earned",
            DomainEvent::ReferralBonusClaimed { .. } => "referral_bonus_claimed",
            DomainEvent::ProfitWithdrawn { .. } => "profit_withdrawn",
            DomainEvent::InvestmentStatusChanged { .. } => "investment_status_changed",
            DomainEvent::TransactionSettled { .. } => "transaction_settled",
            DomainEvent::DepositRequested { .. } => "deposit_requested",
            DomainEvent::WithdrawalRequested { .. } => "withdrawal_requested",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let beneficiary = Uuid::new_v4();
        let event = DomainEvent::ReferralBonusEarned {
            transaction_id: Uuid::new_v4(),
            beneficiary_id: beneficiary,
            referred_user_id: Uuid::new_v4(),
            level: 2,
            amount: BigDecimal::from(6),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "referral_bonus_earned");
        assert_eq!(json["level"], 2);
        assert_eq!(event.recipient(), beneficiary);
        assert_eq!(event.name(), "referral_bonus_earned");
    }
}
