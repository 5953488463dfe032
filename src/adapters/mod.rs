pub mod memory_store;
pub mod postgres_store;

pub use memory_store::MemoryStore;
pub use postgres_store::PostgresStore;

use bigdecimal::BigDecimal;

use crate::domain::{money, Transaction};
use crate::ports::{RepositoryError, RepositoryResult};

/// Balance after applying `delta`; a negative result is rejected.
pub(crate) fn apply_delta(
    balance: &BigDecimal,
    delta: Option<&BigDecimal>,
) -> RepositoryResult<BigDecimal> {
    let Some(delta) = delta else {
        return Ok(balance.clone());
    };
    let next = balance + delta;
    if next < money::zero() {
        return Err(RepositoryError::InsufficientBalance {
            available: balance.clone(),
            required: -delta.clone(),
        });
    }
    Ok(next)
}

/// A stored transaction may only answer for a posting that carries the same
/// owner, type and investment; anything else is a reused reference.
pub(crate) fn check_replay(existing: &Transaction, incoming: &Transaction) -> RepositoryResult<()> {
    if existing.user_id != incoming.user_id
        || existing.tx_type != incoming.tx_type
        || existing.investment_id != incoming.investment_id
    {
        return Err(RepositoryError::Duplicate(format!(
            "reference {} belongs to another operation",
            existing.reference
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionType;
    use uuid::Uuid;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_apply_delta() {
        assert_eq!(apply_delta(&dec("10"), None).unwrap(), dec("10"));
        assert_eq!(apply_delta(&dec("10"), Some(&dec("-10"))).unwrap(), dec("0"));
        assert_eq!(apply_delta(&dec("10"), Some(&dec("5.5"))).unwrap(), dec("15.5"));
    }

    #[test]
    fn test_apply_delta_rejects_overdraft() {
        match apply_delta(&dec("10"), Some(&dec("-10.01"))) {
            Err(RepositoryError::InsufficientBalance { available, required }) => {
                assert_eq!(available, dec("10"));
                assert_eq!(required, dec("10.01"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_check_replay_rejects_foreign_reference() {
        let owner = Uuid::new_v4();
        let stored = Transaction::new(owner, TransactionType::Deposit, dec("10"), dec("0"))
            .with_reference("DEP-A");
        let same = Transaction::new(owner, TransactionType::Deposit, dec("99"), dec("0"))
            .with_reference("DEP-A");
        assert!(check_replay(&stored, &same).is_ok());

        let other_user = Transaction::new(Uuid::new_v4(), TransactionType::Deposit, dec("10"), dec("0"))
            .with_reference("DEP-A");
        assert!(matches!(
            check_replay(&stored, &other_user),
            Err(RepositoryError::Duplicate(_))
        ));

        let other_type = Transaction::new(owner, TransactionType::Fee, dec("10"), dec("0"))
            .with_reference("DEP-A");
        assert!(check_replay(&stored, &other_type).is_err());

        let other_investment = same.clone().with_investment(Uuid::new_v4());
        assert!(check_replay(&stored, &other_investment).is_err());
    }
}
