use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::ports::RepositoryError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Investment plan {0} is not available")]
    PlanInactive(String),

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        available: BigDecimal,
        required: BigDecimal,
    },

    #[error("Insufficient profit: available {available}, requested {requested}")]
    InsufficientProfit {
        available: BigDecimal,
        requested: BigDecimal,
    },

    #[error("Amount is below the minimum of {minimum}")]
    BelowMinimum { minimum: BigDecimal },

    #[error("Daily limit of {limit} reached")]
    DailyLimitExceeded { limit: u32 },

    #[error("Nothing to claim")]
    NothingToClaim,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Stable machine-readable code for collaborators.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::PlanInactive(_) => "plan_inactive",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::InsufficientProfit { .. } => "insufficient_profit",
            LedgerError::BelowMinimum { .. } => "below_minimum",
            LedgerError::DailyLimitExceeded { .. } => "daily_limit_exceeded",
            LedgerError::NothingToClaim => "nothing_to_claim",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::Unauthorized(_) => "unauthorized",
            LedgerError::InvalidTransition { .. } => "invalid_transition",
            LedgerError::InvalidState(_) => "invalid_state",
            LedgerError::Storage(_) => "storage",
        }
    }

    /// Only lost wallet races are worth retrying with the same reference.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => LedgerError::NotFound(what),
            RepositoryError::InsufficientBalance {
                available,
                required,
            } => LedgerError::InsufficientBalance {
                available,
                required,
            },
            RepositoryError::DailyLimitExceeded { limit } => {
                LedgerError::DailyLimitExceeded { limit }
            }
            RepositoryError::Conflict(what) => LedgerError::Conflict(what),
            RepositoryError::Duplicate(what) => LedgerError::Conflict(what),
            RepositoryError::Decode(what) => LedgerError::Storage(what),
            RepositoryError::Database(e) => LedgerError::Storage(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_code() {
        let error = LedgerError::InsufficientBalance {
            available: BigDecimal::from(5),
            required: BigDecimal::from(10),
        };
        assert_eq!(error.code(), "insufficient_balance");
        assert_eq!(
            error.to_string(),
            "Insufficient balance: available 5, required 10"
        );
    }

    #[test]
    fn test_nothing_to_claim_code() {
        assert_eq!(LedgerError::NothingToClaim.code(), "nothing_to_claim");
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(LedgerError::Conflict("wallet".to_string()).is_retryable());
        assert!(!LedgerError::NothingToClaim.is_retryable());
        assert!(!LedgerError::Storage("down".to_string()).is_retryable());
    }

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let error: LedgerError = RepositoryError::NotFound("investment 42".to_string()).into();
        assert_eq!(error.code(), "not_found");
    }

    #[test]
    fn test_repository_conflict_maps_to_conflict() {
        let error: LedgerError = RepositoryError::Conflict("version 3".to_string()).into();
        assert!(error.is_retryable());
    }

    #[test]
    fn test_database_error_maps_to_storage() {
        let error: LedgerError = RepositoryError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(error.code(), "storage");
    }

    #[test]
    fn test_daily_limit_maps_through() {
        let error: LedgerError = RepositoryError::DailyLimitExceeded { limit: 2 }.into();
        assert_eq!(error.code(), "daily_limit_exceeded");
        assert_eq!(error.to_string(), "Daily limit of 2 reached");
    }
}
