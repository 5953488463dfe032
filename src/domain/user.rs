//! User and wallet entities.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::money;
use crate::domain::transaction::to_base36;
use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Embedded wallet. The balance is only ever changed by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: BigDecimal,
    pub currency: String,
}

impl Wallet {
    pub fn empty(currency: &str) -> Self {
        Self {
            balance: money::zero(),
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub referral_code: String,
    /// Set once at registration.
    pub referred_by: Option<Uuid>,
    pub role: Role,
    pub wallet: Wallet,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(display_name: String, referred_by: Option<Uuid>, role: Role, currency: &str) -> Self {
        let now = Utc::now();
        let referral_code = generate_referral_code(&display_name, now);
        Self {
            id: Uuid::new_v4(),
            display_name,
            referral_code,
            referred_by,
            role,
            wallet: Wallet::empty(currency),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Two letters of the name, the base36 timestamp and a random tail.
pub fn generate_referral_code(display_name: &str, at: DateTime<Utc>) -> String {
    let initials: String = display_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(2)
        .collect();
    let random = to_base36(Uuid::new_v4().as_u128());
    let tail: String = random.chars().take(5).collect();
    format!(
        "{}{}{}",
        initials,
        to_base36(at.timestamp_millis().max(0) as u128),
        tail
    )
    .to_uppercase()
}

/// Authenticated caller, as supplied by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn require_admin(&self) -> Result<(), LedgerError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized(format!(
                "user {} with role {} cannot perform admin operations",
                self.user_id, self.role
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_with_empty_wallet() {
        let user = User::new("Ada".to_string(), None, Role::User, "USD");
        assert_eq!(user.wallet.balance, BigDecimal::from(0));
        assert_eq!(user.wallet.currency, "USD");
        assert!(user.referred_by.is_none());
    }

    #[test]
    fn test_referral_code_shape() {
        let code = generate_referral_code("ada lovelace", Utc::now());
        assert!(code.starts_with("AD"));
        assert_eq!(code, code.to_uppercase());
        assert!(code.len() > 7);
    }

    #[test]
    fn test_only_admin_passes_admin_gate() {
        let id = Uuid::new_v4();
        assert!(Actor::admin(id).require_admin().is_ok());
        assert!(Actor::new(id, Role::Moderator).require_admin().is_err());
        assert!(Actor::new(id, Role::User).require_admin().is_err());
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::User, Role::Admin, Role::Moderator] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }
}
