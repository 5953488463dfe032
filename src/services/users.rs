use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{money, Role, TransactionStatus, TransactionType, User, Wallet};
use crate::error::LedgerError;
use crate::ports::{LedgerStore, ReferrerRank, RepositoryError, TransactionFilter};

/// Registration attempts before giving up on a colliding referral code.
const REFERRAL_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ReferralSummary {
    pub direct_referrals: i64,
    pub pending_bonus: BigDecimal,
    pub pending_count: usize,
    pub claimed_bonus: BigDecimal,
    pub claimed_count: usize,
}

/// A direct referral and the users they referred in turn.
#[derive(Debug, Clone)]
pub struct ReferralNode {
    pub user: User,
    pub level: u32,
    pub referrals: Vec<User>,
}

/// Users, wallets and the referral edges between them.
pub struct UserDirectory {
    store: Arc<dyn LedgerStore>,
    currency: String,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn LedgerStore>, currency: &str) -> Self {
        Self {
            store,
            currency: currency.to_string(),
        }
    }

    /// Creates a user with an empty wallet. The referrer is fixed here and
    /// never changes afterwards.
    pub async fn register(
        &self,
        display_name: &str,
        referred_by: Option<Uuid>,
        role: Role,
    ) -> Result<User, LedgerError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(LedgerError::InvalidState("display name is required".to_string()));
        }
        if let Some(referrer) = referred_by {
            self.store.get_user(referrer).await?;
        }

        let mut attempt = 1;
        loop {
            let user = User::new(display_name.to_string(), referred_by, role, &self.currency);
            match self.store.insert_user(&user).await {
                Ok(user) => {
                    tracing::info!(
                        "Registered user {} with referral code {}",
                        user.id,
                        user.referral_code
                    );
                    return Ok(user);
                }
                Err(RepositoryError::Duplicate(what)) if attempt < REFERRAL_CODE_ATTEMPTS => {
                    tracing::debug!("Referral code collision ({}), regenerating", what);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Registers a user under the owner of `code`.
    pub async fn register_with_code(
        &self,
        display_name: &str,
        code: &str,
        role: Role,
    ) -> Result<User, LedgerError> {
        let referrer = self
            .find_by_referral_code(code)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("referral code {}", code)))?;
        self.register(display_name, Some(referrer.id), role).await
    }

    pub async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, LedgerError> {
        Ok(self.store.find_user_by_referral_code(code.trim()).await?)
    }

    pub async fn get(&self, user_id: Uuid) -> Result<User, LedgerError> {
        Ok(self.store.get_user(user_id).await?)
    }

    pub async fn wallet(&self, user_id: Uuid) -> Result<Wallet, LedgerError> {
        Ok(self.store.get_user(user_id).await?.wallet)
    }

    pub async fn referral_summary(&self, user_id: Uuid) -> Result<ReferralSummary, LedgerError> {
        let direct_referrals = self.store.count_referrals(user_id).await?;
        let bonuses = self
            .store
            .list_transactions(&TransactionFilter::for_user(user_id).of_type(TransactionType::ReferralBonus))
            .await?;

        let mut summary = ReferralSummary {
            direct_referrals,
            pending_bonus: money::zero(),
            pending_count: 0,
            claimed_bonus: money::zero(),
            claimed_count: 0,
        };
        for bonus in bonuses {
            match bonus.status {
                TransactionStatus::Pending => {
                    summary.pending_bonus = &summary.pending_bonus + &bonus.net_amount;
                    summary.pending_count += 1;
                }
                TransactionStatus::Completed => {
                    summary.claimed_bonus = &summary.claimed_bonus + &bonus.net_amount;
                    summary.claimed_count += 1;
                }
                _ => {}
            }
        }
        Ok(summary)
    }

    /// Two levels of the downline under `user_id`.
    pub async fn referral_network(&self, user_id: Uuid) -> Result<Vec<ReferralNode>, LedgerError> {
        self.store.get_user(user_id).await?;
        let direct = self.store.list_referrals(user_id).await?;

        let mut network = Vec::with_capacity(direct.len());
        for user in direct {
            let referrals = self.store.list_referrals(user.id).await?;
            network.push(ReferralNode {
                user,
                level: 1,
                referrals,
            });
        }
        Ok(network)
    }

    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<ReferrerRank>, LedgerError> {
        Ok(self.store.top_referrers(limit).await?)
    }
}
