//! Multi-level referral commissions.
//!
//! An investment pays a percentage of its amount to each of up to three
//! ancestors in the investor's referral chain. Commissions are posted as
//! pending `referral_bonus` transactions and reach the wallet only when
//! the beneficiary claims them.

use bigdecimal::BigDecimal;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MAX_COMMISSION_LEVELS;
use crate::domain::{money, DomainEvent, Investment, Transaction, TransactionType};
use crate::error::LedgerError;
use crate::ports::{ClaimOutcome, LedgerStore, Posting, ReferralGraph, RepositoryResult};
use crate::services::events::EventEmitter;
use crate::services::ledger::{NewTransaction, TransactionLedger};

#[derive(Debug, Clone, PartialEq)]
pub struct CommissionEntry {
    pub beneficiary_id: Uuid,
    /// 1 for the immediate referrer.
    pub level: u8,
    pub rate: BigDecimal,
    pub amount: BigDecimal,
}

/// Pairs each ancestor with its level rate. Missing levels pay nothing and
/// their share is not redistributed.
pub fn calculate_commissions(
    chain: &[Uuid],
    amount: &BigDecimal,
    rates: &[BigDecimal],
) -> Vec<CommissionEntry> {
    chain
        .iter()
        .zip(rates)
        .take(MAX_COMMISSION_LEVELS)
        .enumerate()
        .map(|(index, (beneficiary_id, rate))| CommissionEntry {
            beneficiary_id: *beneficiary_id,
            level: index as u8 + 1,
            rate: rate.clone(),
            amount: money::percent_of(amount, rate),
        })
        .filter(|entry| entry.amount >= money::min_transaction_amount())
        .collect()
}

/// Walks `referrer_of` upward from the investor, at most `max_levels` steps.
/// Stops at the first missing ancestor or at any user already visited.
pub async fn resolve_chain(
    graph: &dyn ReferralGraph,
    investor: Uuid,
    max_levels: usize,
) -> RepositoryResult<Vec<Uuid>> {
    let mut chain = Vec::with_capacity(max_levels);
    let mut current = investor;
    for _ in 0..max_levels {
        match graph.referrer_of(current).await? {
            Some(parent) if parent != investor && !chain.contains(&parent) => {
                chain.push(parent);
                current = parent;
            }
            _ => break,
        }
    }
    Ok(chain)
}

/// Deterministic per investment and level, so a retried distribution dedupes.
pub fn commission_reference(investment_id: Uuid, level: u8) -> String {
    format!("BON{}L{}", investment_id.simple(), level).to_uppercase()
}

pub struct CommissionService {
    store: Arc<dyn LedgerStore>,
    graph: Arc<dyn ReferralGraph>,
    ledger: Arc<TransactionLedger>,
    events: EventEmitter,
    rates: Vec<BigDecimal>,
}

impl CommissionService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        graph: Arc<dyn ReferralGraph>,
        ledger: Arc<TransactionLedger>,
        events: EventEmitter,
        rates: Vec<BigDecimal>,
    ) -> Self {
        Self {
            store,
            graph,
            ledger,
            events,
            rates,
        }
    }

    /// Posts the pending commissions for a freshly funded investment.
    ///
    /// Best effort: a failing level is logged and skipped, and nothing here
    /// can fail the investment itself. Returns the bonuses that were posted.
    pub async fn distribute(&self, investment: &Investment) -> Vec<Transaction> {
        let levels = self.rates.len().min(MAX_COMMISSION_LEVELS);
        let chain = match resolve_chain(self.graph.as_ref(), investment.user_id, levels).await {
            Ok(chain) => chain,
            Err(e) => {
                tracing::warn!(
                    "Could not resolve referral chain for investment {}: {}",
                    investment.id,
                    e
                );
                return Vec::new();
            }
        };

        let entries = calculate_commissions(&chain, &investment.amount, &self.rates);
        if entries.is_empty() {
            tracing::debug!("Investment {} has no referrers to pay", investment.id);
            return Vec::new();
        }

        let results = join_all(entries.iter().map(|entry| self.post_commission(investment, entry))).await;

        results
            .into_iter()
            .zip(entries.iter())
            .filter_map(|(result, entry)| match result {
                Ok(tx) => Some(tx),
                Err(e) => {
                    tracing::warn!(
                        "Level {} commission for investment {} to user {} failed: {}",
                        entry.level,
                        investment.id,
                        entry.beneficiary_id,
                        e
                    );
                    None
                }
            })
            .collect()
    }

    async fn post_commission(
        &self,
        investment: &Investment,
        entry: &CommissionEntry,
    ) -> Result<Transaction, LedgerError> {
        let draft = self.ledger.draft(
            NewTransaction::new(entry.beneficiary_id, TransactionType::ReferralBonus, entry.amount.clone())
                .with_investment(investment.id)
                .with_reference(Some(commission_reference(investment.id, entry.level)))
                .with_description(format!("Level {} referral bonus", entry.level))
                .with_metadata(serde_json::json!({
                    "level": entry.level,
                    "rate": entry.rate.to_string(),
                    "referred_user_id": investment.user_id,
                    "investment_amount": investment.amount.to_string(),
                })),
        )?;

        let outcome = self.ledger.apply_to_wallet(Posting::new(draft)).await?;
        let tx = outcome.transaction;
        if !outcome.replayed {
            self.events.emit(DomainEvent::ReferralBonusEarned {
                transaction_id: tx.id,
                beneficiary_id: entry.beneficiary_id,
                referred_user_id: investment.user_id,
                level: entry.level,
                amount: tx.amount.clone(),
                at: tx.created_at,
            });
        }
        Ok(tx)
    }

    /// Credits every pending bonus of the user in a single wallet write.
    pub async fn claim(&self, user_id: Uuid) -> Result<ClaimOutcome, LedgerError> {
        let now = Utc::now();
        let outcome = self
            .store
            .claim_pending(user_id, TransactionType::ReferralBonus, now)
            .await?
            .ok_or(LedgerError::NothingToClaim)?;

        tracing::info!(
            "User {} claimed {} referral bonus(es) totalling {}, balance {}",
            user_id,
            outcome.count,
            outcome.amount,
            outcome.balance
        );
        self.events.emit(DomainEvent::ReferralBonusClaimed {
            user_id,
            amount: outcome.amount.clone(),
            count: outcome.count,
            at: now,
        });
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn default_rates() -> Vec<BigDecimal> {
        vec![dec("7"), dec("3"), dec("1")]
    }

    struct FakeGraph(HashMap<Uuid, Uuid>);

    #[async_trait]
    impl ReferralGraph for FakeGraph {
        async fn referrer_of(&self, user_id: Uuid) -> RepositoryResult<Option<Uuid>> {
            Ok(self.0.get(&user_id).copied())
        }
    }

    #[test]
    fn test_three_levels() {
        let chain: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let entries = calculate_commissions(&chain, &dec("1000"), &default_rates());
        let amounts: Vec<BigDecimal> = entries.iter().map(|e| e.amount.clone()).collect();
        assert_eq!(amounts, vec![dec("70"), dec("30"), dec("10")]);
        assert_eq!(entries[2].level, 3);
        assert_eq!(entries[0].beneficiary_id, chain[0]);
    }

    #[test]
    fn test_short_chain_pays_only_existing_levels() {
        let chain = vec![Uuid::new_v4(), Uuid::new_v4()];
        let entries = calculate_commissions(&chain, &dec("200"), &default_rates());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount, dec("14"));
        assert_eq!(entries[1].amount, dec("6"));
        assert!(calculate_commissions(&[], &dec("200"), &default_rates()).is_empty());
    }

    #[test]
    fn test_extra_rates_are_capped() {
        let chain: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let rates = vec![dec("5"); 5];
        assert_eq!(calculate_commissions(&chain, &dec("100"), &rates).len(), 3);
    }

    #[test]
    fn test_commission_reference_is_stable() {
        let id = Uuid::new_v4();
        assert_eq!(commission_reference(id, 1), commission_reference(id, 1));
        assert_ne!(commission_reference(id, 1), commission_reference(id, 2));
        assert!(commission_reference(id, 2).starts_with("BON"));
        assert!(commission_reference(id, 2).ends_with("L2"));
    }

    #[tokio::test]
    async fn test_resolve_chain_is_bounded() {
        let users: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let edges = users.windows(2).map(|pair| (pair[0], pair[1])).collect();
        let chain = resolve_chain(&FakeGraph(edges), users[0], 3).await.unwrap();
        assert_eq!(chain, users[1..4].to_vec());
    }

    #[tokio::test]
    async fn test_resolve_chain_stops_on_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let graph = FakeGraph(HashMap::from([(a, b), (b, a)]));
        assert_eq!(resolve_chain(&graph, a, 3).await.unwrap(), vec![b]);
    }
}
