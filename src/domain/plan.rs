//! Investment plan templates, read from the plan catalog.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentPlan {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub min_amount: BigDecimal,
    pub max_amount: BigDecimal,
    pub duration_days: i32,
    /// Total return over the whole duration, in percent.
    pub roi_percent: BigDecimal,
    pub is_active: bool,
}

impl InvestmentPlan {
    pub fn new(
        name: &str,
        min_amount: BigDecimal,
        max_amount: BigDecimal,
        duration_days: i32,
        roi_percent: BigDecimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            min_amount,
            max_amount,
            duration_days,
            roi_percent,
            is_active: true,
        }
    }

    pub fn accepts(&self, amount: &BigDecimal) -> bool {
        *amount >= self.min_amount && *amount <= self.max_amount
    }

    /// ROI percent earned per day.
    pub fn daily_roi(&self) -> BigDecimal {
        money::round_scale(
            &(self.roi_percent.clone() / BigDecimal::from(self.duration_days.max(1))),
            4,
        )
    }

    /// Profit `amount` would earn after `days`, capped at the plan duration.
    pub fn projected_profit(&self, amount: &BigDecimal, days: i32) -> BigDecimal {
        let days = days.clamp(0, self.duration_days);
        let total = amount * &self.roi_percent * BigDecimal::from(days)
            / (BigDecimal::from(100) * BigDecimal::from(self.duration_days.max(1)));
        money::round_cents(&total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> InvestmentPlan {
        InvestmentPlan::new(
            "Starter",
            BigDecimal::from(10),
            BigDecimal::from(1000),
            50,
            BigDecimal::from(100),
        )
    }

    #[test]
    fn test_accepts_bounds_inclusive() {
        let plan = plan();
        assert!(plan.accepts(&BigDecimal::from(10)));
        assert!(plan.accepts(&BigDecimal::from(1000)));
        assert!(!plan.accepts(&"9.99".parse().unwrap()));
        assert!(!plan.accepts(&"1000.01".parse().unwrap()));
    }

    #[test]
    fn test_projected_profit_caps_at_duration() {
        let plan = plan();
        let amount = BigDecimal::from(100);
        assert_eq!(plan.projected_profit(&amount, 10), "20.00".parse::<BigDecimal>().unwrap());
        assert_eq!(plan.projected_profit(&amount, 500), "100.00".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn test_daily_roi() {
        assert_eq!(plan().daily_roi(), "2".parse::<BigDecimal>().unwrap());
    }
}
