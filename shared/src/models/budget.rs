//! Category budget ceilings and the budget decision

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AmountOverflow, LinePricing};

/// Default warning threshold (percent of the ceiling) when none is configured
pub const DEFAULT_ALERT_THRESHOLD_PERCENT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// Configured monthly spend ceiling for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLimit {
    pub category: String,
    pub limit_amount: Decimal,
    pub alert_threshold_percent: Decimal,
}

/// Numbers behind a budget decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetDetails {
    pub category: String,
    pub requested_amount: Decimal,
    pub committed_amount: Decimal,
    pub limit_amount: Option<Decimal>,
    pub remaining_amount: Option<Decimal>,
    pub usage_percent: Option<Decimal>,
    pub should_alert: bool,
}

/// Allow/deny answer of the budget checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BudgetDetails>,
}

impl BudgetDecision {
    pub fn should_alert(&self) -> bool {
        self.details.as_ref().is_some_and(|d| d.should_alert)
    }
}

/// Decide whether `requested` more spend fits under the category ceiling.
///
/// Denies when committed plus requested exceeds the ceiling; flags an alert
/// when the projection reaches the warning threshold. Categories without a
/// ceiling are always allowed.
pub fn evaluate_budget(
    category: &str,
    limit: Option<&BudgetLimit>,
    committed: Decimal,
    requested: Decimal,
) -> BudgetDecision {
    let Some(limit) = limit else {
        return BudgetDecision {
            allowed: true,
            message: None,
            details: Some(BudgetDetails {
                category: category.to_string(),
                requested_amount: requested,
                committed_amount: committed,
                limit_amount: None,
                remaining_amount: None,
                usage_percent: None,
                should_alert: false,
            }),
        };
    };

    // Saturating sums stay above any real ceiling, so an overflow is a denial
    let projected = committed.saturating_add(requested);
    let remaining = limit.limit_amount.saturating_sub(committed);
    let usage_percent = if limit.limit_amount > Decimal::ZERO {
        projected
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_div(limit.limit_amount))
            .map(|percent| percent.round_dp(2))
    } else {
        None
    };
    let alert_at = limit
        .limit_amount
        .checked_mul(limit.alert_threshold_percent)
        .map(|scaled| scaled / Decimal::ONE_HUNDRED)
        .unwrap_or(limit.limit_amount);

    let allowed = projected <= limit.limit_amount;
    let should_alert = allowed && projected >= alert_at;

    let message = if !allowed {
        Some(format!(
            "Budget exceeded for category {}: requested {}, remaining {} of limit {}",
            category,
            requested,
            remaining.max(Decimal::ZERO),
            limit.limit_amount
        ))
    } else if should_alert {
        Some(format!(
            "Category {} budget usage at {}% of limit {}",
            category,
            usage_percent.unwrap_or(Decimal::ONE_HUNDRED),
            limit.limit_amount
        ))
    } else {
        None
    };

    BudgetDecision {
        allowed,
        message,
        details: Some(BudgetDetails {
            category: category.to_string(),
            requested_amount: requested,
            committed_amount: committed,
            limit_amount: Some(limit.limit_amount),
            remaining_amount: Some(remaining),
            usage_percent,
            should_alert,
        }),
    }
}

/// Sum line final prices per category (stable ordering by category name)
pub fn spend_by_category<'a, I>(lines: I) -> Result<BTreeMap<String, Decimal>, AmountOverflow>
where
    I: IntoIterator<Item = (&'a str, LinePricing)>,
{
    let mut totals = BTreeMap::new();
    for (category, pricing) in lines {
        let total = totals.entry(category.to_string()).or_insert(Decimal::ZERO);
        *total = total
            .checked_add(pricing.final_price)
            .ok_or(AmountOverflow("category spend"))?;
    }
    Ok(totals)
}
