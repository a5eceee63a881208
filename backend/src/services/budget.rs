//! Budget checker and monthly category ceiling management

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{evaluate_budget, BudgetDecision, BudgetLimit, DEFAULT_ALERT_THRESHOLD_PERCENT};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::BudgetRow;
use crate::repository::TenantScope;
use crate::services::audit::{self, ENTITY_BUDGET, ENTITY_ORDER};

/// Budget service for category ceilings
#[derive(Clone)]
pub struct BudgetService {
    db: PgPool,
}

/// Calendar month a budget applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetPeriod {
    pub year: i32,
    pub month: u32,
}

impl BudgetPeriod {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn new(year: i32, month: u32) -> AppResult<Self> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(AppError::validation(
                "period_month",
                "Budget month must be between 1 and 12",
                "Bulan anggaran harus antara 1 dan 12",
            ));
        }
        Ok(Self { year, month })
    }

    /// Half-open date range `[first day, first day of next month)`
    pub fn bounds(&self) -> AppResult<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_ymd_opt(self.year, self.month, 1);
        let end = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        match (start, end) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(AppError::Internal(format!(
                "Invalid budget period {}-{}",
                self.year, self.month
            ))),
        }
    }

    fn month_i32(&self) -> i32 {
        i32::try_from(self.month).unwrap_or(1)
    }
}

/// Budget ceiling with its current usage
#[derive(Debug, Clone, Serialize)]
pub struct BudgetUsage {
    #[serde(flatten)]
    pub budget: BudgetRow,
    pub committed_amount: Decimal,
    pub remaining_amount: Decimal,
    pub usage_percent: Option<Decimal>,
}

/// Query for listing budgets
#[derive(Debug, Deserialize)]
pub struct BudgetPeriodQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Input for setting one category ceiling
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertBudgetInput {
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    pub period_year: i32,
    pub period_month: u32,
    pub limit_amount: Decimal,
    pub alert_threshold_percent: Option<Decimal>,
}

/// Input for a dry-run budget check
#[derive(Debug, Deserialize, Validate)]
pub struct BudgetCheckInput {
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    pub amount: Decimal,
    pub order_date: Option<NaiveDate>,
}

fn normalize_category(category: &str) -> String {
    category.trim().to_uppercase()
}

fn limit_from_row(row: &BudgetRow) -> BudgetLimit {
    BudgetLimit {
        category: row.category.clone(),
        limit_amount: row.limit_amount,
        alert_threshold_percent: row.alert_threshold_percent,
    }
}

/// Evaluate one category inside the caller's transaction. The ceiling row is
/// locked so two orders cannot both squeeze under the same remaining amount.
pub async fn check_category(
    conn: &mut PgConnection,
    scope: &TenantScope,
    period: BudgetPeriod,
    category: &str,
    requested: Decimal,
    exclude_order: Option<Uuid>,
) -> AppResult<BudgetDecision> {
    let (from, to) = period.bounds()?;
    let budget = scope
        .lock_budget(conn, category, period.year, period.month_i32())
        .await?;
    let committed = scope
        .committed_spend(conn, category, from, to, exclude_order)
        .await?;

    let limit = budget.as_ref().map(limit_from_row);
    Ok(evaluate_budget(category, limit.as_ref(), committed, requested))
}

/// Budget gate for an order: every category must fit under its ceiling.
///
/// Returns the decisions that crossed the warning threshold; those are
/// recorded as audit alerts and never block.
pub async fn enforce(
    conn: &mut PgConnection,
    scope: &TenantScope,
    user: &AuthUser,
    order_date: NaiveDate,
    spend: &BTreeMap<String, Decimal>,
    order_id: Option<Uuid>,
) -> AppResult<Vec<BudgetDecision>> {
    let period = BudgetPeriod::of(order_date);
    let mut alerts = Vec::new();

    for (category, requested) in spend {
        let decision = check_category(conn, scope, period, category, *requested, order_id).await?;
        if !decision.allowed {
            tracing::info!(
                tenant_id = %scope.tenant_id(),
                category = %category,
                requested = %requested,
                "Order blocked by category budget"
            );
            return Err(AppError::BudgetExceeded(decision));
        }
        if decision.should_alert() {
            alerts.push(decision);
        }
    }

    for alert in &alerts {
        let message = alert
            .message
            .clone()
            .unwrap_or_else(|| "Category budget nearing its limit".to_string());
        tracing::warn!(tenant_id = %scope.tenant_id(), "{}", message);
        scope
            .record_audit(
                conn,
                &audit::entry(
                    user,
                    "BUDGET_ALERT",
                    ENTITY_ORDER,
                    order_id,
                    message,
                    serde_json::to_value(&alert.details).ok(),
                ),
            )
            .await?;
    }

    Ok(alerts)
}

impl BudgetService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Ceilings for a month together with the spend committed against them
    pub async fn list(&self, scope: TenantScope, query: BudgetPeriodQuery) -> AppResult<Vec<BudgetUsage>> {
        let today = Utc::now().date_naive();
        let period = BudgetPeriod::new(
            query.year.unwrap_or_else(|| today.year()),
            query.month.unwrap_or_else(|| today.month()),
        )?;
        let (from, to) = period.bounds()?;

        let mut conn = self.db.acquire().await?;
        let rows = scope.budgets(&mut conn, period.year, period.month_i32()).await?;

        let mut usage = Vec::with_capacity(rows.len());
        for budget in rows {
            let committed = scope
                .committed_spend(&mut conn, &budget.category, from, to, None)
                .await?;
            let usage_percent = if budget.limit_amount > Decimal::ZERO {
                committed
                    .checked_mul(Decimal::ONE_HUNDRED)
                    .and_then(|scaled| scaled.checked_div(budget.limit_amount))
                    .map(|percent| percent.round_dp(2))
            } else {
                None
            };
            usage.push(BudgetUsage {
                remaining_amount: budget.limit_amount.saturating_sub(committed),
                committed_amount: committed,
                usage_percent,
                budget,
            });
        }

        Ok(usage)
    }

    /// Set several category ceilings in one transaction
    pub async fn upsert(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        inputs: Vec<UpsertBudgetInput>,
    ) -> AppResult<Vec<BudgetRow>> {
        for input in &inputs {
            input.validate()?;
            BudgetPeriod::new(input.period_year, input.period_month)?;
            if input.limit_amount < Decimal::ZERO {
                return Err(AppError::validation(
                    "limit_amount",
                    "Budget limit cannot be negative",
                    "Batas anggaran tidak boleh negatif",
                ));
            }
            if let Some(threshold) = input.alert_threshold_percent {
                if threshold <= Decimal::ZERO || threshold > Decimal::ONE_HUNDRED {
                    return Err(AppError::validation(
                        "alert_threshold_percent",
                        "Alert threshold must be between 0 and 100 percent",
                        "Ambang peringatan harus antara 0 dan 100 persen",
                    ));
                }
            }
        }

        let mut tx = self.db.begin().await?;
        let mut saved = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let row = scope
                .upsert_budget(
                    &mut tx,
                    &normalize_category(&input.category),
                    input.period_year,
                    i32::try_from(input.period_month).unwrap_or(1),
                    input.limit_amount,
                    input
                        .alert_threshold_percent
                        .unwrap_or(DEFAULT_ALERT_THRESHOLD_PERCENT),
                    user.user_id,
                )
                .await?;
            saved.push(row);
        }

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "UPDATE",
                    ENTITY_BUDGET,
                    None,
                    format!("Updated {} category budget(s)", saved.len()),
                    serde_json::to_value(&saved).ok(),
                ),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(tenant_id = %scope.tenant_id(), count = saved.len(), "Budgets updated");
        Ok(saved)
    }

    /// Dry-run the budget checker without writing anything
    pub async fn check(&self, scope: TenantScope, input: BudgetCheckInput) -> AppResult<BudgetDecision> {
        input.validate()?;
        if input.amount < Decimal::ZERO {
            return Err(AppError::validation(
                "amount",
                "Amount cannot be negative",
                "Jumlah tidak boleh negatif",
            ));
        }

        let period = BudgetPeriod::of(input.order_date.unwrap_or_else(|| Utc::now().date_naive()));
        // Read-only transaction so the ceiling lock is released at the end
        let mut tx = self.db.begin().await?;
        let decision = check_category(
            &mut tx,
            &scope,
            period,
            &normalize_category(&input.category),
            input.amount,
            None,
        )
        .await?;
        tx.rollback().await?;

        Ok(decision)
    }
}
