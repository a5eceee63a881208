//! Tenant procurement configuration: settings, approval levels, budgets and
//! QC requirements

use rust_decimal::Decimal;
use shared::{ApprovalLevel, QcRequirement};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use super::TenantScope;
use crate::error::AppResult;
use crate::models::{ApprovalLevelRow, BudgetRow, ProcurementSettings};

#[derive(Debug, FromRow)]
struct QcRequirementRow {
    category: Option<String>,
    min_photos: i32,
    required_checkpoints: Vec<String>,
}

impl From<QcRequirementRow> for QcRequirement {
    fn from(row: QcRequirementRow) -> Self {
        QcRequirement {
            category: row.category,
            min_photos: u32::try_from(row.min_photos).unwrap_or_default(),
            required_checkpoints: row.required_checkpoints,
        }
    }
}

impl TenantScope {
    // ========================================================================
    // Settings
    // ========================================================================

    /// Tenant settings, or the defaults when none were saved
    pub async fn settings(&self, conn: &mut PgConnection) -> AppResult<ProcurementSettings> {
        let row = sqlx::query_as::<_, ProcurementSettings>(
            r#"
            SELECT auto_approve_threshold, parallel_approval_threshold, default_payment_term,
                   notify_on_submit, notify_on_decision, notify_on_receive, qc_min_photos,
                   updated_by, updated_at
            FROM procurement_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(self.tenant_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.unwrap_or_default())
    }

    pub async fn upsert_settings(
        &self,
        conn: &mut PgConnection,
        settings: &ProcurementSettings,
        updated_by: Uuid,
    ) -> AppResult<ProcurementSettings> {
        let row = sqlx::query_as::<_, ProcurementSettings>(
            r#"
            INSERT INTO procurement_settings (
                tenant_id, auto_approve_threshold, parallel_approval_threshold,
                default_payment_term, notify_on_submit, notify_on_decision, notify_on_receive,
                qc_min_photos, updated_by, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (tenant_id) DO UPDATE SET
                auto_approve_threshold = EXCLUDED.auto_approve_threshold,
                parallel_approval_threshold = EXCLUDED.parallel_approval_threshold,
                default_payment_term = EXCLUDED.default_payment_term,
                notify_on_submit = EXCLUDED.notify_on_submit,
                notify_on_decision = EXCLUDED.notify_on_decision,
                notify_on_receive = EXCLUDED.notify_on_receive,
                qc_min_photos = EXCLUDED.qc_min_photos,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING auto_approve_threshold, parallel_approval_threshold, default_payment_term,
                      notify_on_submit, notify_on_decision, notify_on_receive, qc_min_photos,
                      updated_by, updated_at
            "#,
        )
        .bind(self.tenant_id)
        .bind(settings.auto_approve_threshold)
        .bind(settings.parallel_approval_threshold)
        .bind(&settings.default_payment_term)
        .bind(settings.notify_on_submit)
        .bind(settings.notify_on_decision)
        .bind(settings.notify_on_receive)
        .bind(settings.qc_min_photos)
        .bind(updated_by)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }

    // ========================================================================
    // Approval levels
    // ========================================================================

    pub async fn approval_levels(&self, conn: &mut PgConnection) -> AppResult<Vec<ApprovalLevel>> {
        let rows = sqlx::query_as::<_, ApprovalLevelRow>(
            r#"
            SELECT level, level_name, min_amount, max_amount, required_role, is_active
            FROM approval_levels
            WHERE tenant_id = $1
            ORDER BY level
            "#,
        )
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(ApprovalLevel::from).collect())
    }

    /// Replace the tenant's approval level table
    pub async fn replace_approval_levels(
        &self,
        conn: &mut PgConnection,
        levels: &[ApprovalLevel],
    ) -> AppResult<Vec<ApprovalLevel>> {
        sqlx::query("DELETE FROM approval_levels WHERE tenant_id = $1")
            .bind(self.tenant_id)
            .execute(&mut *conn)
            .await?;

        for level in levels {
            sqlx::query(
                r#"
                INSERT INTO approval_levels (
                    tenant_id, level, level_name, min_amount, max_amount, required_role, is_active
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(self.tenant_id)
            .bind(level.level)
            .bind(level.level_name.trim())
            .bind(level.min_amount)
            .bind(level.max_amount)
            .bind(level.required_role)
            .bind(level.is_active)
            .execute(&mut *conn)
            .await?;
        }

        self.approval_levels(conn).await
    }

    // ========================================================================
    // Budgets
    // ========================================================================

    pub async fn budgets(&self, conn: &mut PgConnection, year: i32, month: i32) -> AppResult<Vec<BudgetRow>> {
        let rows = sqlx::query_as::<_, BudgetRow>(
            r#"
            SELECT id, category, period_year, period_month, limit_amount,
                   alert_threshold_percent, updated_at
            FROM procurement_budgets
            WHERE tenant_id = $1 AND period_year = $2 AND period_month = $3
            ORDER BY category
            "#,
        )
        .bind(self.tenant_id)
        .bind(year)
        .bind(month)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Row-lock a category ceiling so concurrent checks against it serialize
    pub async fn lock_budget(
        &self,
        conn: &mut PgConnection,
        category: &str,
        year: i32,
        month: i32,
    ) -> AppResult<Option<BudgetRow>> {
        let row = sqlx::query_as::<_, BudgetRow>(
            r#"
            SELECT id, category, period_year, period_month, limit_amount,
                   alert_threshold_percent, updated_at
            FROM procurement_budgets
            WHERE tenant_id = $1 AND category = $2 AND period_year = $3 AND period_month = $4
            FOR UPDATE
            "#,
        )
        .bind(self.tenant_id)
        .bind(category)
        .bind(year)
        .bind(month)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_budget(
        &self,
        conn: &mut PgConnection,
        category: &str,
        year: i32,
        month: i32,
        limit_amount: Decimal,
        alert_threshold_percent: Decimal,
        updated_by: Uuid,
    ) -> AppResult<BudgetRow> {
        let row = sqlx::query_as::<_, BudgetRow>(
            r#"
            INSERT INTO procurement_budgets (
                tenant_id, category, period_year, period_month, limit_amount,
                alert_threshold_percent, updated_by, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (tenant_id, category, period_year, period_month) DO UPDATE SET
                limit_amount = EXCLUDED.limit_amount,
                alert_threshold_percent = EXCLUDED.alert_threshold_percent,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING id, category, period_year, period_month, limit_amount,
                      alert_threshold_percent, updated_at
            "#,
        )
        .bind(self.tenant_id)
        .bind(category)
        .bind(year)
        .bind(month)
        .bind(limit_amount)
        .bind(alert_threshold_percent)
        .bind(updated_by)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }

    // ========================================================================
    // QC requirements
    // ========================================================================

    pub async fn qc_requirements(&self, conn: &mut PgConnection) -> AppResult<Vec<QcRequirement>> {
        let rows = sqlx::query_as::<_, QcRequirementRow>(
            r#"
            SELECT category, min_photos, required_checkpoints
            FROM qc_requirements
            WHERE tenant_id = $1
            ORDER BY category NULLS FIRST
            "#,
        )
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(QcRequirement::from).collect())
    }

    /// Requirements that apply to the given categories, including the
    /// tenant-wide default entry
    pub async fn qc_requirements_for(
        &self,
        conn: &mut PgConnection,
        categories: &[String],
    ) -> AppResult<Vec<QcRequirement>> {
        let rows = sqlx::query_as::<_, QcRequirementRow>(
            r#"
            SELECT category, min_photos, required_checkpoints
            FROM qc_requirements
            WHERE tenant_id = $1 AND (category IS NULL OR category = ANY($2))
            "#,
        )
        .bind(self.tenant_id)
        .bind(categories)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(QcRequirement::from).collect())
    }

    pub async fn replace_qc_requirements(
        &self,
        conn: &mut PgConnection,
        requirements: &[QcRequirement],
    ) -> AppResult<Vec<QcRequirement>> {
        sqlx::query("DELETE FROM qc_requirements WHERE tenant_id = $1")
            .bind(self.tenant_id)
            .execute(&mut *conn)
            .await?;

        for requirement in requirements {
            sqlx::query(
                r#"
                INSERT INTO qc_requirements (tenant_id, category, min_photos, required_checkpoints)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(self.tenant_id)
            .bind(&requirement.category)
            .bind(i32::try_from(requirement.min_photos).unwrap_or(i32::MAX))
            .bind(&requirement.required_checkpoints)
            .execute(&mut *conn)
            .await?;
        }

        self.qc_requirements(conn).await
    }
}
