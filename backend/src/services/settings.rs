//! Procurement settings and approval level management

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{validate_approval_levels, ApprovalLevel};
use sqlx::PgPool;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::ProcurementSettings;
use crate::repository::TenantScope;
use crate::services::audit::{self, ENTITY_SETTINGS};

/// Settings service
#[derive(Clone)]
pub struct SettingsService {
    db: PgPool,
}

/// Settings together with the approval level table
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    #[serde(flatten)]
    pub settings: ProcurementSettings,
    pub approval_levels: Vec<ApprovalLevel>,
}

/// Full replacement of the tenant's procurement settings
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsInput {
    pub auto_approve_threshold: Option<Decimal>,
    pub parallel_approval_threshold: Option<Decimal>,
    #[validate(length(max = 40))]
    pub default_payment_term: Option<String>,
    #[serde(default = "default_true")]
    pub notify_on_submit: bool,
    #[serde(default = "default_true")]
    pub notify_on_decision: bool,
    #[serde(default = "default_true")]
    pub notify_on_receive: bool,
    #[serde(default)]
    pub qc_min_photos: u32,
    #[serde(default)]
    pub approval_levels: Vec<ApprovalLevel>,
}

fn default_true() -> bool {
    true
}

impl UpdateSettingsInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        for (field, value) in [
            ("auto_approve_threshold", self.auto_approve_threshold),
            ("parallel_approval_threshold", self.parallel_approval_threshold),
        ] {
            if value.is_some_and(|v| v < Decimal::ZERO) {
                return Err(AppError::validation(
                    field,
                    "Threshold cannot be negative",
                    "Ambang batas tidak boleh negatif",
                ));
            }
        }
        validate_approval_levels(&self.approval_levels).map_err(|message| AppError::Validation {
            field: "approval_levels".to_string(),
            message,
            message_ind: "Tingkat persetujuan tidak valid".to_string(),
        })
    }
}

impl SettingsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, scope: TenantScope) -> AppResult<SettingsView> {
        let mut conn = self.db.acquire().await?;
        let settings = scope.settings(&mut conn).await?;
        let approval_levels = scope.approval_levels(&mut conn).await?;
        Ok(SettingsView {
            settings,
            approval_levels,
        })
    }

    /// Replace settings and approval levels atomically
    pub async fn update(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        input: UpdateSettingsInput,
    ) -> AppResult<SettingsView> {
        input.check()?;

        let desired = ProcurementSettings {
            auto_approve_threshold: input.auto_approve_threshold,
            parallel_approval_threshold: input.parallel_approval_threshold,
            default_payment_term: input
                .default_payment_term
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            notify_on_submit: input.notify_on_submit,
            notify_on_decision: input.notify_on_decision,
            notify_on_receive: input.notify_on_receive,
            qc_min_photos: i32::try_from(input.qc_min_photos).unwrap_or(i32::MAX),
            updated_by: Some(user.user_id),
            updated_at: None,
        };

        let mut tx = self.db.begin().await?;
        let settings = scope.upsert_settings(&mut tx, &desired, user.user_id).await?;
        let approval_levels = scope
            .replace_approval_levels(&mut tx, &input.approval_levels)
            .await?;
        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "UPDATE_SETTINGS",
                    ENTITY_SETTINGS,
                    None,
                    format!(
                        "Updated procurement settings with {} approval level(s)",
                        approval_levels.len()
                    ),
                    serde_json::to_value(&approval_levels).ok(),
                ),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(tenant_id = %scope.tenant_id(), "Procurement settings updated");

        Ok(SettingsView {
            settings,
            approval_levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::UserRole;

    fn input(levels: Vec<ApprovalLevel>) -> UpdateSettingsInput {
        UpdateSettingsInput {
            auto_approve_threshold: Some(Decimal::from(100_000)),
            parallel_approval_threshold: None,
            default_payment_term: None,
            notify_on_submit: true,
            notify_on_decision: true,
            notify_on_receive: true,
            qc_min_photos: 1,
            approval_levels: levels,
        }
    }

    fn level(level: i32, min: i64, max: Option<i64>) -> ApprovalLevel {
        ApprovalLevel {
            level,
            level_name: format!("Level {}", level),
            min_amount: Decimal::from(min),
            max_amount: max.map(Decimal::from),
            required_role: UserRole::SppgKepala,
            is_active: true,
        }
    }

    #[test]
    fn test_valid_settings_pass() {
        let levels = vec![level(1, 0, Some(1_000_000)), level(2, 1_000_000, None)];
        assert!(input(levels).check().is_ok());
    }

    #[test]
    fn test_duplicate_level_rejected() {
        let levels = vec![level(1, 0, Some(1_000_000)), level(1, 1_000_000, None)];
        assert!(matches!(input(levels).check(), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut settings = input(Vec::new());
        settings.auto_approve_threshold = Some(Decimal::from(-1));
        assert!(settings.check().is_err());
    }
}
