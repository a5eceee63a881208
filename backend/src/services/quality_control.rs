//! QC validator for receipts and per-category requirement management

use std::collections::BTreeSet;

use serde::Deserialize;
use shared::{validate_qc, QcRequirement, QcSubmission, QcSummary};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::ProcurementSettings;
use crate::repository::TenantScope;
use crate::services::audit::{self, ENTITY_SETTINGS};

/// Quality control requirement service
#[derive(Clone)]
pub struct QualityControlService {
    db: PgPool,
}

/// One requirement as submitted by an administrator
#[derive(Debug, Deserialize, Validate)]
pub struct QcRequirementInput {
    /// Omit for the tenant-wide default
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    pub min_photos: u32,
    #[serde(default)]
    pub required_checkpoints: Vec<String>,
}

/// Strictest requirement covering every category in a receipt.
///
/// Category-specific entries and the tenant default are merged; the
/// settings' minimum photo count acts as a floor.
pub async fn requirement_for(
    conn: &mut PgConnection,
    scope: &TenantScope,
    settings: &ProcurementSettings,
    categories: &[String],
) -> AppResult<QcRequirement> {
    let configured = scope.qc_requirements_for(conn, categories).await?;
    let floor = QcRequirement {
        category: None,
        min_photos: u32::try_from(settings.qc_min_photos).unwrap_or_default(),
        required_checkpoints: Vec::new(),
    };
    Ok(QcRequirement::strictest(configured.iter().chain(std::iter::once(&floor))))
}

/// Hard gate run before any receipt write
pub fn enforce(requirement: &QcRequirement, submission: &QcSubmission) -> AppResult<QcSummary> {
    validate_qc(requirement, submission).map_err(AppError::QcRequirementsNotMet)
}

impl QualityControlService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_requirements(&self, scope: TenantScope) -> AppResult<Vec<QcRequirement>> {
        let mut conn = self.db.acquire().await?;
        scope.qc_requirements(&mut conn).await
    }

    /// Replace the tenant's requirement set
    pub async fn replace_requirements(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        inputs: Vec<QcRequirementInput>,
    ) -> AppResult<Vec<QcRequirement>> {
        let mut seen = BTreeSet::new();
        let mut requirements = Vec::with_capacity(inputs.len());
        for input in inputs {
            input.validate()?;
            let category = input.category.map(|c| c.trim().to_uppercase());
            if !seen.insert(category.clone()) {
                return Err(AppError::validation(
                    "category",
                    "Each category may only have one QC requirement",
                    "Setiap kategori hanya boleh memiliki satu persyaratan QC",
                ));
            }
            let checkpoints: BTreeSet<String> = input
                .required_checkpoints
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            requirements.push(QcRequirement {
                category,
                min_photos: input.min_photos,
                required_checkpoints: checkpoints.into_iter().collect(),
            });
        }

        let mut tx = self.db.begin().await?;
        let saved = scope.replace_qc_requirements(&mut tx, &requirements).await?;
        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "UPDATE_QC_REQUIREMENTS",
                    ENTITY_SETTINGS,
                    None,
                    format!("Replaced QC requirements ({} entries)", saved.len()),
                    serde_json::to_value(&saved).ok(),
                ),
            )
            .await?;
        tx.commit().await?;

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enforce_maps_violations() {
        let requirement = QcRequirement {
            category: None,
            min_photos: 2,
            required_checkpoints: Vec::new(),
        };
        let err = enforce(&requirement, &QcSubmission::default()).unwrap_err();
        match err {
            AppError::QcRequirementsNotMet(violations) => assert_eq!(violations.len(), 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_enforce_passes_without_requirement() {
        let summary = enforce(&QcRequirement::none(), &QcSubmission::default()).unwrap();
        assert_eq!(summary.photo_count, 0);
    }
}
