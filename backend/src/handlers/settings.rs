//! Procurement configuration handlers: settings, budgets and QC requirements

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use shared::{BudgetDecision, ProcurementAction, QcRequirement};

use super::ApiResponse;
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::BudgetRow;
use crate::repository::TenantScope;
use crate::services::budget::{BudgetCheckInput, BudgetPeriodQuery, BudgetUsage, UpsertBudgetInput};
use crate::services::quality_control::QcRequirementInput;
use crate::services::settings::{SettingsView, UpdateSettingsInput};
use crate::services::{BudgetService, QualityControlService, SettingsService};
use crate::AppState;

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<SettingsView>>> {
    user.require(ProcurementAction::View)?;
    let settings = SettingsService::new(state.db.clone())
        .get(TenantScope::new(&user))
        .await?;
    Ok(Json(ApiResponse::new(settings)))
}

/// Replace settings and approval levels
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<UpdateSettingsInput>,
) -> AppResult<Json<ApiResponse<SettingsView>>> {
    user.require(ProcurementAction::ManageSettings)?;
    let settings = SettingsService::new(state.db.clone())
        .update(TenantScope::new(&user), &user, input)
        .await?;
    Ok(Json(ApiResponse::new(settings)))
}

/// Category ceilings for a month with their usage
pub async fn list_budgets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<BudgetPeriodQuery>,
) -> AppResult<Json<ApiResponse<Vec<BudgetUsage>>>> {
    user.require(ProcurementAction::View)?;
    let budgets = BudgetService::new(state.db.clone())
        .list(TenantScope::new(&user), query)
        .await?;
    Ok(Json(ApiResponse::new(budgets)))
}

pub async fn upsert_budgets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<Vec<UpsertBudgetInput>>,
) -> AppResult<Json<ApiResponse<Vec<BudgetRow>>>> {
    user.require(ProcurementAction::ManageSettings)?;
    let budgets = BudgetService::new(state.db.clone())
        .upsert(TenantScope::new(&user), &user, input)
        .await?;
    Ok(Json(ApiResponse::new(budgets)))
}

/// Dry-run the budget checker
pub async fn check_budget(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<BudgetCheckInput>,
) -> AppResult<Json<ApiResponse<BudgetDecision>>> {
    user.require(ProcurementAction::View)?;
    let decision = BudgetService::new(state.db.clone())
        .check(TenantScope::new(&user), input)
        .await?;
    Ok(Json(ApiResponse::new(decision)))
}

pub async fn list_qc_requirements(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<Vec<QcRequirement>>>> {
    user.require(ProcurementAction::View)?;
    let requirements = QualityControlService::new(state.db.clone())
        .list_requirements(TenantScope::new(&user))
        .await?;
    Ok(Json(ApiResponse::new(requirements)))
}

pub async fn replace_qc_requirements(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<Vec<QcRequirementInput>>,
) -> AppResult<Json<ApiResponse<Vec<QcRequirement>>>> {
    user.require(ProcurementAction::ManageSettings)?;
    let requirements = QualityControlService::new(state.db.clone())
        .replace_requirements(TenantScope::new(&user), &user, input)
        .await?;
    Ok(Json(ApiResponse::new(requirements)))
}
