//! Procurement item HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use super::ApiResponse;
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::repository::TenantScope;
use crate::services::items::{ItemDetail, ItemStatistics, ItemStatsQuery, UpdateItemInput};
use crate::services::ItemService;
use crate::AppState;

fn service(state: &AppState) -> ItemService {
    ItemService::new(state.db.clone(), &state.config)
}

pub async fn get_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ItemDetail>>> {
    let item = service(&state)
        .get_item(TenantScope::new(&user), &user, item_id)
        .await?;
    Ok(Json(ApiResponse::new(item)))
}

/// Update one item and recompute its order's totals
pub async fn update_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<ApiResponse<ItemDetail>>> {
    let item = service(&state)
        .update_item(TenantScope::new(&user), &user, item_id, input)
        .await?;
    Ok(Json(ApiResponse::new(item)))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    service(&state)
        .delete_item(TenantScope::new(&user), &user, item_id)
        .await?;
    Ok(Json(ApiResponse::new(serde_json::json!({ "id": item_id }))))
}

/// Per-category item figures
pub async fn get_item_statistics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ItemStatsQuery>,
) -> AppResult<Json<ApiResponse<ItemStatistics>>> {
    let stats = service(&state)
        .statistics(TenantScope::new(&user), &user, query)
        .await?;
    Ok(Json(ApiResponse::new(stats)))
}
