//! Procurement order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use shared::PaginatedResponse;
use uuid::Uuid;

use super::ApiResponse;
use crate::error::AppResult;
use crate::middleware::{AuthUser, ClientIp};
use crate::models::{Escalation, ProcurementOrder};
use crate::repository::TenantScope;
use crate::services::approval::ApprovalStatusView;
use crate::services::procurement::{
    ApproveInput, CancelInput, CreateOrderInput, EscalateInput, OrderDetail, OrderHistory,
    OrderListQuery, ReceiptOutcome, ReceiveInput, RejectInput, UpdateOrderInput,
};
use crate::services::{ExportService, ProcurementService};
use crate::AppState;

fn service(state: &AppState) -> ProcurementService {
    ProcurementService::new(state.db.clone(), &state.config, state.notifications.clone())
}

/// List orders with paging and filters
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<PaginatedResponse<ProcurementOrder>>>> {
    let orders = service(&state)
        .list_orders(TenantScope::new(&user), &user, query)
        .await?;
    Ok(Json(ApiResponse::new(orders)))
}

/// Export the filtered order list as CSV
pub async fn export_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<impl IntoResponse> {
    let csv = ExportService::new(state.db.clone())
        .export_orders(TenantScope::new(&user), &user, query)
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"procurement_orders.csv\"",
            ),
        ],
        csv,
    ))
}

/// Create an order
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<impl IntoResponse> {
    let order = service(&state)
        .create_order(TenantScope::new(&user), &user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(order))))
}

/// Get an order with items, approvals, escalations and QC records
pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = service(&state)
        .get_order(TenantScope::new(&user), &user, order_id)
        .await?;
    Ok(Json(ApiResponse::new(order)))
}

pub async fn update_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = service(&state)
        .update_order(TenantScope::new(&user), &user, order_id, input)
        .await?;
    Ok(Json(ApiResponse::new(order)))
}

/// Delete a draft order
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    service(&state)
        .delete_order(TenantScope::new(&user), &user, order_id)
        .await?;
    Ok(Json(ApiResponse::new(serde_json::json!({ "id": order_id }))))
}

pub async fn submit_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = service(&state)
        .submit_order(TenantScope::new(&user), &user, order_id)
        .await?;
    Ok(Json(ApiResponse::new(order)))
}

/// Approve an order; the body is optional
pub async fn approve_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ClientIp(ip): ClientIp,
    Path(order_id): Path<Uuid>,
    input: Option<Json<ApproveInput>>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let order = service(&state)
        .approve_order(TenantScope::new(&user), &user, order_id, input, ip)
        .await?;
    Ok(Json(ApiResponse::new(order)))
}

pub async fn reject_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ClientIp(ip): ClientIp,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RejectInput>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = service(&state)
        .reject_order(TenantScope::new(&user), &user, order_id, input, ip)
        .await?;
    Ok(Json(ApiResponse::new(order)))
}

pub async fn escalate_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<EscalateInput>,
) -> AppResult<impl IntoResponse> {
    let escalation: Escalation = service(&state)
        .escalate_order(TenantScope::new(&user), &user, order_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(escalation))))
}

pub async fn place_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = service(&state)
        .place_order(TenantScope::new(&user), &user, order_id)
        .await?;
    Ok(Json(ApiResponse::new(order)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CancelInput>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = service(&state)
        .cancel_order(TenantScope::new(&user), &user, order_id, input)
        .await?;
    Ok(Json(ApiResponse::new(order)))
}

/// Record a goods receipt with QC evidence
pub async fn receive_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<ReceiveInput>,
) -> AppResult<Json<ApiResponse<ReceiptOutcome>>> {
    let outcome = service(&state)
        .receive_order(TenantScope::new(&user), &user, order_id, input)
        .await?;
    Ok(Json(ApiResponse::new(outcome)))
}

pub async fn get_approval_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ApprovalStatusView>>> {
    let status = service(&state)
        .approval_status(TenantScope::new(&user), &user, order_id)
        .await?;
    Ok(Json(ApiResponse::new(status)))
}

pub async fn get_order_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderHistory>>> {
    let history = service(&state)
        .order_history(TenantScope::new(&user), &user, order_id)
        .await?;
    Ok(Json(ApiResponse::new(history)))
}
