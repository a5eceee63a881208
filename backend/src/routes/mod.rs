//! Route definitions for the SPPG procurement API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - procurement
        .nest("/procurement", procurement_routes(state))
}

/// Procurement routes (protected)
fn procurement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/orders", order_routes())
        .nest("/items", item_routes())
        .route(
            "/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route(
            "/budgets",
            get(handlers::list_budgets).put(handlers::upsert_budgets),
        )
        .route("/budgets/check", post(handlers::check_budget))
        .route(
            "/qc-requirements",
            get(handlers::list_qc_requirements).put(handlers::replace_qc_requirements),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Order lifecycle routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/export", get(handlers::export_orders))
        .route(
            "/:order_id",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/:order_id/submit", post(handlers::submit_order))
        .route("/:order_id/approve", post(handlers::approve_order))
        .route("/:order_id/reject", post(handlers::reject_order))
        .route("/:order_id/escalate", post(handlers::escalate_order))
        .route("/:order_id/place", post(handlers::place_order))
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route("/:order_id/receive", post(handlers::receive_order))
        .route("/:order_id/approval-status", get(handlers::get_approval_status))
        .route("/:order_id/history", get(handlers::get_order_history))
}

/// Item routes
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/statistics", get(handlers::get_item_statistics))
        .route(
            "/:item_id",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
}
