//! Error handling for the SPPG procurement back-office
//!
//! Every failure is rendered in the uniform envelope
//! `{ "success": false, "error": {...}, "details": ... }` with messages in
//! English and Bahasa Indonesia.

use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{AmountOverflow, BudgetDecision, QcViolation, TransitionError, UserRole};
use thiserror::Error;

static EXPOSE_INTERNAL_ERRORS: OnceLock<bool> = OnceLock::new();

/// Allow internal error detail in responses (never in production)
pub fn expose_internal_errors(expose: bool) {
    let _ = EXPOSE_INTERNAL_ERRORS.set(expose);
}

fn internal_detail_allowed() -> bool {
    EXPOSE_INTERNAL_ERRORS.get().copied().unwrap_or(false)
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions for {action}")]
    InsufficientPermissions { action: String },

    #[error("Role {role} is not an eligible approver")]
    ApproverNotEligible {
        role: UserRole,
        pending: Vec<UserRole>,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_ind: String,
    },

    #[error("Validation error: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),

    // Precondition failures
    #[error(transparent)]
    InvalidStateTransition(#[from] TransitionError),

    #[error("Budget exceeded")]
    BudgetExceeded(BudgetDecision),

    #[error("QC requirements not met")]
    QcRequirementsNotMet(Vec<QcViolation>),

    #[error("Approver has already recorded a decision on this order")]
    DuplicateApproval,

    #[error("Precondition failed: {message}")]
    PreconditionFailed {
        message: String,
        message_ind: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: &str, message: &str, message_ind: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_ind: message_ind.to_string(),
        }
    }

    pub fn precondition(message: impl Into<String>, message_ind: impl Into<String>) -> Self {
        AppError::PreconditionFailed {
            message: message.into(),
            message_ind: message_ind.into(),
        }
    }

    /// True when the database rejected a write on a unique index
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
    }
}

impl From<AmountOverflow> for AppError {
    fn from(err: AmountOverflow) -> Self {
        AppError::Validation {
            field: "items".to_string(),
            message: err.to_string(),
            message_ind: "Nilai nominal melebihi batas yang didukung".to_string(),
        }
    }
}

/// Error response envelope
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_ind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message_en: impl Into<String>, message_ind: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message_en: message_en.into(),
                message_ind: message_ind.into(),
                field: None,
            },
            details: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.error.field = Some(field.into());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("TOKEN_EXPIRED", "Token has expired", "Token sudah kedaluwarsa"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("INVALID_TOKEN", "Invalid token", "Token tidak valid"),
            ),
            AppError::InsufficientPermissions { .. } => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                    "Anda tidak memiliki izin untuk melakukan tindakan ini",
                ),
            ),
            AppError::ApproverNotEligible { pending, .. } => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new(
                    "APPROVER_NOT_ELIGIBLE",
                    "Your role cannot approve this order at its current approval stage",
                    "Peran Anda tidak dapat menyetujui pesanan ini pada tahap persetujuan saat ini",
                )
                .with_details(serde_json::json!({ "pending_roles": pending })),
            ),
            AppError::Validation { field, message, message_ind } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_ERROR", message.clone(), message_ind.clone())
                    .with_field(field.clone()),
            ),
            AppError::InvalidInput(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "VALIDATION_ERROR",
                    "Request contains invalid fields",
                    "Permintaan berisi data yang tidak valid",
                )
                .with_details(serde_json::to_value(errors).unwrap_or_default()),
            ),
            AppError::InvalidStateTransition(err) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "INVALID_STATE_TRANSITION",
                    err.to_string(),
                    format!(
                        "Tidak dapat {} pesanan dengan status {}",
                        err.operation.as_str(),
                        err.current
                    ),
                )
                .with_details(serde_json::json!({
                    "operation": err.operation,
                    "current_status": err.current,
                    "allowed_statuses": err.allowed,
                })),
            ),
            AppError::BudgetExceeded(decision) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "BUDGET_EXCEEDED",
                    decision
                        .message
                        .clone()
                        .unwrap_or_else(|| "Category budget exceeded".to_string()),
                    "Anggaran kategori terlampaui",
                )
                .with_details(serde_json::to_value(&decision.details).unwrap_or_default()),
            ),
            AppError::QcRequirementsNotMet(violations) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "QC_REQUIREMENTS_NOT_MET",
                    violations
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; "),
                    "Persyaratan quality control belum terpenuhi",
                )
                .with_details(serde_json::json!({ "violations": violations })),
            ),
            AppError::DuplicateApproval => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "DUPLICATE_APPROVAL",
                    "You have already recorded a decision on this order",
                    "Anda sudah memberikan keputusan untuk pesanan ini",
                ),
            ),
            AppError::PreconditionFailed { message, message_ind } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("PRECONDITION_FAILED", message.clone(), message_ind.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{} tidak ditemukan", resource),
                ),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                    format!("Data dengan {} ini sudah ada", field),
                )
                .with_field(field.clone()),
            ),
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                let mut body = ErrorResponse::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred",
                    "Terjadi kesalahan internal pada server",
                );
                if internal_detail_allowed() {
                    body = body.with_details(serde_json::json!({ "internal": self.to_string() }));
                }
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
