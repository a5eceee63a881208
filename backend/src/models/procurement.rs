//! Persisted procurement records

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    ApprovalAction, ApprovalLevel, DeliveryStatus, LinePricing, OrderStatus, PriorDecision,
    QcResult, ReceiptProgress, UserRole,
};
use sqlx::FromRow;
use uuid::Uuid;

/// Procurement order row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProcurementOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_code: String,
    pub plan_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub status: OrderStatus,
    pub delivery_status: DeliveryStatus,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub actual_delivery: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub payment_terms: Option<String>,
    pub payment_due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Procurement order line row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProcurementItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub inventory_item_id: Option<Uuid>,
    pub item_name: String,
    pub item_code: Option<String>,
    pub category: String,
    pub brand: Option<String>,
    pub ordered_quantity: Decimal,
    pub unit: String,
    pub price_per_unit: Decimal,
    pub total_price: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub final_price: Decimal,
    pub received_quantity: Decimal,
    pub returned_quantity: Decimal,
    pub is_accepted: bool,
    pub rejection_reason: Option<String>,
    pub quality_grade: Option<String>,
    pub quality_notes: Option<String>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcurementItem {
    pub fn pricing(&self) -> LinePricing {
        LinePricing {
            total_price: self.total_price,
            discount_amount: self.discount_amount,
            final_price: self.final_price,
        }
    }

    pub fn progress(&self) -> ReceiptProgress {
        ReceiptProgress {
            ordered_quantity: self.ordered_quantity,
            received_quantity: self.received_quantity,
        }
    }

    /// Net price per unit after the line discount
    pub fn net_unit_cost(&self) -> Decimal {
        if self.ordered_quantity.is_zero() {
            self.price_per_unit
        } else {
            self.final_price / self.ordered_quantity
        }
    }
}

/// One approver decision
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApprovalRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub approver_id: Uuid,
    pub approver_name: String,
    pub approver_role: UserRole,
    pub action: ApprovalAction,
    pub approval_level: Option<i32>,
    pub notes: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRecord {
    pub fn decision(&self) -> PriorDecision {
        PriorDecision {
            approver_id: self.approver_id,
            role: self.approver_role,
            action: self.action,
        }
    }
}

/// Advisory escalation raised on a pending order
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Escalation {
    pub id: Uuid,
    pub order_id: Uuid,
    pub escalated_by: Uuid,
    pub escalated_by_name: String,
    pub from_roles: Vec<String>,
    pub to_role: UserRole,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Inspection summary recorded with a receipt
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QualityControlRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub inspector_id: Uuid,
    pub inspector_name: String,
    pub result: QcResult,
    pub score: Decimal,
    pub photo_count: i32,
    pub photos: Vec<String>,
    pub checklist: serde_json::Value,
    pub total_checkpoints: i32,
    pub passed_checkpoints: i32,
    pub accepted_lines: i32,
    pub rejected_lines: i32,
    pub notes: Option<String>,
    pub inspected_at: DateTime<Utc>,
}

/// Tenant procurement settings row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProcurementSettings {
    pub auto_approve_threshold: Option<Decimal>,
    pub parallel_approval_threshold: Option<Decimal>,
    pub default_payment_term: Option<String>,
    pub notify_on_submit: bool,
    pub notify_on_decision: bool,
    pub notify_on_receive: bool,
    pub qc_min_photos: i32,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ProcurementSettings {
    /// Settings used when a tenant never configured procurement
    fn default() -> Self {
        Self {
            auto_approve_threshold: None,
            parallel_approval_threshold: None,
            default_payment_term: None,
            notify_on_submit: true,
            notify_on_decision: true,
            notify_on_receive: true,
            qc_min_photos: 0,
            updated_by: None,
            updated_at: None,
        }
    }
}

/// Approval level row
#[derive(Debug, Clone, FromRow)]
pub struct ApprovalLevelRow {
    pub level: i32,
    pub level_name: String,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub required_role: UserRole,
    pub is_active: bool,
}

impl From<ApprovalLevelRow> for ApprovalLevel {
    fn from(row: ApprovalLevelRow) -> Self {
        ApprovalLevel {
            level: row.level,
            level_name: row.level_name,
            min_amount: row.min_amount,
            max_amount: row.max_amount,
            required_role: row.required_role,
            is_active: row.is_active,
        }
    }
}

/// Monthly category ceiling row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BudgetRow {
    pub id: Uuid,
    pub category: String,
    pub period_year: i32,
    pub period_month: i32,
    pub limit_amount: Decimal,
    pub alert_threshold_percent: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Active tenant user who can receive approval requests
#[derive(Debug, Clone, FromRow)]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    pub fn has_contact(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.email) || present(&self.phone)
    }
}

/// Audit log row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
