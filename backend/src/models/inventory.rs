//! Inventory records touched by receiving

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Stock-keeping item linked from procurement lines
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub item_name: String,
    pub category: String,
    pub unit: String,
    pub current_stock: Decimal,
    pub cost_per_unit: Option<Decimal>,
}

/// Immutable stock ledger entry
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub inventory_item_id: Uuid,
    pub movement_type: String,
    pub quantity: Decimal,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub unit_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub moved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Movement type for stock arriving from a procurement receipt
pub const MOVEMENT_IN: &str = "IN";

/// Reference type stored on movements created by receiving
pub const REFERENCE_PROCUREMENT: &str = "PROCUREMENT";
