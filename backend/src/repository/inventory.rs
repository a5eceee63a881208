//! Inventory items and the stock movement ledger

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use super::TenantScope;
use crate::error::{AppError, AppResult};
use crate::models::{InventoryItem, StockMovement};

/// Ledger entry to append
#[derive(Debug, Clone)]
pub struct NewStockMovement<'a> {
    pub inventory_item_id: Uuid,
    pub movement_type: &'a str,
    pub quantity: Decimal,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference_type: &'a str,
    pub reference_id: Uuid,
    pub notes: Option<String>,
    pub moved_by: Uuid,
}

impl TenantScope {
    /// Name and unit of a tenant's inventory item, `None` when it does not exist here
    pub async fn inventory_item_unit(
        &self,
        conn: &mut PgConnection,
        item_id: Uuid,
    ) -> AppResult<Option<(String, String)>> {
        let unit = sqlx::query_as::<_, (String, String)>(
            "SELECT item_name, unit FROM inventory_items WHERE id = $1 AND tenant_id = $2",
        )
        .bind(item_id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(unit)
    }

    /// Load and row-lock an inventory item before changing its stock
    pub async fn lock_inventory_item(&self, conn: &mut PgConnection, item_id: Uuid) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT id, tenant_id, item_name, category, unit, current_stock, cost_per_unit
            FROM inventory_items
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(item_id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))
    }

    pub async fn set_inventory_stock(
        &self,
        conn: &mut PgConnection,
        item_id: Uuid,
        current_stock: Decimal,
        cost_per_unit: Option<Decimal>,
    ) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE inventory_items SET
                current_stock = $3,
                cost_per_unit = COALESCE($4, cost_per_unit),
                last_restocked_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING id, tenant_id, item_name, category, unit, current_stock, cost_per_unit
            "#,
        )
        .bind(item_id)
        .bind(self.tenant_id)
        .bind(current_stock)
        .bind(cost_per_unit)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))
    }

    pub async fn insert_stock_movement(
        &self,
        conn: &mut PgConnection,
        movement: &NewStockMovement<'_>,
    ) -> AppResult<StockMovement> {
        let total_cost = movement
            .unit_cost
            .and_then(|cost| cost.checked_mul(movement.quantity));

        let row = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements (
                tenant_id, inventory_item_id, movement_type, quantity, stock_before, stock_after,
                unit_cost, total_cost, reference_type, reference_id, notes, moved_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, inventory_item_id, movement_type, quantity, stock_before, stock_after,
                      unit_cost, total_cost, reference_type, reference_id, notes, moved_by, created_at
            "#,
        )
        .bind(self.tenant_id)
        .bind(movement.inventory_item_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.stock_before)
        .bind(movement.stock_after)
        .bind(movement.unit_cost)
        .bind(total_cost)
        .bind(movement.reference_type)
        .bind(movement.reference_id)
        .bind(&movement.notes)
        .bind(movement.moved_by)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }

    pub async fn stock_movements_for_reference(
        &self,
        conn: &mut PgConnection,
        reference_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, inventory_item_id, movement_type, quantity, stock_before, stock_after,
                   unit_cost, total_cost, reference_type, reference_id, notes, moved_by, created_at
            FROM stock_movements
            WHERE reference_id = $1 AND tenant_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(reference_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Whether production has drawn on stock received through this line
    pub async fn item_consumed_by_production(
        &self,
        conn: &mut PgConnection,
        procurement_item_id: Uuid,
    ) -> AppResult<bool> {
        let consumed = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM production_material_usages
                WHERE procurement_item_id = $1 AND tenant_id = $2
            )
            "#,
        )
        .bind(procurement_item_id)
        .bind(self.tenant_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(consumed)
    }
}
