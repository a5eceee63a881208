//! Stock intake from procurement receipts

use rust_decimal::Decimal;
use shared::validate_inventory_unit;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{ProcurementItem, StockMovement, MOVEMENT_IN, REFERENCE_PROCUREMENT};
use crate::repository::{NewStockMovement, TenantScope};

/// Stock before and after an intake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub before: Decimal,
    pub after: Decimal,
}

/// Compute the stock snapshot for an incoming quantity
pub fn intake(current_stock: Decimal, quantity: Decimal) -> AppResult<StockChange> {
    let after = current_stock.checked_add(quantity).ok_or_else(|| {
        AppError::validation(
            "received_quantity",
            "Stock level would exceed the supported maximum",
            "Jumlah stok melebihi batas yang didukung",
        )
    })?;
    Ok(StockChange {
        before: current_stock,
        after,
    })
}

/// Reject a line whose unit differs from its linked inventory item
pub fn ensure_unit_matches(line_unit: &str, inventory_unit: &str, item_name: &str) -> AppResult<()> {
    validate_inventory_unit(line_unit, inventory_unit).map_err(|_| {
        AppError::validation(
            "inventory_item_id",
            &format!(
                "Line unit '{}' does not match inventory unit '{}' for {}",
                line_unit, inventory_unit, item_name
            ),
            &format!(
                "Satuan '{}' tidak sesuai dengan satuan inventaris '{}' untuk {}",
                line_unit, inventory_unit, item_name
            ),
        )
    })
}

/// Increment a linked inventory item with accepted stock and append the
/// ledger entry. Runs inside the receipt transaction; the item row is locked
/// first so concurrent receipts serialize on it.
pub async fn receive_stock(
    conn: &mut PgConnection,
    scope: &TenantScope,
    user: &AuthUser,
    line: &ProcurementItem,
    order_id: Uuid,
    order_code: &str,
    quantity: Decimal,
) -> AppResult<Option<StockMovement>> {
    let Some(inventory_item_id) = line.inventory_item_id else {
        return Ok(None);
    };
    if quantity <= Decimal::ZERO {
        return Ok(None);
    }

    let item = scope.lock_inventory_item(conn, inventory_item_id).await?;
    ensure_unit_matches(&line.unit, &item.unit, &item.item_name)?;

    let unit_cost = line.net_unit_cost();
    let change = intake(item.current_stock, quantity)?;
    scope
        .set_inventory_stock(conn, item.id, change.after, Some(unit_cost))
        .await?;

    let movement = scope
        .insert_stock_movement(
            conn,
            &NewStockMovement {
                inventory_item_id: item.id,
                movement_type: MOVEMENT_IN,
                quantity,
                stock_before: change.before,
                stock_after: change.after,
                unit_cost: Some(unit_cost),
                reference_type: REFERENCE_PROCUREMENT,
                reference_id: order_id,
                notes: Some(format!("Receipt of {} ({})", line.item_name, order_code)),
                moved_by: user.user_id,
            },
        )
        .await?;

    tracing::debug!(
        inventory_item_id = %item.id,
        before = %change.before,
        after = %change.after,
        "Stock received"
    );

    Ok(Some(movement))
}
