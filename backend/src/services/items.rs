//! Item-level operations and item statistics

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    price_line, validate_order_line, LinePricing, OrderLineInput, OrderOperation, OrderStatus,
    ProcurementAction,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::ProcurementItem;
use crate::repository::{CategoryItemStats, InventoryLink, ItemStatsFilter, TenantScope};
use crate::services::audit::{self, ENTITY_ITEM};
use crate::services::budget;
use crate::services::procurement::{
    apply_totals, checked_totals, ensure_inventory_links, item_spend, narrate, rule_violation,
};

/// Item service
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
    tax_rate_percent: Decimal,
}

/// Item with the order it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: ProcurementItem,
    pub order_code: String,
    pub order_status: OrderStatus,
}

/// Partial update of one item. Omitted fields keep their value.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub item_name: Option<String>,
    pub item_code: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    pub brand: Option<String>,
    pub ordered_quantity: Option<Decimal>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    pub price_per_unit: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub inventory_item_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Query for the statistics aggregation
#[derive(Debug, Default, Deserialize)]
pub struct ItemStatsQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub category: Option<String>,
    pub status: Option<OrderStatus>,
}

/// Figures for one category plus its acceptance rate
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStatistics {
    #[serde(flatten)]
    pub stats: CategoryItemStats,
    pub acceptance_rate: Option<Decimal>,
}

/// Tenant-wide totals across categories
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemTotals {
    pub item_count: i64,
    pub ordered_quantity: Decimal,
    pub received_quantity: Decimal,
    pub returned_quantity: Decimal,
    pub total_value: Decimal,
    pub accepted_count: i64,
    pub rejected_count: i64,
    pub acceptance_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemStatistics {
    pub totals: ItemTotals,
    pub by_category: Vec<CategoryStatistics>,
}

/// Accepted share of inspected lines, in percent
pub fn acceptance_rate(accepted: i64, rejected: i64) -> Option<Decimal> {
    let inspected = accepted + rejected;
    if inspected <= 0 {
        return None;
    }
    Some((Decimal::from(accepted) * Decimal::ONE_HUNDRED / Decimal::from(inspected)).round_dp(2))
}

/// Roll per-category rows up into tenant totals
pub fn summarize(rows: Vec<CategoryItemStats>) -> ItemStatistics {
    let mut totals = ItemTotals::default();
    let mut by_category = Vec::with_capacity(rows.len());
    for stats in rows {
        totals.item_count += stats.item_count;
        totals.ordered_quantity += stats.ordered_quantity;
        totals.received_quantity += stats.received_quantity;
        totals.returned_quantity += stats.returned_quantity;
        totals.total_value += stats.total_value;
        totals.accepted_count += stats.accepted_count;
        totals.rejected_count += stats.rejected_count;
        by_category.push(CategoryStatistics {
            acceptance_rate: acceptance_rate(stats.accepted_count, stats.rejected_count),
            stats,
        });
    }
    totals.acceptance_rate = acceptance_rate(totals.accepted_count, totals.rejected_count);
    ItemStatistics { totals, by_category }
}

fn merge(item: &ProcurementItem, input: UpdateItemInput) -> OrderLineInput {
    OrderLineInput {
        item_name: input.item_name.unwrap_or_else(|| item.item_name.clone()),
        item_code: input.item_code.or_else(|| item.item_code.clone()),
        category: input.category.unwrap_or_else(|| item.category.clone()),
        brand: input.brand.or_else(|| item.brand.clone()),
        ordered_quantity: input.ordered_quantity.unwrap_or(item.ordered_quantity),
        unit: input.unit.unwrap_or_else(|| item.unit.clone()),
        price_per_unit: input.price_per_unit.unwrap_or(item.price_per_unit),
        discount_percent: input.discount_percent.unwrap_or(item.discount_percent),
        inventory_item_id: input.inventory_item_id.or(item.inventory_item_id),
        notes: input.notes.or_else(|| item.notes.clone()),
    }
}

impl ItemService {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            tax_rate_percent: config.procurement.tax_rate_percent,
        }
    }

    pub async fn get_item(&self, scope: TenantScope, user: &AuthUser, item_id: Uuid) -> AppResult<ItemDetail> {
        user.require(ProcurementAction::View)?;
        let mut conn = self.db.acquire().await?;
        let item = scope.find_item(&mut conn, item_id).await?;
        let order = scope.find_order(&mut conn, item.order_id).await?;
        Ok(ItemDetail {
            item,
            order_code: order.order_code,
            order_status: order.status,
        })
    }

    /// Edit one line and recompute the owning order's totals
    pub async fn update_item(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<ItemDetail> {
        user.require(ProcurementAction::Update)?;
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = scope.find_item(&mut tx, item_id).await?;
        let mut order = scope.lock_order(&mut tx, current.order_id).await?;
        OrderOperation::Update.ensure_allowed_from(order.status)?;
        if order.status == OrderStatus::PendingApproval && !scope.approvals(&mut tx, order.id).await?.is_empty() {
            return Err(AppError::precondition(
                "Items cannot change after approvers have started deciding",
                "Item tidak dapat diubah setelah proses persetujuan dimulai",
            ));
        }

        let line = merge(&current, input);
        validate_order_line(&line).map_err(rule_violation("items", "Baris pesanan tidak valid"))?;
        let links: Vec<InventoryLink> = line
            .inventory_item_id
            .map(|inventory_item_id| InventoryLink {
                inventory_item_id,
                unit: line.unit.trim().to_string(),
            })
            .into_iter()
            .collect();
        ensure_inventory_links(&mut tx, &scope, &links).await?;

        let pricing = price_line(line.ordered_quantity, line.price_per_unit, line.discount_percent)?;
        let mut item = current;
        item.item_name = line.item_name.trim().to_string();
        item.item_code = line.item_code;
        item.category = line.category.trim().to_uppercase();
        item.brand = line.brand;
        item.ordered_quantity = line.ordered_quantity;
        item.unit = line.unit.trim().to_string();
        item.price_per_unit = line.price_per_unit;
        item.discount_percent = line.discount_percent;
        item.total_price = pricing.total_price;
        item.discount_amount = pricing.discount_amount;
        item.final_price = pricing.final_price;
        item.inventory_item_id = line.inventory_item_id;
        item.notes = line.notes;
        let item = scope.save_item(&mut tx, &item).await?;

        let items = scope.order_items(&mut tx, order.id).await?;
        let lines: Vec<LinePricing> = items.iter().map(ProcurementItem::pricing).collect();
        let totals = checked_totals(&lines, self.tax_rate_percent, order.discount, order.shipping_cost)?;
        apply_totals(&mut order, &totals);

        if order.status == OrderStatus::PendingApproval {
            budget::enforce(&mut tx, &scope, user, order.order_date, &item_spend(&items)?, Some(order.id))
                .await?;
        }

        narrate(&mut order, user, "ITEM_UPDATED", Some(&item.item_name));
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "UPDATE",
                    ENTITY_ITEM,
                    Some(item.id),
                    format!("Updated item {} on order {}", item.item_name, order.order_code),
                    Some(serde_json::json!({
                        "final_price": item.final_price,
                        "order_total": order.total_amount,
                    })),
                ),
            )
            .await?;
        tx.commit().await?;

        Ok(ItemDetail {
            item,
            order_code: order.order_code,
            order_status: order.status,
        })
    }

    /// Remove one line from an editable order
    pub async fn delete_item(&self, scope: TenantScope, user: &AuthUser, item_id: Uuid) -> AppResult<()> {
        user.require(ProcurementAction::Update)?;

        let mut tx = self.db.begin().await?;
        let item = scope.find_item(&mut tx, item_id).await?;
        let mut order = scope.lock_order(&mut tx, item.order_id).await?;
        OrderOperation::Update.ensure_allowed_from(order.status)?;

        if scope.item_consumed_by_production(&mut tx, item.id).await? {
            return Err(AppError::precondition(
                "Item has already been used in production",
                "Item sudah digunakan dalam produksi",
            ));
        }

        let remaining: Vec<ProcurementItem> = scope
            .order_items(&mut tx, order.id)
            .await?
            .into_iter()
            .filter(|i| i.id != item.id)
            .collect();
        if order.status == OrderStatus::PendingApproval && remaining.is_empty() {
            return Err(AppError::precondition(
                "An order awaiting approval must keep at least one item",
                "Pesanan yang menunggu persetujuan harus memiliki minimal satu item",
            ));
        }

        scope.delete_item(&mut tx, item.id).await?;

        let lines: Vec<LinePricing> = remaining.iter().map(ProcurementItem::pricing).collect();
        let totals = checked_totals(&lines, self.tax_rate_percent, order.discount, order.shipping_cost)?;
        apply_totals(&mut order, &totals);
        narrate(&mut order, user, "ITEM_REMOVED", Some(&item.item_name));
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "DELETE",
                    ENTITY_ITEM,
                    Some(item.id),
                    format!("Removed item {} from order {}", item.item_name, order.order_code),
                    None,
                ),
            )
            .await?;
        tx.commit().await?;

        Ok(())
    }

    pub async fn statistics(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        query: ItemStatsQuery,
    ) -> AppResult<ItemStatistics> {
        user.require(ProcurementAction::View)?;
        let filter = ItemStatsFilter {
            date_from: query.date_from,
            date_to: query.date_to,
            category: query
                .category
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty()),
            status: query.status,
        };

        let mut conn = self.db.acquire().await?;
        let rows = scope.item_statistics(&mut conn, &filter).await?;
        Ok(summarize(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(category: &str, accepted: i64, rejected: i64, value: i64) -> CategoryItemStats {
        CategoryItemStats {
            category: category.to_string(),
            item_count: accepted + rejected,
            ordered_quantity: Decimal::from(10),
            received_quantity: Decimal::from(8),
            returned_quantity: Decimal::ONE,
            total_value: Decimal::from(value),
            accepted_count: accepted,
            rejected_count: rejected,
        }
    }

    #[test]
    fn test_acceptance_rate() {
        assert_eq!(acceptance_rate(0, 0), None);
        assert_eq!(acceptance_rate(3, 1), Some(Decimal::from(75)));
        assert_eq!(acceptance_rate(1, 2), Some(Decimal::new(3333, 2)));
    }

    #[test]
    fn test_summarize_rolls_up_categories() {
        let summary = summarize(vec![
            stats("PROTEIN", 3, 1, 500_000),
            stats("SAYUR", 1, 0, 100_000),
        ]);
        assert_eq!(summary.totals.item_count, 5);
        assert_eq!(summary.totals.total_value, Decimal::from(600_000));
        assert_eq!(summary.totals.acceptance_rate, Some(Decimal::from(80)));
        assert_eq!(summary.by_category[1].acceptance_rate, Some(Decimal::from(100)));
    }
}
