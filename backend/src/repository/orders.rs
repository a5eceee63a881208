//! Orders, items and workflow records

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    price_line, ApprovalAction, LinePricing, OrderLineInput, OrderStatus, OrderTotals,
    Pagination, QcResult, UserRole,
};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::TenantScope;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    ApprovalRecord, Escalation, ProcurementItem, ProcurementOrder, QualityControlRecord,
};

/// Values for a freshly created order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: String,
    pub plan_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub status: OrderStatus,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub totals: OrderTotals,
    pub payment_terms: Option<String>,
    pub payment_due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    pub approved_by: Option<Uuid>,
    pub created_by: Uuid,
}

/// Values for one order line
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub inventory_item_id: Option<Uuid>,
    pub item_name: String,
    pub item_code: Option<String>,
    pub category: String,
    pub brand: Option<String>,
    pub ordered_quantity: Decimal,
    pub unit: String,
    pub price_per_unit: Decimal,
    pub discount_percent: Decimal,
    pub pricing: LinePricing,
    pub notes: Option<String>,
}

impl NewOrderItem {
    /// Price a requested line
    pub fn from_input(line: &OrderLineInput) -> AppResult<Self> {
        Ok(Self {
            inventory_item_id: line.inventory_item_id,
            item_name: line.item_name.trim().to_string(),
            item_code: line.item_code.clone(),
            category: line.category.trim().to_uppercase(),
            brand: line.brand.clone(),
            ordered_quantity: line.ordered_quantity,
            unit: line.unit.trim().to_string(),
            price_per_unit: line.price_per_unit,
            discount_percent: line.discount_percent,
            pricing: price_line(line.ordered_quantity, line.price_per_unit, line.discount_percent)?,
            notes: line.notes.clone(),
        })
    }

    /// Inventory link and the unit it must agree with
    pub fn inventory_link(&self) -> Option<InventoryLink> {
        self.inventory_item_id.map(|inventory_item_id| InventoryLink {
            inventory_item_id,
            unit: self.unit.clone(),
        })
    }
}

/// A line's reference to a stock-keeping item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLink {
    pub inventory_item_id: Uuid,
    pub unit: String,
}

/// List filters for orders
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub supplier_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

/// Cumulative update applied to one line by a receipt
#[derive(Debug, Clone)]
pub struct ReceiptLineUpdate {
    pub received_quantity: Decimal,
    pub returned_quantity: Decimal,
    pub is_accepted: bool,
    pub rejection_reason: Option<String>,
    pub quality_grade: Option<String>,
    pub quality_notes: Option<String>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Inspection summary to persist with a receipt
#[derive(Debug, Clone)]
pub struct NewQualityControl {
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
}

/// Aggregated line figures for one category
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryItemStats {
    pub category: String,
    pub item_count: i64,
    pub ordered_quantity: Decimal,
    pub received_quantity: Decimal,
    pub returned_quantity: Decimal,
    pub total_value: Decimal,
    pub accepted_count: i64,
    pub rejected_count: i64,
}

/// Filters for the items statistics aggregation
#[derive(Debug, Clone, Default)]
pub struct ItemStatsFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub category: Option<String>,
    pub status: Option<OrderStatus>,
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
    if let Some(supplier_id) = filter.supplier_id {
        qb.push(" AND supplier_id = ");
        qb.push_bind(supplier_id);
    }
    if let Some(plan_id) = filter.plan_id {
        qb.push(" AND plan_id = ");
        qb.push_bind(plan_id);
    }
    if let Some(date_from) = filter.date_from {
        qb.push(" AND order_date >= ");
        qb.push_bind(date_from);
    }
    if let Some(date_to) = filter.date_to {
        qb.push(" AND order_date <= ");
        qb.push_bind(date_to);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (order_code ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR supplier_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR notes ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

impl TenantScope {
    // ========================================================================
    // Order codes
    // ========================================================================

    /// Atomically claim the next order sequence number for a month
    pub async fn next_order_sequence(&self, conn: &mut PgConnection, period: &str) -> AppResult<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO procurement_order_sequences (tenant_id, period, last_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (tenant_id, period)
            DO UPDATE SET last_value = procurement_order_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(self.tenant_id)
        .bind(period)
        .fetch_one(&mut *conn)
        .await?;

        Ok(value)
    }

    // ========================================================================
    // Orders
    // ========================================================================

    pub async fn insert_order(&self, conn: &mut PgConnection, order: &NewOrder) -> AppResult<ProcurementOrder> {
        let row = sqlx::query_as::<_, ProcurementOrder>(
            r#"
            INSERT INTO procurement_orders (
                tenant_id, order_code, plan_id, supplier_id, supplier_name, status,
                order_date, expected_delivery, subtotal, tax_amount, discount,
                shipping_cost, total_amount, payment_terms, payment_due_date, notes,
                internal_notes, approved_by, approved_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, CASE WHEN $18::uuid IS NULL THEN NULL ELSE NOW() END, $19)
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(&order.order_code)
        .bind(order.plan_id)
        .bind(order.supplier_id)
        .bind(&order.supplier_name)
        .bind(order.status)
        .bind(order.order_date)
        .bind(order.expected_delivery)
        .bind(order.totals.subtotal)
        .bind(order.totals.tax_amount)
        .bind(order.totals.discount)
        .bind(order.totals.shipping_cost)
        .bind(order.totals.total_amount)
        .bind(&order.payment_terms)
        .bind(order.payment_due_date)
        .bind(&order.notes)
        .bind(&order.internal_notes)
        .bind(order.approved_by)
        .bind(order.created_by)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::DuplicateEntry("order_code".to_string())
            } else {
                AppError::DatabaseError(e)
            }
        })?;

        Ok(row)
    }

    pub async fn find_order(&self, conn: &mut PgConnection, order_id: Uuid) -> AppResult<ProcurementOrder> {
        sqlx::query_as::<_, ProcurementOrder>(
            "SELECT * FROM procurement_orders WHERE id = $1 AND tenant_id = $2",
        )
        .bind(order_id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Procurement order".to_string()))
    }

    /// Load and row-lock an order for the rest of the transaction
    pub async fn lock_order(&self, conn: &mut PgConnection, order_id: Uuid) -> AppResult<ProcurementOrder> {
        sqlx::query_as::<_, ProcurementOrder>(
            "SELECT * FROM procurement_orders WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Procurement order".to_string()))
    }

    pub async fn list_orders(
        &self,
        conn: &mut PgConnection,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<ProcurementOrder>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM procurement_orders WHERE tenant_id = ",
        );
        count.push_bind(self.tenant_id);
        push_order_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM procurement_orders WHERE tenant_id = ");
        qb.push_bind(self.tenant_id);
        push_order_filters(&mut qb, filter);
        qb.push(" ORDER BY order_date DESC, created_at DESC LIMIT ");
        qb.push_bind(pagination.limit());
        qb.push(" OFFSET ");
        qb.push_bind(pagination.offset());

        let orders = qb
            .build_query_as::<ProcurementOrder>()
            .fetch_all(&mut *conn)
            .await?;

        Ok((orders, u64::try_from(total).unwrap_or_default()))
    }

    /// Write back every mutable column of an order
    pub async fn save_order(
        &self,
        conn: &mut PgConnection,
        order: &ProcurementOrder,
        updated_by: Uuid,
    ) -> AppResult<ProcurementOrder> {
        let row = sqlx::query_as::<_, ProcurementOrder>(
            r#"
            UPDATE procurement_orders SET
                supplier_id = $3, supplier_name = $4, status = $5, delivery_status = $6,
                expected_delivery = $7, actual_delivery = $8, subtotal = $9, tax_amount = $10,
                discount = $11, shipping_cost = $12, total_amount = $13, payment_terms = $14,
                payment_due_date = $15, notes = $16, internal_notes = $17,
                rejection_reason = $18, cancellation_reason = $19, refund_amount = $20,
                approved_by = $21, approved_at = $22, ordered_at = $23,
                cancelled_by = $24, cancelled_at = $25, updated_by = $26, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(self.tenant_id)
        .bind(order.supplier_id)
        .bind(&order.supplier_name)
        .bind(order.status)
        .bind(order.delivery_status)
        .bind(order.expected_delivery)
        .bind(order.actual_delivery)
        .bind(order.subtotal)
        .bind(order.tax_amount)
        .bind(order.discount)
        .bind(order.shipping_cost)
        .bind(order.total_amount)
        .bind(&order.payment_terms)
        .bind(order.payment_due_date)
        .bind(&order.notes)
        .bind(&order.internal_notes)
        .bind(&order.rejection_reason)
        .bind(&order.cancellation_reason)
        .bind(order.refund_amount)
        .bind(order.approved_by)
        .bind(order.approved_at)
        .bind(order.ordered_at)
        .bind(order.cancelled_by)
        .bind(order.cancelled_at)
        .bind(updated_by)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Procurement order".to_string()))?;

        Ok(row)
    }

    /// Hard delete; items and workflow records cascade
    pub async fn delete_order(&self, conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM procurement_orders WHERE id = $1 AND tenant_id = $2")
            .bind(order_id)
            .bind(self.tenant_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Procurement order".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Items
    // ========================================================================

    pub async fn insert_items(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> AppResult<Vec<ProcurementItem>> {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, ProcurementItem>(
                r#"
                INSERT INTO procurement_items (
                    tenant_id, order_id, inventory_item_id, item_name, item_code, category,
                    brand, ordered_quantity, unit, price_per_unit, total_price,
                    discount_percent, discount_amount, final_price, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                RETURNING *
                "#,
            )
            .bind(self.tenant_id)
            .bind(order_id)
            .bind(item.inventory_item_id)
            .bind(&item.item_name)
            .bind(&item.item_code)
            .bind(&item.category)
            .bind(&item.brand)
            .bind(item.ordered_quantity)
            .bind(&item.unit)
            .bind(item.price_per_unit)
            .bind(item.pricing.total_price)
            .bind(item.discount_percent)
            .bind(item.pricing.discount_amount)
            .bind(item.pricing.final_price)
            .bind(&item.notes)
            .fetch_one(&mut *conn)
            .await?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Replace an order's item set wholesale
    pub async fn replace_items(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> AppResult<Vec<ProcurementItem>> {
        sqlx::query("DELETE FROM procurement_items WHERE order_id = $1 AND tenant_id = $2")
            .bind(order_id)
            .bind(self.tenant_id)
            .execute(&mut *conn)
            .await?;

        self.insert_items(conn, order_id, items).await
    }

    pub async fn order_items(&self, conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<ProcurementItem>> {
        let items = sqlx::query_as::<_, ProcurementItem>(
            "SELECT * FROM procurement_items WHERE order_id = $1 AND tenant_id = $2 ORDER BY created_at, id",
        )
        .bind(order_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// Row-lock every item of an order
    pub async fn lock_order_items(&self, conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<ProcurementItem>> {
        let items = sqlx::query_as::<_, ProcurementItem>(
            r#"
            SELECT * FROM procurement_items
            WHERE order_id = $1 AND tenant_id = $2
            ORDER BY created_at, id
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    pub async fn find_item(&self, conn: &mut PgConnection, item_id: Uuid) -> AppResult<ProcurementItem> {
        sqlx::query_as::<_, ProcurementItem>(
            "SELECT * FROM procurement_items WHERE id = $1 AND tenant_id = $2",
        )
        .bind(item_id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Procurement item".to_string()))
    }

    /// Write back the editable columns and pricing of one item
    pub async fn save_item(&self, conn: &mut PgConnection, item: &ProcurementItem) -> AppResult<ProcurementItem> {
        let row = sqlx::query_as::<_, ProcurementItem>(
            r#"
            UPDATE procurement_items SET
                inventory_item_id = $3, item_name = $4, item_code = $5, category = $6,
                brand = $7, ordered_quantity = $8, unit = $9, price_per_unit = $10,
                total_price = $11, discount_percent = $12, discount_amount = $13,
                final_price = $14, notes = $15, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(self.tenant_id)
        .bind(item.inventory_item_id)
        .bind(&item.item_name)
        .bind(&item.item_code)
        .bind(&item.category)
        .bind(&item.brand)
        .bind(item.ordered_quantity)
        .bind(&item.unit)
        .bind(item.price_per_unit)
        .bind(item.total_price)
        .bind(item.discount_percent)
        .bind(item.discount_amount)
        .bind(item.final_price)
        .bind(&item.notes)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Procurement item".to_string()))?;

        Ok(row)
    }

    pub async fn delete_item(&self, conn: &mut PgConnection, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM procurement_items WHERE id = $1 AND tenant_id = $2")
            .bind(item_id)
            .bind(self.tenant_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Procurement item".to_string()));
        }
        Ok(())
    }

    /// Apply one receipt line on top of the item's cumulative state
    pub async fn apply_receipt_line(
        &self,
        conn: &mut PgConnection,
        item_id: Uuid,
        update: &ReceiptLineUpdate,
    ) -> AppResult<ProcurementItem> {
        let row = sqlx::query_as::<_, ProcurementItem>(
            r#"
            UPDATE procurement_items SET
                received_quantity = received_quantity + $3,
                returned_quantity = returned_quantity + $4,
                is_accepted = $5,
                rejection_reason = $6,
                quality_grade = COALESCE($7, quality_grade),
                quality_notes = COALESCE($8, quality_notes),
                batch_number = COALESCE($9, batch_number),
                expiry_date = COALESCE($10, expiry_date),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(self.tenant_id)
        .bind(update.received_quantity)
        .bind(update.returned_quantity)
        .bind(update.is_accepted)
        .bind(&update.rejection_reason)
        .bind(&update.quality_grade)
        .bind(&update.quality_notes)
        .bind(&update.batch_number)
        .bind(update.expiry_date)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Procurement item".to_string()))?;

        Ok(row)
    }

    /// Spend already committed to a category by orders dated in `[from, to)`
    pub async fn committed_spend(
        &self,
        conn: &mut PgConnection,
        category: &str,
        from: NaiveDate,
        to: NaiveDate,
        exclude_order: Option<Uuid>,
    ) -> AppResult<Decimal> {
        let committing: Vec<String> = OrderStatus::ALL
            .iter()
            .filter(|s| s.commits_budget())
            .map(|s| s.as_str().to_string())
            .collect();

        let spend = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(i.final_price), 0)
            FROM procurement_items i
            JOIN procurement_orders o ON o.id = i.order_id AND o.tenant_id = i.tenant_id
            WHERE i.tenant_id = $1
              AND i.category = $2
              AND o.order_date >= $3
              AND o.order_date < $4
              AND o.status = ANY($5)
              AND ($6::uuid IS NULL OR o.id <> $6)
            "#,
        )
        .bind(self.tenant_id)
        .bind(category)
        .bind(from)
        .bind(to)
        .bind(committing)
        .bind(exclude_order)
        .fetch_one(&mut *conn)
        .await?;

        Ok(spend)
    }

    pub async fn item_statistics(
        &self,
        conn: &mut PgConnection,
        filter: &ItemStatsFilter,
    ) -> AppResult<Vec<CategoryItemStats>> {
        let rows = sqlx::query_as::<_, CategoryItemStats>(
            r#"
            SELECT
                i.category,
                COUNT(*) AS item_count,
                COALESCE(SUM(i.ordered_quantity), 0) AS ordered_quantity,
                COALESCE(SUM(i.received_quantity), 0) AS received_quantity,
                COALESCE(SUM(i.returned_quantity), 0) AS returned_quantity,
                COALESCE(SUM(i.final_price), 0) AS total_value,
                COUNT(*) FILTER (WHERE i.received_quantity > 0 AND i.is_accepted) AS accepted_count,
                COUNT(*) FILTER (WHERE NOT i.is_accepted) AS rejected_count
            FROM procurement_items i
            JOIN procurement_orders o ON o.id = i.order_id AND o.tenant_id = i.tenant_id
            WHERE i.tenant_id = $1
              AND ($2::date IS NULL OR o.order_date >= $2)
              AND ($3::date IS NULL OR o.order_date <= $3)
              AND ($4::varchar IS NULL OR i.category = $4)
              AND ($5::varchar IS NULL OR o.status = $5)
            GROUP BY i.category
            ORDER BY total_value DESC, i.category
            "#,
        )
        .bind(self.tenant_id)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(&filter.category)
        .bind(filter.status)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    // ========================================================================
    // Approval records
    // ========================================================================

    pub async fn approvals(&self, conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<ApprovalRecord>> {
        let rows = sqlx::query_as::<_, ApprovalRecord>(
            r#"
            SELECT id, order_id, approver_id, approver_name, approver_role, action,
                   approval_level, notes, ip_address, created_at
            FROM procurement_approvals
            WHERE order_id = $1 AND tenant_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Record a decision; a second decision by the same approver is refused
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_approval(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        approver: &AuthUser,
        action: ApprovalAction,
        approval_level: Option<i32>,
        notes: Option<&str>,
        ip_address: Option<&str>,
    ) -> AppResult<ApprovalRecord> {
        sqlx::query_as::<_, ApprovalRecord>(
            r#"
            INSERT INTO procurement_approvals (
                tenant_id, order_id, approver_id, approver_name, approver_role, action,
                approval_level, notes, ip_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, order_id, approver_id, approver_name, approver_role, action,
                      approval_level, notes, ip_address, created_at
            "#,
        )
        .bind(self.tenant_id)
        .bind(order_id)
        .bind(approver.user_id)
        .bind(&approver.name)
        .bind(approver.role)
        .bind(action)
        .bind(approval_level)
        .bind(notes)
        .bind(ip_address)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::DuplicateApproval
            } else {
                AppError::DatabaseError(e)
            }
        })
    }

    // ========================================================================
    // Escalations
    // ========================================================================

    pub async fn escalations(&self, conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<Escalation>> {
        let rows = sqlx::query_as::<_, Escalation>(
            r#"
            SELECT id, order_id, escalated_by, escalated_by_name, from_roles, to_role, reason, created_at
            FROM procurement_escalations
            WHERE order_id = $1 AND tenant_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    pub async fn insert_escalation(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        escalated_by: &AuthUser,
        from_roles: &[UserRole],
        to_role: UserRole,
        reason: &str,
    ) -> AppResult<Escalation> {
        let from_roles: Vec<String> = from_roles.iter().map(|r| r.as_str().to_string()).collect();

        let row = sqlx::query_as::<_, Escalation>(
            r#"
            INSERT INTO procurement_escalations (
                tenant_id, order_id, escalated_by, escalated_by_name, from_roles, to_role, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, order_id, escalated_by, escalated_by_name, from_roles, to_role, reason, created_at
            "#,
        )
        .bind(self.tenant_id)
        .bind(order_id)
        .bind(escalated_by.user_id)
        .bind(&escalated_by.name)
        .bind(from_roles)
        .bind(to_role)
        .bind(reason)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }

    // ========================================================================
    // Quality control records
    // ========================================================================

    pub async fn quality_controls(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> AppResult<Vec<QualityControlRecord>> {
        let rows = sqlx::query_as::<_, QualityControlRecord>(
            r#"
            SELECT id, order_id, inspector_id, inspector_name, result, score, photo_count, photos,
                   checklist, total_checkpoints, passed_checkpoints, accepted_lines,
                   rejected_lines, notes, inspected_at
            FROM quality_controls
            WHERE order_id = $1 AND tenant_id = $2
            ORDER BY inspected_at
            "#,
        )
        .bind(order_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    pub async fn insert_quality_control(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        inspector: &AuthUser,
        record: &NewQualityControl,
        inspected_at: DateTime<Utc>,
    ) -> AppResult<QualityControlRecord> {
        let row = sqlx::query_as::<_, QualityControlRecord>(
            r#"
            INSERT INTO quality_controls (
                tenant_id, order_id, inspector_id, inspector_name, result, score, photo_count,
                photos, checklist, total_checkpoints, passed_checkpoints, accepted_lines,
                rejected_lines, notes, inspected_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id, order_id, inspector_id, inspector_name, result, score, photo_count, photos,
                      checklist, total_checkpoints, passed_checkpoints, accepted_lines,
                      rejected_lines, notes, inspected_at
            "#,
        )
        .bind(self.tenant_id)
        .bind(order_id)
        .bind(inspector.user_id)
        .bind(&inspector.name)
        .bind(record.result)
        .bind(record.score)
        .bind(record.photo_count)
        .bind(&record.photos)
        .bind(&record.checklist)
        .bind(record.total_checkpoints)
        .bind(record.passed_checkpoints)
        .bind(record.accepted_lines)
        .bind(record.rejected_lines)
        .bind(&record.notes)
        .bind(inspected_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }
}
