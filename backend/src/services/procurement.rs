//! Procurement order lifecycle
//!
//! Every transition locks the order row, re-checks the status and any
//! duplicate-decision rule inside the same transaction, and only then
//! writes. Notifications go out after commit.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    compute_totals, evaluate_approval, format_order_code, order_code_period,
    resolve_initial_status, resolve_receipt_status, spend_by_category, validate_order_adjustments,
    validate_order_line, validate_reason, validate_receipt_line, validate_refund, ApprovalAction,
    ApprovalError, DeliveryStatus, LinePricing, OrderLineInput, OrderOperation, OrderStatus,
    OrderTotals, PaginatedResponse, Pagination, PaginationMeta, PriorDecision, ProcurementAction,
    QcSubmission, UserRole,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    ApprovalRecord, AuditEntry, Escalation, ProcurementItem, ProcurementOrder, QualityControlRecord,
    StockMovement,
};
use crate::repository::{
    InventoryLink, NewOrder, NewOrderItem, NewQualityControl, OrderFilter, ReceiptLineUpdate,
    TenantScope,
};
use crate::services::approval::{self, ApprovalStatusView};
use crate::services::audit::{self, ENTITY_ORDER};
use crate::services::notification::{Notification, NotificationService};
use crate::services::{budget, inventory, quality_control};

/// Role an escalation is routed to when the caller names none
const DEFAULT_ESCALATION_ROLE: UserRole = UserRole::SppgKepala;

/// Procurement order service
#[derive(Clone)]
pub struct ProcurementService {
    db: PgPool,
    tax_rate_percent: Decimal,
    notifications: NotificationService,
}

// ============================================================================
// Inputs
// ============================================================================

/// Input for creating an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub plan_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub supplier_name: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery: Option<NaiveDate>,
    #[validate(length(max = 40))]
    pub payment_terms: Option<String>,
    pub payment_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Keep the order as an editable draft instead of submitting it
    #[serde(default)]
    pub save_as_draft: bool,
    #[serde(default)]
    pub items: Vec<OrderLineInput>,
}

/// Input for updating an editable order. Omitted fields keep their value;
/// a present `items` list replaces the whole item set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderInput {
    pub supplier_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub supplier_name: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
    #[validate(length(max = 40))]
    pub payment_terms: Option<String>,
    pub payment_due_date: Option<NaiveDate>,
    pub discount: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub items: Option<Vec<OrderLineInput>>,
}

/// Query parameters for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
    pub supplier_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl OrderListQuery {
    pub fn filter(&self) -> OrderFilter {
        OrderFilter {
            status: self.status,
            supplier_id: self.supplier_id,
            plan_id: self.plan_id,
            date_from: self.date_from,
            date_to: self.date_to,
            search: self.search.clone(),
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ApproveInput {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectInput {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct EscalateInput {
    pub reason: String,
    pub to_role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct CancelInput {
    pub reason: String,
    pub refund_amount: Option<Decimal>,
}

/// One line of a receipt
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceiveLineInput {
    pub item_id: Uuid,
    pub received_quantity: Decimal,
    #[serde(default)]
    pub returned_quantity: Decimal,
    #[serde(default = "default_accepted")]
    pub is_accepted: bool,
    #[validate(length(max = 500))]
    pub rejection_reason: Option<String>,
    #[validate(length(max = 20))]
    pub quality_grade: Option<String>,
    #[validate(length(max = 1000))]
    pub quality_notes: Option<String>,
    #[validate(length(max = 100))]
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

fn default_accepted() -> bool {
    true
}

/// Goods receipt with its inspection evidence
#[derive(Debug, Deserialize)]
pub struct ReceiveInput {
    pub actual_delivery: Option<NaiveDate>,
    pub items: Vec<ReceiveLineInput>,
    #[serde(default)]
    pub qc: QcSubmission,
}

// ============================================================================
// Outputs
// ============================================================================

/// Order with everything recorded against it
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: ProcurementOrder,
    pub items: Vec<ProcurementItem>,
    pub approvals: Vec<ApprovalRecord>,
    pub escalations: Vec<Escalation>,
    pub quality_controls: Vec<QualityControlRecord>,
}

/// Result of a receipt
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptOutcome {
    #[serde(flatten)]
    pub detail: OrderDetail,
    pub stock_movements: Vec<StockMovement>,
}

/// Audit trail and stock ledger of one order
#[derive(Debug, Clone, Serialize)]
pub struct OrderHistory {
    pub order_id: Uuid,
    pub audit_trail: Vec<AuditEntry>,
    pub stock_movements: Vec<StockMovement>,
}

// ============================================================================
// Helpers shared with item operations
// ============================================================================

pub(crate) fn rule_violation(field: &'static str, message_ind: &'static str) -> impl FnOnce(&'static str) -> AppError {
    move |message| AppError::validation(field, message, message_ind)
}

/// Validate and price the requested lines
pub(crate) fn priced_lines(lines: &[OrderLineInput]) -> AppResult<Vec<NewOrderItem>> {
    lines
        .iter()
        .map(|line| -> AppResult<NewOrderItem> {
            line.validate()?;
            validate_order_line(line).map_err(rule_violation("items", "Baris pesanan tidak valid"))?;
            NewOrderItem::from_input(line)
        })
        .collect()
}

/// Compute and check order totals
pub(crate) fn checked_totals(
    lines: &[LinePricing],
    tax_rate_percent: Decimal,
    discount: Decimal,
    shipping_cost: Decimal,
) -> AppResult<OrderTotals> {
    validate_order_adjustments(discount, shipping_cost)
        .map_err(rule_violation("discount", "Diskon dan ongkos kirim tidak boleh negatif"))?;
    let totals = compute_totals(lines, tax_rate_percent, discount, shipping_cost)?;
    shared::validate_total(totals.total_amount).map_err(rule_violation(
        "discount",
        "Diskon tidak boleh melebihi subtotal ditambah pajak dan ongkos kirim",
    ))?;
    Ok(totals)
}

pub(crate) fn apply_totals(order: &mut ProcurementOrder, totals: &OrderTotals) {
    order.subtotal = totals.subtotal;
    order.tax_amount = totals.tax_amount;
    order.discount = totals.discount;
    order.shipping_cost = totals.shipping_cost;
    order.total_amount = totals.total_amount;
}

/// Category spend of persisted items
pub(crate) fn item_spend(items: &[ProcurementItem]) -> AppResult<std::collections::BTreeMap<String, Decimal>> {
    Ok(spend_by_category(items.iter().map(|i| (i.category.as_str(), i.pricing())))?)
}

/// Append a narrative line to the order's internal notes
pub(crate) fn narrate(order: &mut ProcurementOrder, user: &AuthUser, action: &str, detail: Option<&str>) {
    let line = audit::narrative_line(user, action, detail, Utc::now());
    order.internal_notes = Some(audit::append_narrative(order.internal_notes.as_deref(), &line));
}

pub(crate) async fn load_detail(
    conn: &mut PgConnection,
    scope: &TenantScope,
    order: ProcurementOrder,
) -> AppResult<OrderDetail> {
    let items = scope.order_items(conn, order.id).await?;
    let approvals = scope.approvals(conn, order.id).await?;
    let escalations = scope.escalations(conn, order.id).await?;
    let quality_controls = scope.quality_controls(conn, order.id).await?;
    Ok(OrderDetail {
        order,
        items,
        approvals,
        escalations,
        quality_controls,
    })
}

/// Every linked inventory item must exist in this tenant and share the line's unit
pub(crate) async fn ensure_inventory_links(
    conn: &mut PgConnection,
    scope: &TenantScope,
    links: &[InventoryLink],
) -> AppResult<()> {
    for link in links {
        let Some((item_name, unit)) = scope.inventory_item_unit(conn, link.inventory_item_id).await? else {
            return Err(AppError::validation(
                "inventory_item_id",
                "Linked inventory item does not exist",
                "Item inventaris yang ditautkan tidak ditemukan",
            ));
        };
        inventory::ensure_unit_matches(&link.unit, &unit, &item_name)?;
    }
    Ok(())
}

/// Inventory links carried by a set of new lines
pub(crate) fn inventory_links(lines: &[NewOrderItem]) -> Vec<InventoryLink> {
    lines.iter().filter_map(NewOrderItem::inventory_link).collect()
}

fn approval_refusal(err: ApprovalError) -> AppError {
    match err {
        ApprovalError::DuplicateDecision => AppError::DuplicateApproval,
        ApprovalError::RoleNotPermitted { role, pending } => {
            AppError::ApproverNotEligible { role, pending }
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProcurementService {
    pub fn new(db: PgPool, config: &Config, notifications: NotificationService) -> Self {
        Self {
            notifications,
            tax_rate_percent: config.procurement.tax_rate_percent,
            db,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn list_orders(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        query: OrderListQuery,
    ) -> AppResult<PaginatedResponse<ProcurementOrder>> {
        user.require(ProcurementAction::View)?;
        let pagination = query.pagination();
        let mut conn = self.db.acquire().await?;
        let (data, total) = scope
            .list_orders(&mut conn, &query.filter(), &pagination)
            .await?;
        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&pagination, total),
        })
    }

    pub async fn get_order(&self, scope: TenantScope, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetail> {
        user.require(ProcurementAction::View)?;
        let mut conn = self.db.acquire().await?;
        let order = scope.find_order(&mut conn, order_id).await?;
        load_detail(&mut conn, &scope, order).await
    }

    /// Required, approved and pending roles of an order
    pub async fn approval_status(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        order_id: Uuid,
    ) -> AppResult<ApprovalStatusView> {
        user.require(ProcurementAction::View)?;
        let mut conn = self.db.acquire().await?;
        let order = scope.find_order(&mut conn, order_id).await?;
        let settings = scope.settings(&mut conn).await?;
        let requirement =
            approval::resolve_requirement(&mut conn, &scope, &settings, order.total_amount).await?;
        let approvals = scope.approvals(&mut conn, order.id).await?;
        let escalations = scope.escalations(&mut conn, order.id).await?;

        Ok(ApprovalStatusView::build(
            order.id,
            order.status,
            order.total_amount,
            requirement,
            approvals,
            escalations,
        ))
    }

    /// Audit entries and stock movements recorded for an order
    pub async fn order_history(&self, scope: TenantScope, user: &AuthUser, order_id: Uuid) -> AppResult<OrderHistory> {
        user.require(ProcurementAction::View)?;
        let mut conn = self.db.acquire().await?;
        let order = scope.find_order(&mut conn, order_id).await?;
        let audit_trail = scope.audit_trail(&mut conn, order.id).await?;
        let stock_movements = scope.stock_movements_for_reference(&mut conn, order.id).await?;
        Ok(OrderHistory {
            order_id: order.id,
            audit_trail,
            stock_movements,
        })
    }

    // ========================================================================
    // Creation and editing
    // ========================================================================

    /// Create an order as draft, pending approval or auto-approved
    pub async fn create_order(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        input: CreateOrderInput,
    ) -> AppResult<OrderDetail> {
        user.require(ProcurementAction::Create)?;
        input.validate()?;
        if input.supplier_id.is_none() && trimmed(input.supplier_name.clone()).is_none() {
            return Err(AppError::validation(
                "supplier_name",
                "Either a supplier or a supplier name is required",
                "Pemasok atau nama pemasok wajib diisi",
            ));
        }

        let lines = priced_lines(&input.items)?;
        let pricing: Vec<LinePricing> = lines.iter().map(|l| l.pricing).collect();
        let totals = checked_totals(&pricing, self.tax_rate_percent, input.discount, input.shipping_cost)?;

        let now = Utc::now();
        let order_date = input.order_date.unwrap_or_else(|| now.date_naive());

        let mut tx = self.db.begin().await?;
        ensure_inventory_links(&mut tx, &scope, &inventory_links(&lines)).await?;
        let settings = scope.settings(&mut tx).await?;
        let status = resolve_initial_status(
            input.save_as_draft,
            !lines.is_empty(),
            totals.total_amount,
            settings.auto_approve_threshold,
        );

        let sequence = scope
            .next_order_sequence(&mut tx, &order_code_period(now.year(), now.month()))
            .await?;
        let order_code = format_order_code(now.year(), now.month(), sequence);

        let mut order = scope
            .insert_order(
                &mut tx,
                &NewOrder {
                    order_code,
                    plan_id: input.plan_id,
                    supplier_id: input.supplier_id,
                    supplier_name: trimmed(input.supplier_name),
                    status,
                    order_date,
                    expected_delivery: input.expected_delivery,
                    totals,
                    payment_terms: trimmed(input.payment_terms)
                        .or_else(|| settings.default_payment_term.clone()),
                    payment_due_date: input.payment_due_date,
                    notes: trimmed(input.notes),
                    internal_notes: None,
                    approved_by: None,
                    created_by: user.user_id,
                },
            )
            .await?;
        scope.insert_items(&mut tx, order.id, &lines).await?;

        if status != OrderStatus::Draft {
            let spend = spend_by_category(lines.iter().map(|l| (l.category.as_str(), l.pricing)))?;
            budget::enforce(&mut tx, &scope, user, order_date, &spend, Some(order.id)).await?;
        }

        let detail = match status {
            OrderStatus::Approved => Some("auto-approved under threshold"),
            _ => None,
        };
        narrate(&mut order, user, status.as_str(), detail);
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        let approver_roles = if status == OrderStatus::PendingApproval {
            approval::resolve_requirement(&mut tx, &scope, &settings, order.total_amount)
                .await?
                .roles
        } else {
            Vec::new()
        };

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "CREATE",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Created order {} as {}", order.order_code, order.status),
                    Some(serde_json::json!({
                        "total_amount": order.total_amount,
                        "item_count": lines.len(),
                    })),
                ),
            )
            .await?;

        let detail = load_detail(&mut tx, &scope, order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %detail.order.id,
            order_code = %detail.order.order_code,
            status = %detail.order.status,
            "Procurement order created"
        );

        if settings.notify_on_submit && !approver_roles.is_empty() {
            self.request_approval(scope, &detail.order, &approver_roles);
        }

        Ok(detail)
    }

    /// Update an order while it is still editable
    pub async fn update_order(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> AppResult<OrderDetail> {
        user.require(ProcurementAction::Update)?;
        input.validate()?;
        let new_lines = input.items.as_deref().map(priced_lines).transpose()?;

        let mut tx = self.db.begin().await?;
        let mut order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Update.ensure_allowed_from(order.status)?;

        let items = match &new_lines {
            Some(lines) => {
                if order.status == OrderStatus::PendingApproval
                    && !scope.approvals(&mut tx, order.id).await?.is_empty()
                {
                    return Err(AppError::precondition(
                        "Items cannot change after approvers have started deciding",
                        "Item tidak dapat diubah setelah proses persetujuan dimulai",
                    ));
                }
                ensure_inventory_links(&mut tx, &scope, &inventory_links(lines)).await?;
                scope.replace_items(&mut tx, order.id, lines).await?
            }
            None => scope.order_items(&mut tx, order.id).await?,
        };

        if order.status == OrderStatus::PendingApproval && items.is_empty() {
            return Err(AppError::precondition(
                "An order awaiting approval must keep at least one item",
                "Pesanan yang menunggu persetujuan harus memiliki minimal satu item",
            ));
        }

        if let Some(supplier_id) = input.supplier_id {
            order.supplier_id = Some(supplier_id);
        }
        if let Some(name) = trimmed(input.supplier_name) {
            order.supplier_name = Some(name);
        }
        if input.expected_delivery.is_some() {
            order.expected_delivery = input.expected_delivery;
        }
        if let Some(terms) = trimmed(input.payment_terms) {
            order.payment_terms = Some(terms);
        }
        if input.payment_due_date.is_some() {
            order.payment_due_date = input.payment_due_date;
        }
        if input.notes.is_some() {
            order.notes = trimmed(input.notes);
        }

        let pricing: Vec<LinePricing> = items.iter().map(ProcurementItem::pricing).collect();
        let totals = checked_totals(
            &pricing,
            self.tax_rate_percent,
            input.discount.unwrap_or(order.discount),
            input.shipping_cost.unwrap_or(order.shipping_cost),
        )?;
        apply_totals(&mut order, &totals);

        if order.status == OrderStatus::PendingApproval {
            budget::enforce(&mut tx, &scope, user, order.order_date, &item_spend(&items)?, Some(order.id))
                .await?;
        }

        let detail = new_lines.as_ref().map(|l| format!("{} item(s) replaced", l.len()));
        narrate(&mut order, user, "UPDATED", detail.as_deref());
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "UPDATE",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Updated order {}", order.order_code),
                    Some(serde_json::json!({ "total_amount": order.total_amount })),
                ),
            )
            .await?;

        let detail = load_detail(&mut tx, &scope, order).await?;
        tx.commit().await?;

        Ok(detail)
    }

    /// Hard-delete a draft together with its items
    pub async fn delete_order(&self, scope: TenantScope, user: &AuthUser, order_id: Uuid) -> AppResult<()> {
        user.require(ProcurementAction::Delete)?;

        let mut tx = self.db.begin().await?;
        let order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Delete.ensure_allowed_from(order.status)?;

        scope.delete_order(&mut tx, order.id).await?;
        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "DELETE",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Deleted draft order {}", order.order_code),
                    None,
                ),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, order_code = %order.order_code, "Draft order deleted");
        Ok(())
    }

    // ========================================================================
    // Approval workflow
    // ========================================================================

    /// Move a draft into the approval queue, or straight to approved when it
    /// falls under the auto-approve threshold
    pub async fn submit_order(&self, scope: TenantScope, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetail> {
        user.require(ProcurementAction::Submit)?;

        let mut tx = self.db.begin().await?;
        let mut order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Submit.ensure_allowed_from(order.status)?;

        let items = scope.order_items(&mut tx, order.id).await?;
        if items.is_empty() {
            return Err(AppError::precondition(
                "An order needs at least one item before it can be submitted",
                "Pesanan harus memiliki minimal satu item sebelum diajukan",
            ));
        }

        let settings = scope.settings(&mut tx).await?;
        let status = resolve_initial_status(
            false,
            true,
            order.total_amount,
            settings.auto_approve_threshold,
        );
        budget::enforce(&mut tx, &scope, user, order.order_date, &item_spend(&items)?, Some(order.id))
            .await?;

        order.status = status;
        let detail = match status {
            OrderStatus::Approved => Some("auto-approved under threshold"),
            _ => None,
        };
        narrate(&mut order, user, "SUBMITTED", detail);
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        let approver_roles = if status == OrderStatus::PendingApproval {
            approval::resolve_requirement(&mut tx, &scope, &settings, order.total_amount)
                .await?
                .roles
        } else {
            Vec::new()
        };

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "SUBMIT",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Submitted order {} as {}", order.order_code, order.status),
                    None,
                ),
            )
            .await?;

        let detail = load_detail(&mut tx, &scope, order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %detail.order.id, status = %detail.order.status, "Order submitted");

        if settings.notify_on_submit && !approver_roles.is_empty() {
            self.request_approval(scope, &detail.order, &approver_roles);
        }

        Ok(detail)
    }

    /// Record an approval; the order is approved once every required role has signed
    pub async fn approve_order(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        order_id: Uuid,
        input: ApproveInput,
        ip_address: Option<String>,
    ) -> AppResult<OrderDetail> {
        input.validate()?;
        let notes = trimmed(input.notes);

        let mut tx = self.db.begin().await?;
        let mut order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Approve.ensure_allowed_from(order.status)?;

        let settings = scope.settings(&mut tx).await?;
        let requirement =
            approval::resolve_requirement(&mut tx, &scope, &settings, order.total_amount).await?;
        let prior: Vec<PriorDecision> = scope
            .approvals(&mut tx, order.id)
            .await?
            .iter()
            .map(ApprovalRecord::decision)
            .collect();

        let outcome =
            evaluate_approval(&requirement, &prior, user.user_id, user.role).map_err(approval_refusal)?;

        scope
            .insert_approval(
                &mut tx,
                order.id,
                user,
                ApprovalAction::Approved,
                requirement.level.as_ref().map(|l| l.level),
                notes.as_deref(),
                ip_address.as_deref(),
            )
            .await?;

        order.status = outcome.next_status;
        if outcome.next_status == OrderStatus::Approved {
            order.approved_by = Some(user.user_id);
            order.approved_at = Some(Utc::now());
        }
        narrate(&mut order, user, "APPROVED", notes.as_deref());
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        let pending: Vec<&str> = outcome.pending_roles.iter().map(UserRole::as_str).collect();
        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "APPROVE",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Approved order {} ({})", order.order_code, order.status),
                    Some(serde_json::json!({ "pending_roles": pending })),
                ),
            )
            .await?;

        let detail = load_detail(&mut tx, &scope, order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %detail.order.id,
            approver = %user.user_id,
            role = %user.role,
            status = %detail.order.status,
            "Approval recorded"
        );

        if detail.order.status == OrderStatus::Approved && settings.notify_on_decision {
            let notification = Notification::decided(
                detail.order.id,
                &detail.order.order_code,
                true,
                &user.name,
                None,
            );
            self.notifications
                .notify_user(scope, detail.order.created_by, notification);
        }

        Ok(detail)
    }

    pub async fn reject_order(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        order_id: Uuid,
        input: RejectInput,
        ip_address: Option<String>,
    ) -> AppResult<OrderDetail> {
        user.require(ProcurementAction::Reject)?;
        validate_reason(&input.reason)
            .map_err(rule_violation("reason", "Alasan penolakan minimal 10 karakter"))?;
        let reason = input.reason.trim().to_string();

        let mut tx = self.db.begin().await?;
        let mut order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Reject.ensure_allowed_from(order.status)?;

        let approvals = scope.approvals(&mut tx, order.id).await?;
        if approvals.iter().any(|a| a.approver_id == user.user_id) {
            return Err(AppError::DuplicateApproval);
        }

        scope
            .insert_approval(
                &mut tx,
                order.id,
                user,
                ApprovalAction::Rejected,
                None,
                Some(&reason),
                ip_address.as_deref(),
            )
            .await?;

        order.status = OrderStatus::Rejected;
        order.rejection_reason = Some(reason.clone());
        narrate(&mut order, user, "REJECTED", Some(&reason));
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "REJECT",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Rejected order {}: {}", order.order_code, reason),
                    None,
                ),
            )
            .await?;

        let settings = scope.settings(&mut tx).await?;
        let detail = load_detail(&mut tx, &scope, order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %detail.order.id, reviewer = %user.user_id, "Order rejected");

        if settings.notify_on_decision {
            let notification = Notification::decided(
                detail.order.id,
                &detail.order.order_code,
                false,
                &user.name,
                Some(&reason),
            );
            self.notifications
                .notify_user(scope, detail.order.created_by, notification);
        }

        Ok(detail)
    }

    /// Raise visibility of a stalled approval; the order status is unchanged
    pub async fn escalate_order(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        order_id: Uuid,
        input: EscalateInput,
    ) -> AppResult<Escalation> {
        user.require(ProcurementAction::Escalate)?;
        validate_reason(&input.reason)
            .map_err(rule_violation("reason", "Alasan eskalasi minimal 10 karakter"))?;
        let reason = input.reason.trim().to_string();
        let to_role = input.to_role.unwrap_or(DEFAULT_ESCALATION_ROLE);

        let mut tx = self.db.begin().await?;
        let mut order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Escalate.ensure_allowed_from(order.status)?;

        let settings = scope.settings(&mut tx).await?;
        let requirement =
            approval::resolve_requirement(&mut tx, &scope, &settings, order.total_amount).await?;
        let approvals = scope.approvals(&mut tx, order.id).await?;
        let pending = requirement.pending_roles(&approval::approved_roles(&approvals));

        let escalation = scope
            .insert_escalation(&mut tx, order.id, user, &pending, to_role, &reason)
            .await?;

        narrate(
            &mut order,
            user,
            "ESCALATED",
            Some(&format!("to {}: {}", to_role, reason)),
        );
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "ESCALATE",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Escalated order {} to {}", order.order_code, to_role),
                    Some(serde_json::json!({
                        "from_roles": escalation.from_roles,
                        "to_role": to_role,
                        "reason": reason,
                    })),
                ),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, to_role = %to_role, "Approval escalated");

        let notification = Notification::escalated(order.id, &order.order_code, &user.name, &reason);
        self.notifications.notify_roles(scope, vec![to_role], notification);

        Ok(escalation)
    }

    // ========================================================================
    // Fulfilment
    // ========================================================================

    /// Send an approved order to the supplier
    pub async fn place_order(&self, scope: TenantScope, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetail> {
        user.require(ProcurementAction::Place)?;

        let mut tx = self.db.begin().await?;
        let mut order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Place.ensure_allowed_from(order.status)?;

        order.status = OrderStatus::Ordered;
        order.delivery_status = DeliveryStatus::Pending;
        order.ordered_at = Some(Utc::now());
        let supplier = order.supplier_name.clone();
        narrate(&mut order, user, "ORDERED", supplier.as_deref());
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "PLACE",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Placed order {} with supplier", order.order_code),
                    None,
                ),
            )
            .await?;

        let detail = load_detail(&mut tx, &scope, order).await?;
        tx.commit().await?;

        Ok(detail)
    }

    pub async fn cancel_order(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        order_id: Uuid,
        input: CancelInput,
    ) -> AppResult<OrderDetail> {
        user.require(ProcurementAction::Cancel)?;
        validate_reason(&input.reason)
            .map_err(rule_violation("reason", "Alasan pembatalan minimal 10 karakter"))?;
        let reason = input.reason.trim().to_string();

        let mut tx = self.db.begin().await?;
        let mut order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Cancel.ensure_allowed_from(order.status)?;

        if let Some(refund) = input.refund_amount {
            validate_refund(refund, order.paid_amount).map_err(rule_violation(
                "refund_amount",
                "Jumlah refund tidak boleh melebihi jumlah yang sudah dibayar",
            ))?;
        }

        let now = Utc::now();
        order.status = OrderStatus::Cancelled;
        order.delivery_status = DeliveryStatus::Cancelled;
        order.cancellation_reason = Some(reason.clone());
        order.refund_amount = input.refund_amount;
        order.cancelled_by = Some(user.user_id);
        order.cancelled_at = Some(now);
        narrate(&mut order, user, "CANCELLED", Some(&reason));
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "CANCEL",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Cancelled order {}: {}", order.order_code, reason),
                    Some(serde_json::json!({ "refund_amount": order.refund_amount })),
                ),
            )
            .await?;

        let detail = load_detail(&mut tx, &scope, order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %detail.order.id, "Order cancelled");
        Ok(detail)
    }

    /// Record delivered goods.
    ///
    /// The QC gate runs before anything is written. Accepted quantities of
    /// lines linked to inventory go into stock with a ledger entry each.
    pub async fn receive_order(
        &self,
        scope: TenantScope,
        user: &AuthUser,
        order_id: Uuid,
        input: ReceiveInput,
    ) -> AppResult<ReceiptOutcome> {
        user.require(ProcurementAction::Receive)?;
        if input.items.is_empty() {
            return Err(AppError::validation(
                "items",
                "A receipt needs at least one line",
                "Penerimaan harus memiliki minimal satu baris",
            ));
        }
        let mut seen = BTreeSet::new();
        for line in &input.items {
            line.validate()?;
            if !seen.insert(line.item_id) {
                return Err(AppError::validation(
                    "items",
                    "Each item may appear only once per receipt",
                    "Setiap item hanya boleh muncul sekali per penerimaan",
                ));
            }
        }

        let mut tx = self.db.begin().await?;
        let mut order = scope.lock_order(&mut tx, order_id).await?;
        OrderOperation::Receive.ensure_allowed_from(order.status)?;

        let items = scope.lock_order_items(&mut tx, order.id).await?;
        let by_id: HashMap<Uuid, &ProcurementItem> = items.iter().map(|i| (i.id, i)).collect();

        let mut categories = BTreeSet::new();
        for line in &input.items {
            let item = by_id
                .get(&line.item_id)
                .ok_or_else(|| AppError::NotFound("Procurement item".to_string()))?;
            validate_receipt_line(
                line.received_quantity,
                line.returned_quantity,
                line.is_accepted,
                line.rejection_reason.as_deref(),
                item.received_quantity,
                item.returned_quantity,
            )
            .map_err(rule_violation("items", "Baris penerimaan tidak valid"))?;
            categories.insert(item.category.clone());
        }

        let settings = scope.settings(&mut tx).await?;
        let categories: Vec<String> = categories.into_iter().collect();
        let requirement =
            quality_control::requirement_for(&mut tx, &scope, &settings, &categories).await?;
        let summary = quality_control::enforce(&requirement, &input.qc)?;

        let mut stock_movements = Vec::new();
        let mut rejected_lines = 0;
        for line in &input.items {
            let updated = scope
                .apply_receipt_line(
                    &mut tx,
                    line.item_id,
                    &ReceiptLineUpdate {
                        received_quantity: line.received_quantity,
                        returned_quantity: line.returned_quantity,
                        is_accepted: line.is_accepted,
                        rejection_reason: if line.is_accepted {
                            None
                        } else {
                            trimmed(line.rejection_reason.clone())
                        },
                        quality_grade: trimmed(line.quality_grade.clone()),
                        quality_notes: trimmed(line.quality_notes.clone()),
                        batch_number: trimmed(line.batch_number.clone()),
                        expiry_date: line.expiry_date,
                    },
                )
                .await?;

            if !line.is_accepted {
                rejected_lines += 1;
                continue;
            }
            let accepted = line.received_quantity - line.returned_quantity;
            if let Some(movement) = inventory::receive_stock(
                &mut tx,
                &scope,
                user,
                &updated,
                order.id,
                &order.order_code,
                accepted,
            )
            .await?
            {
                stock_movements.push(movement);
            }
        }

        let progress: Vec<_> = scope
            .order_items(&mut tx, order.id)
            .await?
            .iter()
            .map(ProcurementItem::progress)
            .collect();
        let status = resolve_receipt_status(&progress);

        let photos: BTreeSet<String> = input
            .qc
            .photos
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let line_count = i32::try_from(input.items.len()).unwrap_or(i32::MAX);
        let now = Utc::now();
        scope
            .insert_quality_control(
                &mut tx,
                order.id,
                user,
                &NewQualityControl {
                    result: summary.result(rejected_lines > 0),
                    score: summary.score,
                    photo_count: i32::try_from(summary.photo_count).unwrap_or(i32::MAX),
                    photos: photos.into_iter().collect(),
                    checklist: serde_json::to_value(&input.qc.checklist)
                        .map_err(|e| AppError::Internal(e.to_string()))?,
                    total_checkpoints: i32::try_from(summary.total_checkpoints).unwrap_or(i32::MAX),
                    passed_checkpoints: i32::try_from(summary.passed_checkpoints).unwrap_or(i32::MAX),
                    accepted_lines: line_count - rejected_lines,
                    rejected_lines,
                    notes: trimmed(input.qc.inspector_notes.clone()),
                },
                now,
            )
            .await?;

        order.status = status;
        order.delivery_status = if status == OrderStatus::FullyReceived {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Partial
        };
        order.actual_delivery = Some(input.actual_delivery.unwrap_or_else(|| now.date_naive()));
        narrate(
            &mut order,
            user,
            status.as_str(),
            Some(&format!(
                "{} line(s) received, {} rejected",
                input.items.len(),
                rejected_lines
            )),
        );
        let order = scope.save_order(&mut tx, &order, user.user_id).await?;

        scope
            .record_audit(
                &mut tx,
                &audit::entry(
                    user,
                    "RECEIVE",
                    ENTITY_ORDER,
                    Some(order.id),
                    format!("Received goods for order {} ({})", order.order_code, order.status),
                    Some(serde_json::json!({
                        "lines": input.items.len(),
                        "rejected_lines": rejected_lines,
                        "stock_movements": stock_movements.len(),
                    })),
                ),
            )
            .await?;

        let detail = load_detail(&mut tx, &scope, order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %detail.order.id,
            status = %detail.order.status,
            movements = stock_movements.len(),
            "Goods received"
        );

        if settings.notify_on_receive {
            let notification = Notification::received(
                detail.order.id,
                &detail.order.order_code,
                detail.order.status == OrderStatus::FullyReceived,
            );
            self.notifications
                .notify_user(scope, detail.order.created_by, notification);
        }

        Ok(ReceiptOutcome {
            detail,
            stock_movements,
        })
    }

    fn request_approval(&self, scope: TenantScope, order: &ProcurementOrder, roles: &[UserRole]) {
        let notification =
            Notification::approval_requested(order.id, &order.order_code, order.total_amount, roles);
        self.notifications.notify_roles(scope, roles.to_vec(), notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(category: &str, qty: &str, price: &str) -> OrderLineInput {
        OrderLineInput {
            item_name: "Daging sapi".to_string(),
            item_code: None,
            category: category.to_string(),
            brand: None,
            ordered_quantity: dec(qty),
            unit: "kg".to_string(),
            price_per_unit: dec(price),
            discount_percent: Decimal::ZERO,
            inventory_item_id: None,
            notes: None,
        }
    }

    #[test]
    fn test_priced_lines_normalize_category() {
        let lines = priced_lines(&[line(" protein ", "10", "100000")]).unwrap();
        assert_eq!(lines[0].category, "PROTEIN");
        assert_eq!(lines[0].pricing.final_price, dec("1000000"));
    }

    #[test]
    fn test_priced_lines_reject_zero_quantity() {
        let err = priced_lines(&[line("PROTEIN", "0", "1000")]).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));
    }

    #[test]
    fn test_priced_lines_reject_oversized_line_without_panicking() {
        let err = priced_lines(&[line("PROTEIN", "1000000000000000", "1000000000000000")]).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));
    }

    #[test]
    fn test_checked_totals_reports_overflow() {
        let huge = shared::LinePricing {
            total_price: Decimal::MAX,
            discount_amount: Decimal::ZERO,
            final_price: Decimal::MAX,
        };
        let err = checked_totals(&[huge, huge], dec("11"), Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_inventory_links_carry_line_units() {
        let stock_id = Uuid::new_v4();
        let mut linked = line("PROTEIN", "5", "100000");
        linked.inventory_item_id = Some(stock_id);
        linked.unit = " kg ".to_string();
        let lines = priced_lines(&[linked, line("SAYURAN", "3", "5000")]).unwrap();

        assert_eq!(
            inventory_links(&lines),
            vec![InventoryLink {
                inventory_item_id: stock_id,
                unit: "kg".to_string(),
            }]
        );
    }

    #[test]
    fn test_checked_totals_rejects_oversized_discount() {
        let pricing = [shared::price_line(dec("1"), dec("1000"), Decimal::ZERO).unwrap()];
        assert!(checked_totals(&pricing, dec("11"), dec("5000"), Decimal::ZERO).is_err());
        let totals = checked_totals(&pricing, dec("11"), dec("110"), Decimal::ZERO).unwrap();
        assert_eq!(totals.total_amount, dec("1000"));
    }

    #[test]
    fn test_approval_refusal_mapping() {
        assert!(matches!(
            approval_refusal(ApprovalError::DuplicateDecision),
            AppError::DuplicateApproval
        ));
        let err = approval_refusal(ApprovalError::RoleNotPermitted {
            role: UserRole::SppgAkuntan,
            pending: vec![UserRole::SppgKepala],
        });
        assert!(matches!(err, AppError::ApproverNotEligible { .. }));
    }

    #[test]
    fn test_list_query_defaults() {
        let query = OrderListQuery::default();
        let pagination = query.pagination();
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.per_page, 20);
        assert!(query.filter().status.is_none());
    }
}
