//! Procurement order models: status machine, pricing and order codes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use validator::Validate;

/// Tax rate applied to the order subtotal (PPN 11%)
pub const DEFAULT_TAX_RATE_PERCENT: Decimal = Decimal::from_parts(11, 0, 0, false, 0);

/// Procurement order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(
    feature = "db",
    sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    PendingApproval,
    Approved,
    Ordered,
    PartiallyReceived,
    FullyReceived,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Draft,
        OrderStatus::PendingApproval,
        OrderStatus::Approved,
        OrderStatus::Ordered,
        OrderStatus::PartiallyReceived,
        OrderStatus::FullyReceived,
        OrderStatus::Rejected,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::PendingApproval => "PENDING_APPROVAL",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Ordered => "ORDERED",
            OrderStatus::PartiallyReceived => "PARTIALLY_RECEIVED",
            OrderStatus::FullyReceived => "FULLY_RECEIVED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Statuses that count towards committed category spend
    pub fn commits_budget(&self) -> bool {
        matches!(
            self,
            OrderStatus::PendingApproval
                | OrderStatus::Approved
                | OrderStatus::Ordered
                | OrderStatus::PartiallyReceived
                | OrderStatus::FullyReceived
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::FullyReceived | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    /// Every status reachable from this one in a single transition
    pub fn successors(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Draft => &[PendingApproval, Approved],
            PendingApproval => &[Approved, Rejected],
            Approved => &[Ordered, PartiallyReceived, FullyReceived, Cancelled],
            Ordered => &[PartiallyReceived, FullyReceived, Cancelled],
            PartiallyReceived => &[PartiallyReceived, FullyReceived, Cancelled],
            FullyReceived | Rejected | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery progress of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(
    feature = "db",
    sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    NotScheduled,
    Pending,
    Partial,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::NotScheduled => "NOT_SCHEDULED",
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Partial => "PARTIAL",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Operations that move (or guard) an order through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOperation {
    Update,
    Delete,
    Submit,
    Approve,
    Reject,
    Escalate,
    Place,
    Cancel,
    Receive,
}

impl OrderOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderOperation::Update => "update",
            OrderOperation::Delete => "delete",
            OrderOperation::Submit => "submit",
            OrderOperation::Approve => "approve",
            OrderOperation::Reject => "reject",
            OrderOperation::Escalate => "escalate",
            OrderOperation::Place => "place",
            OrderOperation::Cancel => "cancel",
            OrderOperation::Receive => "receive",
        }
    }

    /// Statuses from which this operation may be attempted
    pub fn allowed_sources(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            OrderOperation::Update => &[Draft, PendingApproval],
            OrderOperation::Delete | OrderOperation::Submit => &[Draft],
            OrderOperation::Approve | OrderOperation::Reject | OrderOperation::Escalate => {
                &[PendingApproval]
            }
            OrderOperation::Place => &[Approved],
            OrderOperation::Cancel | OrderOperation::Receive => {
                &[Approved, Ordered, PartiallyReceived]
            }
        }
    }

    pub fn ensure_allowed_from(&self, current: OrderStatus) -> Result<(), TransitionError> {
        if self.allowed_sources().contains(&current) {
            Ok(())
        } else {
            Err(TransitionError {
                operation: *self,
                current,
                allowed: self.allowed_sources().to_vec(),
            })
        }
    }
}

/// Attempted an operation from a status outside its allowed source set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Cannot {} order in status {current}; allowed statuses: {}",
    .operation.as_str(),
    join_statuses(.allowed)
)]
pub struct TransitionError {
    pub operation: OrderOperation,
    pub current: OrderStatus,
    pub allowed: Vec<OrderStatus>,
}

fn join_statuses(statuses: &[OrderStatus]) -> String {
    statuses
        .iter()
        .map(OrderStatus::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One requested order line
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderLineInput {
    #[validate(length(min = 1, max = 200))]
    pub item_name: String,
    pub item_code: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    pub brand: Option<String>,
    pub ordered_quantity: Decimal,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    pub price_per_unit: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    pub inventory_item_id: Option<uuid::Uuid>,
    pub notes: Option<String>,
}

/// Computed pricing for one order line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    pub total_price: Decimal,
    pub discount_amount: Decimal,
    pub final_price: Decimal,
}

/// Monetary arithmetic left the range a decimal amount can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Amount out of range while computing {0}")]
pub struct AmountOverflow(pub &'static str);

/// Price a line: `final = qty * price - qty * price * discount% / 100`
pub fn price_line(
    quantity: Decimal,
    price_per_unit: Decimal,
    discount_percent: Decimal,
) -> Result<LinePricing, AmountOverflow> {
    let total_price = quantity
        .checked_mul(price_per_unit)
        .ok_or(AmountOverflow("line total"))?;
    let discount_amount = total_price
        .checked_mul(discount_percent)
        .ok_or(AmountOverflow("line discount"))?
        / Decimal::ONE_HUNDRED;
    let final_price = total_price
        .checked_sub(discount_amount)
        .ok_or(AmountOverflow("line final price"))?;
    Ok(LinePricing {
        total_price,
        discount_amount,
        final_price,
    })
}

/// Order-level monetary totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
}

/// Compute order totals from already-priced lines
pub fn compute_totals(
    lines: &[LinePricing],
    tax_rate_percent: Decimal,
    discount: Decimal,
    shipping_cost: Decimal,
) -> Result<OrderTotals, AmountOverflow> {
    let subtotal = lines
        .iter()
        .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.final_price))
        .ok_or(AmountOverflow("order subtotal"))?;
    let tax_amount = subtotal
        .checked_mul(tax_rate_percent)
        .ok_or(AmountOverflow("order tax"))?
        / Decimal::ONE_HUNDRED;
    let total_amount = subtotal
        .checked_add(tax_amount)
        .and_then(|sum| sum.checked_sub(discount))
        .and_then(|sum| sum.checked_add(shipping_cost))
        .ok_or(AmountOverflow("order total"))?;
    Ok(OrderTotals {
        subtotal,
        tax_amount,
        discount,
        shipping_cost,
        total_amount,
    })
}

/// Decide the status a new (or submitted) order starts in
///
/// Drafts stay drafts; otherwise an order at or below the configured
/// auto-approve threshold skips the approval queue.
pub fn resolve_initial_status(
    save_as_draft: bool,
    has_items: bool,
    total_amount: Decimal,
    auto_approve_threshold: Option<Decimal>,
) -> OrderStatus {
    if save_as_draft || !has_items {
        return OrderStatus::Draft;
    }
    match auto_approve_threshold {
        Some(threshold) if total_amount <= threshold => OrderStatus::Approved,
        _ => OrderStatus::PendingApproval,
    }
}

/// Format a tenant-monthly order code, e.g. `ORD-202510-0007`
pub fn format_order_code(year: i32, month: u32, sequence: i64) -> String {
    format!("ORD-{:04}{:02}-{:04}", year, month, sequence)
}

/// Period key used by the per-tenant order sequence, e.g. `202510`
pub fn order_code_period(year: i32, month: u32) -> String {
    format!("{:04}{:02}", year, month)
}

/// Ordered vs cumulative received quantity of one item after a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptProgress {
    pub ordered_quantity: Decimal,
    pub received_quantity: Decimal,
}

/// Status after a receipt: fully received iff every item met its ordered quantity
pub fn resolve_receipt_status(items: &[ReceiptProgress]) -> OrderStatus {
    let complete = !items.is_empty()
        && items
            .iter()
            .all(|item| item.received_quantity >= item.ordered_quantity);
    if complete {
        OrderStatus::FullyReceived
    } else {
        OrderStatus::PartiallyReceived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_default_tax_rate_is_eleven_percent() {
        assert_eq!(DEFAULT_TAX_RATE_PERCENT, Decimal::from(11));
    }

    #[test]
    fn test_price_line_with_discount() {
        let pricing = price_line(dec("10"), dec("15000"), dec("10")).unwrap();
        assert_eq!(pricing.total_price, dec("150000"));
        assert_eq!(pricing.discount_amount, dec("15000"));
        assert_eq!(pricing.final_price, dec("135000"));
    }

    #[test]
    fn test_compute_totals() {
        let lines = [
            price_line(dec("10"), dec("10000"), Decimal::ZERO).unwrap(),
            price_line(dec("5"), dec("20000"), Decimal::ZERO).unwrap(),
        ];
        let totals = compute_totals(&lines, DEFAULT_TAX_RATE_PERCENT, dec("5000"), dec("25000")).unwrap();
        assert_eq!(totals.subtotal, dec("200000"));
        assert_eq!(totals.tax_amount, dec("22000"));
        assert_eq!(totals.total_amount, dec("242000"));
    }

    #[test]
    fn test_price_line_overflow_is_an_error() {
        let huge = dec("1000000000000000");
        assert_eq!(
            price_line(huge, huge, Decimal::ZERO),
            Err(AmountOverflow("line total"))
        );
    }

    #[test]
    fn test_compute_totals_overflow_is_an_error() {
        let line = LinePricing {
            total_price: Decimal::MAX,
            discount_amount: Decimal::ZERO,
            final_price: Decimal::MAX,
        };
        assert!(compute_totals(&[line, line], DEFAULT_TAX_RATE_PERCENT, Decimal::ZERO, Decimal::ZERO).is_err());
        assert!(compute_totals(&[line], DEFAULT_TAX_RATE_PERCENT, Decimal::ZERO, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_order_code_format() {
        assert_eq!(format_order_code(2025, 3, 7), "ORD-202503-0007");
        assert_eq!(format_order_code(2025, 12, 12345), "ORD-202512-12345");
        assert_eq!(order_code_period(2025, 3), "202503");
    }

    #[test]
    fn test_transition_error_names_current_and_allowed() {
        let err = OrderOperation::Cancel
            .ensure_allowed_from(OrderStatus::Draft)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("DRAFT"));
        assert!(message.contains("APPROVED, ORDERED, PARTIALLY_RECEIVED"));
    }

    #[test]
    fn test_terminal_statuses_have_no_successors() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), status.successors().is_empty());
        }
    }

    #[test]
    fn test_empty_receipt_is_partial() {
        assert_eq!(resolve_receipt_status(&[]), OrderStatus::PartiallyReceived);
    }
}
