//! CSV export of procurement orders

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{Pagination, ProcurementAction};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::ProcurementOrder;
use crate::repository::TenantScope;
use crate::services::procurement::OrderListQuery;

/// Export service
#[derive(Clone)]
pub struct ExportService {
    db: PgPool,
}

/// One flattened order row
#[derive(Debug, Serialize)]
pub struct OrderCsvRow {
    pub order_code: String,
    pub status: &'static str,
    pub delivery_status: &'static str,
    pub supplier_name: String,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub actual_delivery: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub payment_terms: String,
}

impl From<&ProcurementOrder> for OrderCsvRow {
    fn from(order: &ProcurementOrder) -> Self {
        Self {
            order_code: order.order_code.clone(),
            status: order.status.as_str(),
            delivery_status: order.delivery_status.as_str(),
            supplier_name: order.supplier_name.clone().unwrap_or_default(),
            order_date: order.order_date,
            expected_delivery: order.expected_delivery,
            actual_delivery: order.actual_delivery,
            subtotal: order.subtotal,
            tax_amount: order.tax_amount,
            discount: order.discount,
            shipping_cost: order.shipping_cost,
            total_amount: order.total_amount,
            paid_amount: order.paid_amount,
            payment_terms: order.payment_terms.clone().unwrap_or_default(),
        }
    }
}

/// Serialize rows as CSV with a header line
pub fn to_csv<T: Serialize>(rows: &[T]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
}

impl ExportService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Every order matching the list filters, newest first
    pub async fn export_orders(&self, scope: TenantScope, user: &AuthUser, query: OrderListQuery) -> AppResult<String> {
        user.require(ProcurementAction::View)?;
        let filter = query.filter();
        let mut conn = self.db.acquire().await?;

        let mut rows = Vec::new();
        let mut page = 1;
        loop {
            let pagination = Pagination::from_query(Some(page), Some(Pagination::MAX_PER_PAGE));
            let (orders, total) = scope.list_orders(&mut conn, &filter, &pagination).await?;
            let fetched = orders.len();
            rows.extend(orders.iter().map(OrderCsvRow::from));
            if fetched == 0 || rows.len() as u64 >= total {
                break;
            }
            page += 1;
        }

        tracing::debug!(rows = rows.len(), "Exporting procurement orders");
        to_csv(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        code: &'static str,
        total: Decimal,
    }

    #[test]
    fn test_to_csv_writes_header_and_rows() {
        let csv = to_csv(&[
            Row { code: "ORD-202510-0001", total: Decimal::new(24200000, 2) },
            Row { code: "ORD-202510-0002", total: Decimal::from(50_000) },
        ])
        .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "code,total");
        assert_eq!(lines[1], "ORD-202510-0001,242000.00");
        assert_eq!(lines.len(), 3);
    }
}
