//! WebAssembly module for the SPPG procurement back-office
//!
//! Provides client-side previews for:
//! - Line pricing and order totals
//! - Initial order status (draft / auto-approved / pending)
//! - Allowed lifecycle operations per status
//! - Reason and QC evidence validation before submit

use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

fn parse_amount(field: &str, value: &str) -> Result<Decimal, JsValue> {
    Decimal::from_str(value.trim())
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", field, e)))
}

fn out_of_range(err: AmountOverflow) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Price one line; amounts are decimal strings to avoid float rounding
#[wasm_bindgen]
pub fn preview_line_price(
    quantity: &str,
    price_per_unit: &str,
    discount_percent: &str,
) -> Result<String, JsValue> {
    let pricing = price_line(
        parse_amount("quantity", quantity)?,
        parse_amount("price_per_unit", price_per_unit)?,
        parse_amount("discount_percent", discount_percent)?,
    )
    .map_err(out_of_range)?;
    to_json(&pricing)
}

/// Compute order totals for a JSON array of order lines
#[wasm_bindgen]
pub fn preview_order_totals(
    lines_json: &str,
    tax_rate_percent: &str,
    discount: &str,
    shipping_cost: &str,
) -> Result<String, JsValue> {
    let lines: Vec<OrderLineInput> = serde_json::from_str(lines_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid lines JSON: {}", e)))?;

    let priced = lines
        .iter()
        .map(|line| price_line(line.ordered_quantity, line.price_per_unit, line.discount_percent))
        .collect::<Result<Vec<LinePricing>, _>>()
        .map_err(out_of_range)?;

    let totals = compute_totals(
        &priced,
        parse_amount("tax_rate_percent", tax_rate_percent)?,
        parse_amount("discount", discount)?,
        parse_amount("shipping_cost", shipping_cost)?,
    )
    .map_err(out_of_range)?;
    to_json(&totals)
}

/// Status a new order would start in; an empty threshold disables auto-approval
#[wasm_bindgen]
pub fn preview_initial_status(
    save_as_draft: bool,
    item_count: u32,
    total_amount: &str,
    auto_approve_threshold: &str,
) -> Result<String, JsValue> {
    let total = parse_amount("total_amount", total_amount)?;
    let threshold = match auto_approve_threshold.trim() {
        "" => None,
        value => Some(parse_amount("auto_approve_threshold", value)?),
    };
    let status = resolve_initial_status(save_as_draft, item_count > 0, total, threshold);
    Ok(status.as_str().to_string())
}

/// Whether `operation` (e.g. `"cancel"`) may be attempted on an order in `status`
#[wasm_bindgen]
pub fn is_operation_allowed(status: &str, operation: &str) -> bool {
    let Some(status) = OrderStatus::parse(status) else {
        return false;
    };
    let Ok(operation) = serde_json::from_value::<OrderOperation>(serde_json::Value::from(operation))
    else {
        return false;
    };
    operation.ensure_allowed_from(status).is_ok()
}

/// Check a rejection/cancellation reason; returns the error message or an empty string
#[wasm_bindgen]
pub fn check_reason(reason: &str) -> String {
    match validate_reason(reason) {
        Ok(()) => String::new(),
        Err(message) => message.to_string(),
    }
}

/// Validate QC evidence against a requirement; returns the violations as JSON
#[wasm_bindgen]
pub fn check_qc_submission(requirement_json: &str, submission_json: &str) -> Result<String, JsValue> {
    let requirement: QcRequirement = serde_json::from_str(requirement_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid requirement JSON: {}", e)))?;
    let submission: QcSubmission = serde_json::from_str(submission_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid submission JSON: {}", e)))?;

    let violations = validate_qc(&requirement, &submission).err().unwrap_or_default();
    to_json(&violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_line_price() {
        let json = preview_line_price("10", "15000", "10").unwrap();
        let pricing: LinePricing = serde_json::from_str(&json).unwrap();
        assert_eq!(pricing.final_price, Decimal::from(135_000));
    }

    #[test]
    fn test_preview_order_totals() {
        let lines = r#"[
            {"item_name":"Beras","category":"KARBOHIDRAT","ordered_quantity":"100","unit":"kg","price_per_unit":"12000"},
            {"item_name":"Ayam","category":"PROTEIN","ordered_quantity":"20","unit":"kg","price_per_unit":"35000","discount_percent":"10"}
        ]"#;
        let json = preview_order_totals(lines, "11", "0", "50000").unwrap();
        let totals: OrderTotals = serde_json::from_str(&json).unwrap();
        assert_eq!(totals.subtotal, Decimal::from(1_830_000));
        assert_eq!(totals.total_amount, Decimal::from(2_081_300));
    }

    #[test]
    fn test_preview_initial_status() {
        assert_eq!(preview_initial_status(false, 2, "50000", "100000").unwrap(), "APPROVED");
        assert_eq!(preview_initial_status(false, 2, "150000", "100000").unwrap(), "PENDING_APPROVAL");
        assert_eq!(preview_initial_status(false, 2, "50000", "").unwrap(), "PENDING_APPROVAL");
        assert_eq!(preview_initial_status(true, 2, "50000", "100000").unwrap(), "DRAFT");
    }

    #[test]
    fn test_is_operation_allowed() {
        assert!(is_operation_allowed("DRAFT", "submit"));
        assert!(!is_operation_allowed("FULLY_RECEIVED", "cancel"));
        assert!(!is_operation_allowed("UNKNOWN", "submit"));
        assert!(!is_operation_allowed("DRAFT", "archive"));
    }

    #[test]
    fn test_check_reason() {
        assert!(check_reason("Harga di atas pagu").is_empty());
        assert!(!check_reason("mahal").is_empty());
    }

    #[test]
    fn test_check_qc_submission() {
        let requirement = r#"{"category":"PROTEIN","min_photos":2,"required_checkpoints":[]}"#;
        let json = check_qc_submission(requirement, r#"{"photos":["a.jpg"]}"#).unwrap();
        assert!(json.contains("insufficient_photos"));
        let json = check_qc_submission(requirement, r#"{"photos":["a.jpg","b.jpg"]}"#).unwrap();
        assert_eq!(json, "[]");
    }
}
