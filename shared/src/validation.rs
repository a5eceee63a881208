//! Validation utilities for SPPG procurement
//!
//! Includes Indonesia-specific helpers (WhatsApp number normalisation).

use rust_decimal::Decimal;

use crate::models::OrderLineInput;

/// Minimum length of a rejection or cancellation reason
pub const MIN_REASON_LENGTH: usize = 10;

/// Largest quantity accepted on one order line
pub const MAX_LINE_QUANTITY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest unit price accepted on one order line (10 trillion)
pub const MAX_PRICE_PER_UNIT: Decimal = Decimal::from_parts(1_316_134_912, 2_328, 0, false, 0);

/// Largest order-level discount or shipping cost (1 quadrillion)
pub const MAX_ORDER_ADJUSTMENT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

// ============================================================================
// Procurement Validations
// ============================================================================

/// Validate a free-text reason (rejection, cancellation, escalation)
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().chars().count() < MIN_REASON_LENGTH {
        return Err("Reason must be at least 10 characters");
    }
    Ok(())
}

/// Validate a refund request against what has already been paid
pub fn validate_refund(refund_amount: Decimal, paid_amount: Decimal) -> Result<(), &'static str> {
    if refund_amount < Decimal::ZERO {
        return Err("Refund amount cannot be negative");
    }
    if refund_amount > paid_amount {
        return Err("Refund amount cannot exceed the amount already paid");
    }
    Ok(())
}

/// Validate the numeric fields of one order line
pub fn validate_order_line(line: &OrderLineInput) -> Result<(), &'static str> {
    if line.ordered_quantity <= Decimal::ZERO {
        return Err("Ordered quantity must be positive");
    }
    if line.ordered_quantity > MAX_LINE_QUANTITY {
        return Err("Ordered quantity exceeds the supported maximum");
    }
    if line.price_per_unit < Decimal::ZERO {
        return Err("Price per unit cannot be negative");
    }
    if line.price_per_unit > MAX_PRICE_PER_UNIT {
        return Err("Price per unit exceeds the supported maximum");
    }
    if line.discount_percent < Decimal::ZERO || line.discount_percent > Decimal::ONE_HUNDRED {
        return Err("Discount percent must be between 0 and 100");
    }
    Ok(())
}

/// Validate order-level adjustments
pub fn validate_order_adjustments(discount: Decimal, shipping_cost: Decimal) -> Result<(), &'static str> {
    if discount < Decimal::ZERO {
        return Err("Discount cannot be negative");
    }
    if shipping_cost < Decimal::ZERO {
        return Err("Shipping cost cannot be negative");
    }
    if discount > MAX_ORDER_ADJUSTMENT || shipping_cost > MAX_ORDER_ADJUSTMENT {
        return Err("Discount or shipping cost exceeds the supported maximum");
    }
    Ok(())
}

/// Validate the total after applying the order discount
pub fn validate_total(total_amount: Decimal) -> Result<(), &'static str> {
    if total_amount < Decimal::ZERO {
        return Err("Order discount cannot exceed subtotal plus tax and shipping");
    }
    Ok(())
}

/// A line linked to an inventory item must use the item's unit
pub fn validate_inventory_unit(line_unit: &str, inventory_unit: &str) -> Result<(), &'static str> {
    if !line_unit.trim().eq_ignore_ascii_case(inventory_unit.trim()) {
        return Err("Line unit does not match the linked inventory item's unit");
    }
    Ok(())
}

/// Validate one receipt line against the item's cumulative state.
///
/// `already_received` / `already_returned` are the item's values before this
/// receipt.
pub fn validate_receipt_line(
    received_quantity: Decimal,
    returned_quantity: Decimal,
    is_accepted: bool,
    rejection_reason: Option<&str>,
    already_received: Decimal,
    already_returned: Decimal,
) -> Result<(), &'static str> {
    if received_quantity < Decimal::ZERO {
        return Err("Received quantity cannot be negative");
    }
    if returned_quantity < Decimal::ZERO {
        return Err("Returned quantity cannot be negative");
    }
    if received_quantity > MAX_LINE_QUANTITY {
        return Err("Received quantity exceeds the supported maximum");
    }
    if returned_quantity > received_quantity {
        return Err("Returned quantity cannot exceed received quantity");
    }
    if already_returned.saturating_add(returned_quantity) > already_received.saturating_add(received_quantity) {
        return Err("Cumulative returned quantity cannot exceed cumulative received quantity");
    }
    if !is_accepted && rejection_reason.map_or(true, |r| r.trim().is_empty()) {
        return Err("Rejection reason is required when an item is not accepted");
    }
    Ok(())
}

// ============================================================================
// Indonesia-Specific Validations
// ============================================================================

/// Normalise an Indonesian mobile number to WhatsApp format (`628…`)
/// Accepts: 081234567890, 0812-3456-7890, +6281234567890, 6281234567890
pub fn normalize_indonesian_phone(phone: &str) -> Result<String, &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = if let Some(rest) = digits.strip_prefix("62") {
        rest
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest
    } else {
        return Err("Invalid Indonesian phone number format");
    };

    // Mobile numbers start with 8 and carry 9-12 digits after the trunk prefix
    if !national.starts_with('8') || !(9..=12).contains(&national.len()) {
        return Err("Invalid Indonesian phone number format");
    }

    Ok(format!("62{}", national))
}

/// Basic email format check
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.ends_with('.') => {
            Ok(())
        }
        _ => Err("Invalid email format"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(qty: &str, price: &str, discount: &str) -> OrderLineInput {
        OrderLineInput {
            item_name: "Beras Medium".to_string(),
            item_code: None,
            category: "KARBOHIDRAT".to_string(),
            brand: None,
            ordered_quantity: dec(qty),
            unit: "kg".to_string(),
            price_per_unit: dec(price),
            discount_percent: dec(discount),
            inventory_item_id: None,
            notes: None,
        }
    }

    // ========================================================================
    // Procurement Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_reason_length() {
        assert!(validate_reason("Harga terlalu tinggi").is_ok());
        assert!(validate_reason("terlalu").is_err());
        assert!(validate_reason("   short    ").is_err());
        assert!(validate_reason("0123456789").is_ok());
    }

    #[test]
    fn test_validate_refund_boundaries() {
        assert!(validate_refund(dec("500000"), dec("500000")).is_ok());
        assert!(validate_refund(dec("500000.01"), dec("500000")).is_err());
        assert!(validate_refund(dec("-1"), dec("500000")).is_err());
    }

    #[test]
    fn test_validate_order_line() {
        assert!(validate_order_line(&line("10", "12000", "0")).is_ok());
        assert!(validate_order_line(&line("0", "12000", "0")).is_err());
        assert!(validate_order_line(&line("10", "-1", "0")).is_err());
        assert!(validate_order_line(&line("10", "12000", "101")).is_err());
    }

    #[test]
    fn test_validate_order_line_upper_bounds() {
        assert!(validate_order_line(&line("1000000000", "10000000000000", "0")).is_ok());
        assert!(validate_order_line(&line("1000000000.001", "1", "0")).is_err());
        assert!(validate_order_line(&line("1", "10000000000000.01", "0")).is_err());
        assert!(validate_order_line(&line("1000000000000000", "1000000000000000", "0")).is_err());
    }

    #[test]
    fn test_bounded_line_always_prices() {
        let pricing = crate::price_line(MAX_LINE_QUANTITY, MAX_PRICE_PER_UNIT, Decimal::ONE_HUNDRED);
        assert_eq!(pricing.unwrap().final_price, Decimal::ZERO);
    }

    #[test]
    fn test_validate_order_adjustments_bounds() {
        assert!(validate_order_adjustments(MAX_ORDER_ADJUSTMENT, MAX_ORDER_ADJUSTMENT).is_ok());
        assert!(validate_order_adjustments(MAX_ORDER_ADJUSTMENT + Decimal::ONE, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_validate_inventory_unit() {
        assert!(validate_inventory_unit("kg", "KG").is_ok());
        assert!(validate_inventory_unit(" liter ", "liter").is_ok());
        assert!(validate_inventory_unit("ikat", "kg").is_err());
    }

    #[test]
    fn test_validate_receipt_line_requires_reason_when_rejected() {
        assert!(validate_receipt_line(dec("5"), dec("0"), false, None, dec("0"), dec("0")).is_err());
        assert!(validate_receipt_line(dec("5"), dec("0"), false, Some("  "), dec("0"), dec("0")).is_err());
        assert!(validate_receipt_line(dec("5"), dec("0"), false, Some("busuk"), dec("0"), dec("0")).is_ok());
    }

    #[test]
    fn test_validate_receipt_line_returned_quantity() {
        assert!(validate_receipt_line(dec("5"), dec("6"), true, None, dec("0"), dec("0")).is_err());
        assert!(validate_receipt_line(dec("5"), dec("5"), true, None, dec("0"), dec("0")).is_ok());
        assert!(validate_receipt_line(dec("2"), dec("2"), true, None, dec("3"), dec("3")).is_ok());
    }

    #[test]
    fn test_validate_receipt_line_upper_bound() {
        let too_many = MAX_LINE_QUANTITY + Decimal::ONE;
        assert!(validate_receipt_line(too_many, dec("0"), true, None, dec("0"), dec("0")).is_err());
        assert!(validate_receipt_line(MAX_LINE_QUANTITY, dec("0"), true, None, Decimal::MAX, dec("0")).is_ok());
    }

    // ========================================================================
    // Indonesia-Specific Validation Tests
    // ========================================================================

    #[test]
    fn test_normalize_indonesian_phone() {
        assert_eq!(normalize_indonesian_phone("081234567890").unwrap(), "6281234567890");
        assert_eq!(normalize_indonesian_phone("0812-3456-7890").unwrap(), "6281234567890");
        assert_eq!(normalize_indonesian_phone("+62 812 3456 7890").unwrap(), "6281234567890");
    }

    #[test]
    fn test_normalize_indonesian_phone_invalid() {
        assert!(normalize_indonesian_phone("0211234567").is_err());
        assert!(normalize_indonesian_phone("12345").is_err());
        assert!(normalize_indonesian_phone("").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("kepala@sppg.id").is_ok());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("no@domain").is_err());
        assert!(validate_email("@sppg.id").is_err());
    }
}
