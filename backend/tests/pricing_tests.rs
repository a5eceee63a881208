//! Order pricing tests
//!
//! Tests for line pricing and order totals including:
//! - Property 1: Line Pricing Identity
//! - Property 2: Order Totals Identity
//! - Property 3: Order Code Format
//! - Property 15: Bounded Lines Always Price

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    compute_totals, format_order_code, price_line, validate_order_adjustments, validate_order_line,
    validate_total, AmountOverflow, LinePricing, OrderLineInput, DEFAULT_TAX_RATE_PERCENT,
    MAX_LINE_QUANTITY, MAX_PRICE_PER_UNIT,
};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Strategies
// ============================================================================

/// Quantities with up to 3 decimals, as entered for kg/liter items
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000i64).prop_map(|milli| Decimal::new(milli, 3))
}

/// Unit prices in whole rupiah
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=5_000_000i64).prop_map(Decimal::from)
}

fn discount_percent_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|bp| Decimal::new(bp, 2))
}

fn line_strategy() -> impl Strategy<Value = LinePricing> {
    (quantity_strategy(), price_strategy(), discount_percent_strategy())
        .prop_map(|(qty, price, discount)| price_line(qty, price, discount).unwrap())
}

fn order_line(qty: Decimal, price: Decimal) -> OrderLineInput {
    OrderLineInput {
        item_name: "Telur ayam".to_string(),
        item_code: None,
        category: "PROTEIN".to_string(),
        brand: None,
        ordered_quantity: qty,
        unit: "kg".to_string(),
        price_per_unit: price,
        discount_percent: Decimal::ZERO,
        inventory_item_id: None,
        notes: None,
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 1: Line Pricing Identity
    /// final = total - discount, total = qty * price
    #[test]
    fn test_line_pricing_identity(
        qty in quantity_strategy(),
        price in price_strategy(),
        discount in discount_percent_strategy()
    ) {
        let pricing = price_line(qty, price, discount).unwrap();
        prop_assert_eq!(pricing.total_price, qty * price);
        prop_assert_eq!(pricing.final_price, pricing.total_price - pricing.discount_amount);
        prop_assert!(pricing.final_price >= Decimal::ZERO);
        prop_assert!(pricing.final_price <= pricing.total_price);
    }

    /// Property 2: Order Totals Identity
    /// total = subtotal + tax - discount + shipping
    #[test]
    fn test_order_totals_identity(
        lines in prop::collection::vec(line_strategy(), 1..20),
        discount in (0i64..=100_000i64).prop_map(Decimal::from),
        shipping in (0i64..=500_000i64).prop_map(Decimal::from)
    ) {
        let totals = compute_totals(&lines, DEFAULT_TAX_RATE_PERCENT, discount, shipping).unwrap();
        let subtotal: Decimal = lines.iter().map(|l| l.final_price).sum();

        prop_assert_eq!(totals.subtotal, subtotal);
        prop_assert_eq!(totals.tax_amount, subtotal * dec("11") / dec("100"));
        prop_assert_eq!(
            totals.total_amount,
            totals.subtotal + totals.tax_amount - totals.discount + totals.shipping_cost
        );
    }

    /// Property 2: Zero discount and shipping leaves total = subtotal * 1.11
    #[test]
    fn test_totals_without_adjustments(
        lines in prop::collection::vec(line_strategy(), 1..10)
    ) {
        let totals = compute_totals(&lines, DEFAULT_TAX_RATE_PERCENT, Decimal::ZERO, Decimal::ZERO).unwrap();
        prop_assert_eq!(totals.total_amount, totals.subtotal * dec("1.11"));
    }

    /// Property 15: Any line that passes validation prices without overflow
    #[test]
    fn test_validated_lines_always_price(
        qty in 1i64..=i64::MAX,
        price in 0i64..=i64::MAX,
        scale in 0u32..=6
    ) {
        let line = order_line(Decimal::new(qty, scale), Decimal::from(price));
        let pricing = price_line(line.ordered_quantity, line.price_per_unit, Decimal::ONE_HUNDRED);
        if validate_order_line(&line).is_ok() {
            prop_assert!(pricing.is_ok());
        }
    }

    /// Property 3: Order Code Format
    #[test]
    fn test_order_code_format(
        year in 2020..=2099i32,
        month in 1..=12u32,
        sequence in 1..=9999i64
    ) {
        let code = format_order_code(year, month, sequence);
        prop_assert_eq!(code.len(), 15);
        prop_assert!(code.starts_with("ORD-"));

        let parts: Vec<&str> = code.split('-').collect();
        prop_assert_eq!(parts.len(), 3);
        prop_assert_eq!(parts[1].len(), 6);
        prop_assert_eq!(parts[2].parse::<i64>().unwrap(), sequence);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Worked example: 100 kg beras at 12,000 with 5% discount
    #[test]
    fn test_beras_line() {
        let pricing = price_line(dec("100"), dec("12000"), dec("5")).unwrap();
        assert_eq!(pricing.total_price, dec("1200000"));
        assert_eq!(pricing.discount_amount, dec("60000"));
        assert_eq!(pricing.final_price, dec("1140000"));
    }

    #[test]
    fn test_full_discount_is_free() {
        let pricing = price_line(dec("3"), dec("5000"), dec("100")).unwrap();
        assert_eq!(pricing.final_price, Decimal::ZERO);
    }

    #[test]
    fn test_order_with_discount_and_shipping() {
        let lines = [
            price_line(dec("50"), dec("35000"), Decimal::ZERO).unwrap(),
            price_line(dec("20"), dec("8000"), dec("10")).unwrap(),
        ];
        let totals = compute_totals(&lines, DEFAULT_TAX_RATE_PERCENT, dec("50000"), dec("75000")).unwrap();

        assert_eq!(totals.subtotal, dec("1894000"));
        assert_eq!(totals.tax_amount, dec("208340"));
        assert_eq!(totals.total_amount, dec("2127340"));
    }

    #[test]
    fn test_no_lines_yields_zero_subtotal() {
        let totals = compute_totals(&[], DEFAULT_TAX_RATE_PERCENT, Decimal::ZERO, dec("10000")).unwrap();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total_amount, dec("10000"));
    }

    #[test]
    fn test_discount_larger_than_order_rejected() {
        let lines = [price_line(dec("1"), dec("10000"), Decimal::ZERO).unwrap()];
        let totals = compute_totals(&lines, DEFAULT_TAX_RATE_PERCENT, dec("20000"), Decimal::ZERO).unwrap();
        assert!(validate_total(totals.total_amount).is_err());
    }

    #[test]
    fn test_negative_adjustments_rejected() {
        assert!(validate_order_adjustments(dec("-1"), Decimal::ZERO).is_err());
        assert!(validate_order_adjustments(Decimal::ZERO, dec("-0.01")).is_err());
        assert!(validate_order_adjustments(Decimal::ZERO, Decimal::ZERO).is_ok());
    }

    /// A quadrillion units at a quadrillion each is refused, never a panic
    #[test]
    fn test_oversized_line_is_refused() {
        let huge = dec("1000000000000000");
        assert!(validate_order_line(&order_line(huge, huge)).is_err());
        assert_eq!(
            price_line(huge, huge, Decimal::ZERO),
            Err(AmountOverflow("line total"))
        );
    }

    #[test]
    fn test_largest_valid_line_prices() {
        let line = order_line(MAX_LINE_QUANTITY, MAX_PRICE_PER_UNIT);
        assert!(validate_order_line(&line).is_ok());
        let pricing = price_line(line.ordered_quantity, line.price_per_unit, Decimal::ZERO).unwrap();
        assert_eq!(pricing.final_price, MAX_LINE_QUANTITY * MAX_PRICE_PER_UNIT);
    }
}
