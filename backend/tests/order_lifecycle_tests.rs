//! Order lifecycle tests
//!
//! Tests for the order state machine including:
//! - Property 4: Transition Guard Consistency
//! - Property 5: Terminal Status Finality
//! - Property 6: Receipt Status Resolution
//! - Property 7: Initial Status Resolution

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    resolve_initial_status, resolve_receipt_status, validate_reason, validate_receipt_line,
    validate_refund, OrderOperation, OrderStatus, ReceiptProgress,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

const OPERATIONS: [OrderOperation; 9] = [
    OrderOperation::Update,
    OrderOperation::Delete,
    OrderOperation::Submit,
    OrderOperation::Approve,
    OrderOperation::Reject,
    OrderOperation::Escalate,
    OrderOperation::Place,
    OrderOperation::Cancel,
    OrderOperation::Receive,
];

fn status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

fn operation_strategy() -> impl Strategy<Value = OrderOperation> {
    prop::sample::select(OPERATIONS.to_vec())
}

fn progress_strategy() -> impl Strategy<Value = ReceiptProgress> {
    (1i64..=10_000i64, 0i64..=12_000i64).prop_map(|(ordered, received)| ReceiptProgress {
        ordered_quantity: Decimal::from(ordered),
        received_quantity: Decimal::from(received),
    })
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 4: Transition Guard Consistency
    /// An operation is allowed exactly from its declared source statuses
    #[test]
    fn test_guard_matches_allowed_sources(
        status in status_strategy(),
        operation in operation_strategy()
    ) {
        let allowed = operation.allowed_sources().contains(&status);
        prop_assert_eq!(operation.ensure_allowed_from(status).is_ok(), allowed);
    }

    /// Property 4: A refused transition reports the current and allowed statuses
    #[test]
    fn test_guard_error_carries_context(
        status in status_strategy(),
        operation in operation_strategy()
    ) {
        if let Err(err) = operation.ensure_allowed_from(status) {
            prop_assert_eq!(err.current, status);
            prop_assert_eq!(err.allowed.as_slice(), operation.allowed_sources());
            prop_assert!(err.to_string().contains(status.as_str()));
        }
    }

    /// Property 5: Terminal Status Finality
    #[test]
    fn test_terminal_statuses_accept_no_operation(
        status in status_strategy(),
        operation in operation_strategy()
    ) {
        if status.is_terminal() {
            prop_assert!(operation.ensure_allowed_from(status).is_err());
        }
    }

    /// Property 6: Receipt Status Resolution
    /// Fully received iff every item reached its ordered quantity
    #[test]
    fn test_receipt_status_resolution(
        items in prop::collection::vec(progress_strategy(), 1..15)
    ) {
        let complete = items.iter().all(|i| i.received_quantity >= i.ordered_quantity);
        let expected = if complete {
            OrderStatus::FullyReceived
        } else {
            OrderStatus::PartiallyReceived
        };
        prop_assert_eq!(resolve_receipt_status(&items), expected);
    }

    /// Property 7: Initial Status Resolution
    /// Drafts never leave DRAFT; otherwise the auto-approve threshold decides
    #[test]
    fn test_initial_status_resolution(
        draft in any::<bool>(),
        total in (0i64..=10_000_000i64).prop_map(Decimal::from),
        threshold in prop::option::of((0i64..=10_000_000i64).prop_map(Decimal::from))
    ) {
        let status = resolve_initial_status(draft, true, total, threshold);
        if draft {
            prop_assert_eq!(status, OrderStatus::Draft);
        } else if threshold.is_some_and(|t| total <= t) {
            prop_assert_eq!(status, OrderStatus::Approved);
        } else {
            prop_assert_eq!(status, OrderStatus::PendingApproval);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(OrderStatus::PendingApproval.as_str(), "PENDING_APPROVAL");
        assert_eq!(OrderStatus::parse("FULLY_RECEIVED"), Some(OrderStatus::FullyReceived));
        assert_eq!(OrderStatus::parse("pending_approval"), None);
    }

    #[test]
    fn test_only_drafts_can_be_submitted_or_deleted() {
        for status in OrderStatus::ALL {
            let draft = status == OrderStatus::Draft;
            assert_eq!(OrderOperation::Submit.ensure_allowed_from(status).is_ok(), draft);
            assert_eq!(OrderOperation::Delete.ensure_allowed_from(status).is_ok(), draft);
        }
    }

    #[test]
    fn test_receive_requires_placed_or_approved_order() {
        assert!(OrderOperation::Receive.ensure_allowed_from(OrderStatus::Approved).is_ok());
        assert!(OrderOperation::Receive.ensure_allowed_from(OrderStatus::Ordered).is_ok());
        assert!(OrderOperation::Receive
            .ensure_allowed_from(OrderStatus::PartiallyReceived)
            .is_ok());
        assert!(OrderOperation::Receive
            .ensure_allowed_from(OrderStatus::PendingApproval)
            .is_err());
    }

    #[test]
    fn test_cancel_message_lists_allowed_statuses() {
        let err = OrderOperation::Cancel
            .ensure_allowed_from(OrderStatus::FullyReceived)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("FULLY_RECEIVED"));
        assert!(message.contains("APPROVED"));
        assert!(message.contains("ORDERED"));
    }

    #[test]
    fn test_committing_statuses() {
        assert!(!OrderStatus::Draft.commits_budget());
        assert!(OrderStatus::PendingApproval.commits_budget());
        assert!(OrderStatus::FullyReceived.commits_budget());
        assert!(!OrderStatus::Rejected.commits_budget());
        assert!(!OrderStatus::Cancelled.commits_budget());
    }

    /// Auto-approve at 100,000: 50,000 skips approval, 100,000.01 does not
    #[test]
    fn test_auto_approve_threshold_boundary() {
        let threshold = Some(dec("100000"));
        assert_eq!(
            resolve_initial_status(false, true, dec("50000"), threshold),
            OrderStatus::Approved
        );
        assert_eq!(
            resolve_initial_status(false, true, dec("100000"), threshold),
            OrderStatus::Approved
        );
        assert_eq!(
            resolve_initial_status(false, true, dec("100000.01"), threshold),
            OrderStatus::PendingApproval
        );
        assert_eq!(
            resolve_initial_status(false, true, dec("50000"), None),
            OrderStatus::PendingApproval
        );
    }

    #[test]
    fn test_order_without_items_stays_draft() {
        assert_eq!(
            resolve_initial_status(false, false, Decimal::ZERO, Some(dec("100000"))),
            OrderStatus::Draft
        );
    }

    #[test]
    fn test_partial_then_full_receipt() {
        let first = [
            ReceiptProgress { ordered_quantity: dec("100"), received_quantity: dec("60") },
            ReceiptProgress { ordered_quantity: dec("20"), received_quantity: dec("20") },
        ];
        assert_eq!(resolve_receipt_status(&first), OrderStatus::PartiallyReceived);

        let second = [
            ReceiptProgress { ordered_quantity: dec("100"), received_quantity: dec("100") },
            ReceiptProgress { ordered_quantity: dec("20"), received_quantity: dec("20") },
        ];
        assert_eq!(resolve_receipt_status(&second), OrderStatus::FullyReceived);
    }

    #[test]
    fn test_over_receipt_counts_as_full() {
        let items = [ReceiptProgress { ordered_quantity: dec("10"), received_quantity: dec("12") }];
        assert_eq!(resolve_receipt_status(&items), OrderStatus::FullyReceived);
    }

    /// Refund equal to the paid amount is accepted, a cent more is not
    #[test]
    fn test_refund_boundary() {
        let paid = dec("750000");
        assert!(validate_refund(paid, paid).is_ok());
        assert!(validate_refund(paid + dec("0.01"), paid).is_err());
        assert!(validate_refund(Decimal::ZERO, Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_reason_minimum_length() {
        assert!(validate_reason("Tidak sesuai anggaran").is_ok());
        assert!(validate_reason("mahal").is_err());
        assert!(validate_reason("          ").is_err());
    }

    #[test]
    fn test_receipt_line_cumulative_returns() {
        // 5 received and 5 returned earlier, 0 more received: returning 1 more is refused
        assert!(validate_receipt_line(dec("0"), dec("1"), true, None, dec("5"), dec("5")).is_err());
        assert!(validate_receipt_line(dec("4"), dec("1"), true, None, dec("5"), dec("5")).is_ok());
    }
}
