//! Approval policy tests
//!
//! Tests for the approval resolver including:
//! - Property 8: Level Resolution
//! - Property 9: Parallel Approval Completion
//! - Property 10: One Decision Per Approver

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    evaluate_approval, resolve_approval_level, ApprovalAction, ApprovalError, ApprovalLevel,
    ApprovalMode, ApprovalRequirement, OrderStatus, PriorDecision, RolePolicy, ProcurementAction,
    UserRole, FALLBACK_APPROVER_ROLES,
};
use uuid::Uuid;

fn level(n: i32, min: i64, max: Option<i64>, role: UserRole) -> ApprovalLevel {
    ApprovalLevel {
        level: n,
        level_name: format!("Level {}", n),
        min_amount: Decimal::from(min),
        max_amount: max.map(Decimal::from),
        required_role: role,
        is_active: true,
    }
}

/// Three contiguous tiers: admin < 5M <= akuntan < 20M <= kepala
fn tiers() -> Vec<ApprovalLevel> {
    vec![
        level(1, 0, Some(5_000_000), UserRole::SppgAdmin),
        level(2, 5_000_000, Some(20_000_000), UserRole::SppgAkuntan),
        level(3, 20_000_000, None, UserRole::SppgKepala),
    ]
}

fn approved(role: UserRole) -> PriorDecision {
    PriorDecision {
        approver_id: Uuid::new_v4(),
        role,
        action: ApprovalAction::Approved,
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 8: Level Resolution
    /// The matched level always contains the amount
    #[test]
    fn test_matched_level_contains_amount(amount in 0i64..=100_000_000i64) {
        let levels = tiers();
        let amount = Decimal::from(amount);
        let matched = resolve_approval_level(&levels, amount);
        prop_assert!(matched.is_some());
        prop_assert!(matched.unwrap().contains(amount));
    }

    /// Property 9: Parallel Approval Completion
    /// Every tier role must approve before the order becomes APPROVED
    #[test]
    fn test_parallel_requires_every_tier(amount in 20_000_000i64..=100_000_000i64) {
        let levels = tiers();
        let requirement = ApprovalRequirement::resolve(
            &levels,
            Decimal::from(amount),
            Some(Decimal::from(10_000_000)),
        );
        prop_assert_eq!(requirement.mode, ApprovalMode::Parallel);
        prop_assert_eq!(requirement.roles.len(), 3);

        let mut prior = Vec::new();
        for (i, role) in requirement.roles.clone().into_iter().enumerate() {
            let outcome = evaluate_approval(&requirement, &prior, Uuid::new_v4(), role).unwrap();
            if i + 1 < requirement.roles.len() {
                prop_assert_eq!(outcome.next_status, OrderStatus::PendingApproval);
            } else {
                prop_assert_eq!(outcome.next_status, OrderStatus::Approved);
            }
            prior.push(approved(role));
        }
    }

    /// Property 10: One Decision Per Approver
    #[test]
    fn test_same_approver_refused_twice(amount in 0i64..=4_999_999i64) {
        let requirement = ApprovalRequirement::resolve(&tiers(), Decimal::from(amount), None);
        let approver = Uuid::new_v4();
        let prior = [PriorDecision {
            approver_id: approver,
            role: UserRole::SppgAdmin,
            action: ApprovalAction::Rejected,
        }];
        let result = evaluate_approval(&requirement, &prior, approver, UserRole::SppgAdmin);
        prop_assert_eq!(result, Err(ApprovalError::DuplicateDecision));
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_level_boundary_goes_to_upper_tier() {
        let levels = tiers();
        assert_eq!(resolve_approval_level(&levels, Decimal::from(4_999_999)).unwrap().level, 1);
        assert_eq!(resolve_approval_level(&levels, Decimal::from(5_000_000)).unwrap().level, 2);
        assert_eq!(resolve_approval_level(&levels, Decimal::from(20_000_000)).unwrap().level, 3);
    }

    #[test]
    fn test_single_mode_below_parallel_threshold() {
        let requirement = ApprovalRequirement::resolve(
            &tiers(),
            Decimal::from(7_000_000),
            Some(Decimal::from(10_000_000)),
        );
        assert_eq!(requirement.mode, ApprovalMode::Single);
        assert_eq!(requirement.roles, vec![UserRole::SppgAkuntan]);

        let outcome =
            evaluate_approval(&requirement, &[], Uuid::new_v4(), UserRole::SppgAkuntan).unwrap();
        assert_eq!(outcome.next_status, OrderStatus::Approved);
        assert!(outcome.pending_roles.is_empty());
    }

    #[test]
    fn test_parallel_threshold_is_inclusive() {
        let requirement = ApprovalRequirement::resolve(
            &tiers(),
            Decimal::from(10_000_000),
            Some(Decimal::from(10_000_000)),
        );
        assert_eq!(requirement.mode, ApprovalMode::Parallel);
        assert_eq!(requirement.roles, vec![UserRole::SppgAdmin, UserRole::SppgAkuntan]);
    }

    #[test]
    fn test_wrong_role_refused_with_pending_roles() {
        let requirement = ApprovalRequirement::resolve(&tiers(), Decimal::from(1_000), None);
        let err = evaluate_approval(&requirement, &[], Uuid::new_v4(), UserRole::SppgViewer)
            .unwrap_err();
        assert_eq!(
            err,
            ApprovalError::RoleNotPermitted {
                role: UserRole::SppgViewer,
                pending: vec![UserRole::SppgAdmin],
            }
        );
    }

    /// A second user with an already-approved role cannot approve again
    #[test]
    fn test_role_already_approved_in_parallel() {
        let requirement = ApprovalRequirement::resolve(
            &tiers(),
            Decimal::from(25_000_000),
            Some(Decimal::from(10_000_000)),
        );
        let prior = [approved(UserRole::SppgAdmin)];
        let result = evaluate_approval(&requirement, &prior, Uuid::new_v4(), UserRole::SppgAdmin);
        assert!(matches!(result, Err(ApprovalError::RoleNotPermitted { .. })));
    }

    #[test]
    fn test_superadmin_completes_parallel_approval() {
        let requirement = ApprovalRequirement::resolve(
            &tiers(),
            Decimal::from(25_000_000),
            Some(Decimal::from(10_000_000)),
        );
        let outcome = evaluate_approval(
            &requirement,
            &[],
            Uuid::new_v4(),
            UserRole::PlatformSuperadmin,
        )
        .unwrap();
        assert_eq!(outcome.next_status, OrderStatus::Approved);
    }

    #[test]
    fn test_fallback_roles_without_levels() {
        let requirement = ApprovalRequirement::resolve(&[], Decimal::from(1_000), None);
        assert_eq!(requirement.roles, FALLBACK_APPROVER_ROLES.to_vec());
        assert!(evaluate_approval(&requirement, &[], Uuid::new_v4(), UserRole::SppgKepala).is_ok());
        assert!(evaluate_approval(&requirement, &[], Uuid::new_v4(), UserRole::SppgAkuntan).is_err());
    }

    #[test]
    fn test_role_policy_table() {
        assert!(RolePolicy::allows(UserRole::SppgStaffQc, ProcurementAction::Receive));
        assert!(!RolePolicy::allows(UserRole::SppgStaffQc, ProcurementAction::Cancel));
        assert!(!RolePolicy::allows(UserRole::SppgViewer, ProcurementAction::Create));
        assert!(RolePolicy::allows(UserRole::PlatformSuperadmin, ProcurementAction::ManageSettings));
    }
}
