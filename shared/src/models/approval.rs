//! Approval levels and the approval policy resolver

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{OrderStatus, UserRole};

/// Roles that may approve when a tenant has not configured any approval level
pub const FALLBACK_APPROVER_ROLES: &[UserRole] = &[UserRole::SppgKepala, UserRole::SppgAdmin];

/// An amount-range-to-role tier configured per tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    pub level: i32,
    pub level_name: String,
    pub min_amount: Decimal,
    /// `None` means unbounded
    pub max_amount: Option<Decimal>,
    pub required_role: UserRole,
    pub is_active: bool,
}

impl ApprovalLevel {
    /// `[min_amount, max_amount)`; an unbounded level contains everything above `min_amount`
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && self.max_amount.map_or(true, |max| amount < max)
    }
}

/// Pick the lowest-numbered active level whose range contains `amount`
pub fn resolve_approval_level(levels: &[ApprovalLevel], amount: Decimal) -> Option<&ApprovalLevel> {
    levels
        .iter()
        .filter(|level| level.is_active && level.contains(amount))
        .min_by_key(|level| level.level)
}

/// How the required roles must sign off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalMode {
    /// Any one of the required roles completes the approval
    Single,
    /// Every required role must approve independently
    Parallel,
}

/// Outcome of resolving the approval policy for one order amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    pub level: Option<ApprovalLevel>,
    pub mode: ApprovalMode,
    pub roles: Vec<UserRole>,
}

impl ApprovalRequirement {
    /// Resolve who must approve an order of `amount`.
    ///
    /// When the amount reaches `parallel_threshold`, every active tier up to
    /// and including the matched one must approve; otherwise the matched tier's
    /// role alone is enough. Without a matching tier the fallback role set
    /// applies and any one of them may approve.
    pub fn resolve(
        levels: &[ApprovalLevel],
        amount: Decimal,
        parallel_threshold: Option<Decimal>,
    ) -> Self {
        let Some(matched) = resolve_approval_level(levels, amount) else {
            return Self {
                level: None,
                mode: ApprovalMode::Single,
                roles: FALLBACK_APPROVER_ROLES.to_vec(),
            };
        };

        let parallel = parallel_threshold.is_some_and(|threshold| amount >= threshold);
        if !parallel {
            return Self {
                level: Some(matched.clone()),
                mode: ApprovalMode::Single,
                roles: vec![matched.required_role],
            };
        }

        let mut tiers: Vec<&ApprovalLevel> = levels
            .iter()
            .filter(|level| level.is_active && level.level <= matched.level)
            .collect();
        tiers.sort_by_key(|level| level.level);

        let mut roles = Vec::with_capacity(tiers.len());
        for tier in tiers {
            if !roles.contains(&tier.required_role) {
                roles.push(tier.required_role);
            }
        }

        let mode = if roles.len() > 1 {
            ApprovalMode::Parallel
        } else {
            ApprovalMode::Single
        };

        Self {
            level: Some(matched.clone()),
            mode,
            roles,
        }
    }

    /// Required roles that have not approved yet
    pub fn pending_roles(&self, approved: &[UserRole]) -> Vec<UserRole> {
        if approved.iter().any(UserRole::is_superadmin) {
            return Vec::new();
        }
        match self.mode {
            ApprovalMode::Single => {
                if self.roles.iter().any(|role| approved.contains(role)) {
                    Vec::new()
                } else {
                    self.roles.clone()
                }
            }
            ApprovalMode::Parallel => self
                .roles
                .iter()
                .filter(|role| !approved.contains(role))
                .copied()
                .collect(),
        }
    }

    pub fn is_satisfied(&self, approved: &[UserRole]) -> bool {
        self.pending_roles(approved).is_empty()
    }

    pub fn is_parallel(&self) -> bool {
        self.mode == ApprovalMode::Parallel
    }
}

/// Decision recorded by one approver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(
    feature = "db",
    sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    Approved,
    Rejected,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Approved => "APPROVED",
            ApprovalAction::Rejected => "REJECTED",
        }
    }
}

/// Minimal view of an existing approval record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorDecision {
    pub approver_id: Uuid,
    pub role: UserRole,
    pub action: ApprovalAction,
}

/// Why an approval attempt was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("Approver has already recorded a decision on this order")]
    DuplicateDecision,

    #[error("Role {role} cannot approve this order; pending roles: {}", join_roles(.pending))]
    RoleNotPermitted {
        role: UserRole,
        pending: Vec<UserRole>,
    },
}

fn join_roles(roles: &[UserRole]) -> String {
    roles
        .iter()
        .map(UserRole::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of a successful approval evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub next_status: OrderStatus,
    pub pending_roles: Vec<UserRole>,
}

/// Evaluate an approval attempt against the requirement and the decisions
/// already recorded on the order.
pub fn evaluate_approval(
    requirement: &ApprovalRequirement,
    prior: &[PriorDecision],
    approver_id: Uuid,
    role: UserRole,
) -> Result<ApprovalOutcome, ApprovalError> {
    if prior.iter().any(|decision| decision.approver_id == approver_id) {
        return Err(ApprovalError::DuplicateDecision);
    }

    let mut approved: Vec<UserRole> = prior
        .iter()
        .filter(|decision| decision.action == ApprovalAction::Approved)
        .map(|decision| decision.role)
        .collect();

    let pending = requirement.pending_roles(&approved);
    if !role.is_superadmin() && !pending.contains(&role) {
        return Err(ApprovalError::RoleNotPermitted { role, pending });
    }

    approved.push(role);
    let pending_roles = requirement.pending_roles(&approved);
    let next_status = if pending_roles.is_empty() {
        OrderStatus::Approved
    } else {
        OrderStatus::PendingApproval
    };

    Ok(ApprovalOutcome {
        next_status,
        pending_roles,
    })
}

/// Validate a tenant's approval level table before it is saved
pub fn validate_approval_levels(levels: &[ApprovalLevel]) -> Result<(), String> {
    let mut seen = Vec::with_capacity(levels.len());
    for level in levels {
        if level.level < 1 {
            return Err(format!("Approval level number must be positive, got {}", level.level));
        }
        if seen.contains(&level.level) {
            return Err(format!("Duplicate approval level number {}", level.level));
        }
        seen.push(level.level);

        if level.level_name.trim().is_empty() {
            return Err(format!("Approval level {} needs a name", level.level));
        }
        if level.min_amount < Decimal::ZERO {
            return Err(format!("Approval level {} has a negative minimum", level.level));
        }
        if let Some(max) = level.max_amount {
            if max <= level.min_amount {
                return Err(format!(
                    "Approval level {} maximum must be greater than its minimum",
                    level.level
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_level_range_is_half_open() {
        let l = level(1, 0, Some(1_000_000), UserRole::SppgAdmin);
        assert!(l.contains(Decimal::ZERO));
        assert!(l.contains(Decimal::from(999_999)));
        assert!(!l.contains(Decimal::from(1_000_000)));
    }

    #[test]
    fn test_lowest_level_wins_on_overlap() {
        let levels = vec![
            level(2, 0, None, UserRole::SppgKepala),
            level(1, 0, Some(5_000_000), UserRole::SppgAdmin),
        ];
        let matched = resolve_approval_level(&levels, Decimal::from(100)).unwrap();
        assert_eq!(matched.level, 1);
    }

    #[test]
    fn test_inactive_levels_ignored() {
        let mut l = level(1, 0, None, UserRole::SppgAdmin);
        l.is_active = false;
        assert!(resolve_approval_level(&[l], Decimal::from(10)).is_none());
    }

    #[test]
    fn test_fallback_when_no_levels() {
        let req = ApprovalRequirement::resolve(&[], Decimal::from(10), None);
        assert!(req.level.is_none());
        assert_eq!(req.roles, FALLBACK_APPROVER_ROLES.to_vec());
        assert_eq!(req.mode, ApprovalMode::Single);
    }

    #[test]
    fn test_superadmin_satisfies_any_requirement() {
        let levels = vec![
            level(1, 0, Some(1_000), UserRole::SppgAdmin),
            level(2, 1_000, None, UserRole::SppgKepala),
        ];
        let req = ApprovalRequirement::resolve(&levels, Decimal::from(5_000), Some(Decimal::from(1_000)));
        assert!(req.is_parallel());
        assert!(req.is_satisfied(&[UserRole::PlatformSuperadmin]));
    }

    #[test]
    fn test_validate_levels_rejects_duplicates() {
        let levels = vec![
            level(1, 0, Some(10), UserRole::SppgAdmin),
            level(1, 10, None, UserRole::SppgKepala),
        ];
        assert!(validate_approval_levels(&levels).is_err());
    }

    #[test]
    fn test_validate_levels_rejects_inverted_range() {
        let levels = vec![level(1, 100, Some(10), UserRole::SppgAdmin)];
        assert!(validate_approval_levels(&levels).is_err());
    }
}
