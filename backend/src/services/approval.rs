//! Approval policy resolution for one order
//!
//! Combines the tenant's level table and parallel threshold with the
//! decisions already recorded on an order.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    ApprovalAction, ApprovalLevel, ApprovalMode, ApprovalRequirement, OrderStatus, UserRole,
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ApprovalRecord, Escalation, ProcurementSettings};
use crate::repository::TenantScope;

/// Resolve who must approve an order of `amount` for this tenant
pub async fn resolve_requirement(
    conn: &mut PgConnection,
    scope: &TenantScope,
    settings: &ProcurementSettings,
    amount: Decimal,
) -> AppResult<ApprovalRequirement> {
    let levels = scope.approval_levels(conn).await?;
    Ok(ApprovalRequirement::resolve(
        &levels,
        amount,
        settings.parallel_approval_threshold,
    ))
}

/// Roles that recorded an APPROVED decision
pub fn approved_roles(records: &[ApprovalRecord]) -> Vec<UserRole> {
    let mut roles = Vec::new();
    for record in records {
        if record.action == ApprovalAction::Approved && !roles.contains(&record.approver_role) {
            roles.push(record.approver_role);
        }
    }
    roles
}

/// Approval progress of one order
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalStatusView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub level: Option<ApprovalLevel>,
    pub mode: ApprovalMode,
    pub is_parallel: bool,
    pub required_roles: Vec<UserRole>,
    pub approved_roles: Vec<UserRole>,
    pub pending_roles: Vec<UserRole>,
    pub approvals: Vec<ApprovalRecord>,
    pub escalations: Vec<Escalation>,
}

impl ApprovalStatusView {
    pub fn build(
        order_id: Uuid,
        status: OrderStatus,
        total_amount: Decimal,
        requirement: ApprovalRequirement,
        approvals: Vec<ApprovalRecord>,
        escalations: Vec<Escalation>,
    ) -> Self {
        let approved = approved_roles(&approvals);
        // Only a pending order still waits on anyone
        let pending_roles = if status == OrderStatus::PendingApproval {
            requirement.pending_roles(&approved)
        } else {
            Vec::new()
        };

        Self {
            order_id,
            status,
            total_amount,
            is_parallel: requirement.is_parallel(),
            mode: requirement.mode,
            level: requirement.level,
            required_roles: requirement.roles,
            approved_roles: approved,
            pending_roles,
            approvals,
            escalations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(role: UserRole, action: ApprovalAction) -> ApprovalRecord {
        ApprovalRecord {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            approver_id: Uuid::new_v4(),
            approver_name: "Approver".to_string(),
            approver_role: role,
            action,
            approval_level: None,
            notes: None,
            ip_address: None,
            created_at: Utc::now(),
        }
    }

    fn parallel_requirement() -> ApprovalRequirement {
        ApprovalRequirement {
            level: None,
            mode: ApprovalMode::Parallel,
            roles: vec![UserRole::SppgAkuntan, UserRole::SppgKepala],
        }
    }

    #[test]
    fn test_approved_roles_ignores_rejections_and_duplicates() {
        let records = vec![
            record(UserRole::SppgAkuntan, ApprovalAction::Approved),
            record(UserRole::SppgAkuntan, ApprovalAction::Approved),
            record(UserRole::SppgKepala, ApprovalAction::Rejected),
        ];
        assert_eq!(approved_roles(&records), vec![UserRole::SppgAkuntan]);
    }

    #[test]
    fn test_status_view_pending_roles() {
        let view = ApprovalStatusView::build(
            Uuid::nil(),
            OrderStatus::PendingApproval,
            Decimal::from(5_000_000),
            parallel_requirement(),
            vec![record(UserRole::SppgAkuntan, ApprovalAction::Approved)],
            Vec::new(),
        );
        assert!(view.is_parallel);
        assert_eq!(view.pending_roles, vec![UserRole::SppgKepala]);
    }

    #[test]
    fn test_status_view_nothing_pending_after_decision() {
        let view = ApprovalStatusView::build(
            Uuid::nil(),
            OrderStatus::Rejected,
            Decimal::from(5_000_000),
            parallel_requirement(),
            vec![record(UserRole::SppgKepala, ApprovalAction::Rejected)],
            Vec::new(),
        );
        assert!(view.pending_roles.is_empty());
    }
}
