//! User roles and the procurement role policy table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles a user can hold inside an SPPG tenant, plus the platform roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(
    feature = "db",
    sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    PlatformSuperadmin,
    PlatformSupport,
    SppgKepala,
    SppgAdmin,
    SppgAkuntan,
    SppgAhliGizi,
    SppgProduksiManager,
    SppgDistribusiManager,
    SppgStaffAdmin,
    SppgStaffQc,
    SppgViewer,
}

impl UserRole {
    pub const ALL: [UserRole; 11] = [
        UserRole::PlatformSuperadmin,
        UserRole::PlatformSupport,
        UserRole::SppgKepala,
        UserRole::SppgAdmin,
        UserRole::SppgAkuntan,
        UserRole::SppgAhliGizi,
        UserRole::SppgProduksiManager,
        UserRole::SppgDistribusiManager,
        UserRole::SppgStaffAdmin,
        UserRole::SppgStaffQc,
        UserRole::SppgViewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::PlatformSuperadmin => "PLATFORM_SUPERADMIN",
            UserRole::PlatformSupport => "PLATFORM_SUPPORT",
            UserRole::SppgKepala => "SPPG_KEPALA",
            UserRole::SppgAdmin => "SPPG_ADMIN",
            UserRole::SppgAkuntan => "SPPG_AKUNTAN",
            UserRole::SppgAhliGizi => "SPPG_AHLI_GIZI",
            UserRole::SppgProduksiManager => "SPPG_PRODUKSI_MANAGER",
            UserRole::SppgDistribusiManager => "SPPG_DISTRIBUSI_MANAGER",
            UserRole::SppgStaffAdmin => "SPPG_STAFF_ADMIN",
            UserRole::SppgStaffQc => "SPPG_STAFF_QC",
            UserRole::SppgViewer => "SPPG_VIEWER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == s)
    }

    /// Platform superadmin bypasses every tenant role gate
    pub fn is_superadmin(&self) -> bool {
        matches!(self, UserRole::PlatformSuperadmin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Procurement operations gated by a fixed role set
///
/// Approval is not listed here: who may approve depends on the order amount
/// and is decided by [`crate::ApprovalRequirement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementAction {
    View,
    Create,
    Update,
    Delete,
    Submit,
    Reject,
    Escalate,
    Place,
    Cancel,
    Receive,
    ManageSettings,
}

impl ProcurementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementAction::View => "view",
            ProcurementAction::Create => "create",
            ProcurementAction::Update => "update",
            ProcurementAction::Delete => "delete",
            ProcurementAction::Submit => "submit",
            ProcurementAction::Reject => "reject",
            ProcurementAction::Escalate => "escalate",
            ProcurementAction::Place => "place",
            ProcurementAction::Cancel => "cancel",
            ProcurementAction::Receive => "receive",
            ProcurementAction::ManageSettings => "manage_settings",
        }
    }
}

/// Single policy table mapping each procurement action to the roles allowed
/// to perform it
pub struct RolePolicy;

impl RolePolicy {
    pub fn allowed_roles(action: ProcurementAction) -> &'static [UserRole] {
        use UserRole::*;
        match action {
            ProcurementAction::View => &[
                PlatformSupport,
                SppgKepala,
                SppgAdmin,
                SppgAkuntan,
                SppgAhliGizi,
                SppgProduksiManager,
                SppgDistribusiManager,
                SppgStaffAdmin,
                SppgStaffQc,
                SppgViewer,
            ],
            ProcurementAction::Create
            | ProcurementAction::Update
            | ProcurementAction::Delete
            | ProcurementAction::Submit => &[SppgKepala, SppgAdmin, SppgAkuntan, SppgStaffAdmin],
            ProcurementAction::Reject => &[SppgKepala, SppgAdmin, SppgAkuntan],
            ProcurementAction::Escalate => &[SppgAdmin, SppgAkuntan, SppgStaffAdmin],
            ProcurementAction::Place => &[SppgKepala, SppgAdmin, SppgStaffAdmin],
            ProcurementAction::Cancel => &[SppgKepala, SppgAdmin],
            ProcurementAction::Receive => &[
                SppgKepala,
                SppgAdmin,
                SppgProduksiManager,
                SppgStaffAdmin,
                SppgStaffQc,
            ],
            ProcurementAction::ManageSettings => &[SppgKepala, SppgAdmin],
        }
    }

    pub fn allows(role: UserRole, action: ProcurementAction) -> bool {
        role.is_superadmin() || Self::allowed_roles(action).contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_str() {
        for role in UserRole::ALL {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("ADMIN"), None);
    }

    #[test]
    fn test_superadmin_allowed_everywhere() {
        let actions = [
            ProcurementAction::Create,
            ProcurementAction::Reject,
            ProcurementAction::Escalate,
            ProcurementAction::Cancel,
            ProcurementAction::Receive,
            ProcurementAction::ManageSettings,
        ];
        for action in actions {
            assert!(RolePolicy::allows(UserRole::PlatformSuperadmin, action));
        }
    }

    #[test]
    fn test_viewer_cannot_write() {
        assert!(RolePolicy::allows(UserRole::SppgViewer, ProcurementAction::View));
        assert!(!RolePolicy::allows(UserRole::SppgViewer, ProcurementAction::Create));
        assert!(!RolePolicy::allows(UserRole::SppgViewer, ProcurementAction::Cancel));
    }

    #[test]
    fn test_qc_staff_may_receive_but_not_cancel() {
        assert!(RolePolicy::allows(UserRole::SppgStaffQc, ProcurementAction::Receive));
        assert!(!RolePolicy::allows(UserRole::SppgStaffQc, ProcurementAction::Cancel));
    }
}
