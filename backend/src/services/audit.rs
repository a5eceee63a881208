//! Audit entries and the derived order narrative
//!
//! The narrative appended to `internal_notes` is write-only text for people.
//! Workflow logic reads the structured records, never these lines.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::repository::NewAuditEntry;

pub const ENTITY_ORDER: &str = "PROCUREMENT_ORDER";
pub const ENTITY_ITEM: &str = "PROCUREMENT_ITEM";
pub const ENTITY_SETTINGS: &str = "PROCUREMENT_SETTINGS";
pub const ENTITY_BUDGET: &str = "PROCUREMENT_BUDGET";

/// Build an audit entry for an action taken by `user`
pub fn entry(
    user: &AuthUser,
    action: &'static str,
    entity_type: &'static str,
    entity_id: Option<Uuid>,
    description: impl Into<String>,
    metadata: Option<serde_json::Value>,
) -> NewAuditEntry {
    NewAuditEntry {
        user_id: Some(user.user_id),
        action,
        entity_type,
        entity_id,
        description: description.into(),
        metadata,
    }
}

/// One human-readable line, e.g.
/// `[2025-10-18 09:30 UTC] APPROVED by Siti (SPPG_KEPALA): Harga sesuai`
pub fn narrative_line(user: &AuthUser, action: &str, detail: Option<&str>, at: DateTime<Utc>) -> String {
    let mut line = format!(
        "[{}] {} by {} ({})",
        at.format("%Y-%m-%d %H:%M UTC"),
        action,
        display_name(user),
        user.role
    );
    if let Some(detail) = detail.map(str::trim).filter(|d| !d.is_empty()) {
        line.push_str(": ");
        line.push_str(detail);
    }
    line
}

/// Append a narrative line to existing notes
pub fn append_narrative(existing: Option<&str>, line: &str) -> String {
    match existing.map(str::trim_end).filter(|s| !s.is_empty()) {
        Some(notes) => format!("{}\n{}", notes, line),
        None => line.to_string(),
    }
}

fn display_name(user: &AuthUser) -> String {
    if user.name.trim().is_empty() {
        user.user_id.to_string()
    } else {
        user.name.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared::UserRole;

    fn user(name: &str) -> AuthUser {
        AuthUser {
            user_id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            role: UserRole::SppgKepala,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_narrative_line_format() {
        let at = Utc.with_ymd_and_hms(2025, 10, 18, 9, 30, 0).unwrap();
        let line = narrative_line(&user("Siti"), "APPROVED", Some("Harga sesuai"), at);
        assert_eq!(line, "[2025-10-18 09:30 UTC] APPROVED by Siti (SPPG_KEPALA): Harga sesuai");
    }

    #[test]
    fn test_narrative_without_detail_or_name() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 0).unwrap();
        let line = narrative_line(&user(" "), "PLACED", Some("  "), at);
        assert!(line.ends_with(&format!("PLACED by {} (SPPG_KEPALA)", Uuid::nil())));
    }

    #[test]
    fn test_append_narrative() {
        assert_eq!(append_narrative(None, "a"), "a");
        assert_eq!(append_narrative(Some(""), "a"), "a");
        assert_eq!(append_narrative(Some("x\n"), "a"), "x\na");
    }
}
