//! Audit log, notification queue and approver directory

use shared::UserRole;
use sqlx::PgConnection;
use uuid::Uuid;

use super::TenantScope;
use crate::error::AppResult;
use crate::models::{AuditEntry, Recipient};

/// Audit entry to append
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub user_id: Option<Uuid>,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

/// Notification to queue for delivery
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_user_id: Option<Uuid>,
    pub channel: &'static str,
    pub recipient: String,
    pub event: &'static str,
    pub subject: String,
    pub message: String,
    pub reference_id: Option<Uuid>,
}

impl TenantScope {
    pub async fn record_audit(&self, conn: &mut PgConnection, entry: &NewAuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (tenant_id, user_id, action, entity_type, entity_id, description, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.tenant_id)
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.description)
        .bind(&entry.metadata)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn audit_trail(&self, conn: &mut PgConnection, entity_id: Uuid) -> AppResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, description, metadata, created_at
            FROM audit_logs
            WHERE entity_id = $1 AND tenant_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(entity_id)
        .bind(self.tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Active tenant users holding any of the roles
    pub async fn users_with_roles(&self, conn: &mut PgConnection, roles: &[UserRole]) -> AppResult<Vec<Recipient>> {
        let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, Recipient>(
            r#"
            SELECT id, name, email, phone
            FROM users
            WHERE tenant_id = $1 AND is_active AND role = ANY($2)
            ORDER BY name
            "#,
        )
        .bind(self.tenant_id)
        .bind(roles)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    pub async fn find_user(&self, conn: &mut PgConnection, user_id: Uuid) -> AppResult<Option<Recipient>> {
        let row = sqlx::query_as::<_, Recipient>(
            "SELECT id, name, email, phone FROM users WHERE id = $1 AND tenant_id = $2 AND is_active",
        )
        .bind(user_id)
        .bind(self.tenant_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    pub async fn enqueue_notification(
        &self,
        conn: &mut PgConnection,
        notification: &NewNotification,
    ) -> AppResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO notification_queue (
                tenant_id, recipient_user_id, channel, recipient, event, subject, message, reference_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(self.tenant_id)
        .bind(notification.recipient_user_id)
        .bind(notification.channel)
        .bind(&notification.recipient)
        .bind(notification.event)
        .bind(&notification.subject)
        .bind(&notification.message)
        .bind(notification.reference_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Record a delivery attempt outcome
    pub async fn mark_notification(
        &self,
        conn: &mut PgConnection,
        notification_id: Uuid,
        delivered: bool,
        error: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_queue SET
                status = CASE WHEN $3 THEN 'SENT' ELSE 'FAILED' END,
                attempts = attempts + 1,
                last_error = $4,
                sent_at = CASE WHEN $3 THEN NOW() ELSE sent_at END
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(self.tenant_id)
        .bind(delivered)
        .bind(error)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
