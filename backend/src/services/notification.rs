//! Notification dispatcher for procurement events
//!
//! Notifications are queued in `notification_queue` and, when a gateway is
//! configured, pushed to the WhatsApp/email gateway from a background task
//! spawned after the caller's transaction commits. Everything here is
//! best-effort: failures are logged and never reach the caller.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::Sha256;
use shared::{normalize_indonesian_phone, validate_email, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};
use crate::models::Recipient;
use crate::repository::{NewNotification, TenantScope};

/// Header carrying the base64 HMAC-SHA256 of the request body
pub const SIGNATURE_HEADER: &str = "X-SPPG-Signature";

const CHANNEL_WHATSAPP: &str = "WHATSAPP";
const CHANNEL_EMAIL: &str = "EMAIL";

/// Procurement events that notify people
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    ApprovalRequested,
    OrderApproved,
    OrderRejected,
    OrderEscalated,
    OrderReceived,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::ApprovalRequested => "APPROVAL_REQUESTED",
            NotificationEvent::OrderApproved => "ORDER_APPROVED",
            NotificationEvent::OrderRejected => "ORDER_REJECTED",
            NotificationEvent::OrderEscalated => "ORDER_ESCALATED",
            NotificationEvent::OrderReceived => "ORDER_RECEIVED",
        }
    }
}

/// Message content independent of channel
#[derive(Debug, Clone)]
pub struct Notification {
    pub event: NotificationEvent,
    pub subject: String,
    pub body: String,
    pub reference_id: Option<Uuid>,
}

impl Notification {
    pub fn approval_requested(order_id: Uuid, order_code: &str, total: Decimal, roles: &[UserRole]) -> Self {
        let roles = roles.iter().map(UserRole::as_str).collect::<Vec<_>>().join(", ");
        Self {
            event: NotificationEvent::ApprovalRequested,
            subject: format!("Persetujuan diperlukan: {}", order_code),
            body: format!(
                "Pesanan {} senilai Rp {} menunggu persetujuan ({}).",
                order_code,
                total.round_dp(2),
                roles
            ),
            reference_id: Some(order_id),
        }
    }

    pub fn decided(order_id: Uuid, order_code: &str, approved: bool, by: &str, reason: Option<&str>) -> Self {
        let (event, verb) = if approved {
            (NotificationEvent::OrderApproved, "disetujui")
        } else {
            (NotificationEvent::OrderRejected, "ditolak")
        };
        let mut body = format!("Pesanan {} telah {} oleh {}.", order_code, verb, by);
        if let Some(reason) = reason {
            body.push_str(&format!(" Alasan: {}", reason));
        }
        Self {
            event,
            subject: format!("Pesanan {} {}", order_code, verb),
            body,
            reference_id: Some(order_id),
        }
    }

    pub fn escalated(order_id: Uuid, order_code: &str, by: &str, reason: &str) -> Self {
        Self {
            event: NotificationEvent::OrderEscalated,
            subject: format!("Eskalasi persetujuan: {}", order_code),
            body: format!("{} meneruskan pesanan {} untuk ditindaklanjuti. Alasan: {}", by, order_code, reason),
            reference_id: Some(order_id),
        }
    }

    pub fn received(order_id: Uuid, order_code: &str, fully: bool) -> Self {
        let state = if fully { "diterima seluruhnya" } else { "diterima sebagian" };
        Self {
            event: NotificationEvent::OrderReceived,
            subject: format!("Pesanan {} {}", order_code, state),
            body: format!("Barang untuk pesanan {} telah {}.", order_code, state),
            reference_id: Some(order_id),
        }
    }
}

/// Deliverable addresses of a recipient, by channel
pub fn channels_for(recipient: &Recipient) -> Vec<(&'static str, String)> {
    let mut channels = Vec::new();
    if let Some(phone) = recipient.phone.as_deref() {
        if let Ok(number) = normalize_indonesian_phone(phone) {
            channels.push((CHANNEL_WHATSAPP, number));
        }
    }
    if let Some(email) = recipient.email.as_deref().map(str::trim) {
        if validate_email(email).is_ok() {
            channels.push((CHANNEL_EMAIL, email.to_string()));
        }
    }
    channels
}

/// Sign a gateway payload with the shared secret
pub fn sign_payload(secret: &str, body: &[u8]) -> AppResult<String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Failed to create HMAC".to_string()))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Serialize)]
struct GatewayMessage<'a> {
    id: Uuid,
    tenant_id: Uuid,
    channel: &'a str,
    recipient: &'a str,
    event: &'a str,
    subject: &'a str,
    message: &'a str,
    reference_id: Option<Uuid>,
}

/// HTTP client for the delivery gateway
#[derive(Clone)]
pub struct GatewayClient {
    url: String,
    secret: Option<String>,
    http_client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(url: String, secret: Option<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            url,
            secret,
            http_client,
        }
    }

    async fn send(&self, message: &GatewayMessage<'_>) -> Result<(), String> {
        let body = serde_json::to_vec(message).map_err(|e| format!("Failed to encode message: {}", e))?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.secret {
            let signature = sign_payload(secret, &body).map_err(|e| e.to_string())?;
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| format!("Failed to reach notification gateway: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("Notification gateway returned {}", response.status()))
        }
    }
}

/// Notification service for procurement events. Built once at startup and
/// shared through the application state; clones share the pool and client.
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    enabled: bool,
    gateway: Option<GatewayClient>,
}

impl NotificationService {
    pub fn new(db: PgPool, config: &NotificationConfig) -> Self {
        let gateway = config
            .gateway_url
            .as_ref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| GatewayClient::new(url.clone(), config.gateway_secret.clone()));
        Self {
            db,
            enabled: config.enabled,
            gateway,
        }
    }

    /// Notify every active tenant user holding one of the roles
    pub fn notify_roles(&self, scope: TenantScope, roles: Vec<UserRole>, notification: Notification) {
        if !self.enabled || roles.is_empty() {
            return;
        }
        let service = self.clone();
        tokio::spawn(async move {
            let result = service.try_notify_roles(scope, &roles, &notification).await;
            service.log_outcome(&notification, result);
        });
    }

    /// Notify one user, typically the order creator
    pub fn notify_user(&self, scope: TenantScope, user_id: Uuid, notification: Notification) {
        if !self.enabled {
            return;
        }
        let service = self.clone();
        tokio::spawn(async move {
            let result = service.try_notify_user(scope, user_id, &notification).await;
            service.log_outcome(&notification, result);
        });
    }

    async fn try_notify_roles(
        &self,
        scope: TenantScope,
        roles: &[UserRole],
        notification: &Notification,
    ) -> AppResult<usize> {
        let recipients = {
            let mut conn = self.db.acquire().await?;
            scope.users_with_roles(&mut conn, roles).await?
        };
        self.deliver(scope, recipients, notification).await
    }

    async fn try_notify_user(
        &self,
        scope: TenantScope,
        user_id: Uuid,
        notification: &Notification,
    ) -> AppResult<usize> {
        let recipients: Vec<Recipient> = {
            let mut conn = self.db.acquire().await?;
            scope.find_user(&mut conn, user_id).await?.into_iter().collect()
        };
        self.deliver(scope, recipients, notification).await
    }

    fn log_outcome(&self, notification: &Notification, result: AppResult<usize>) {
        match result {
            Ok(queued) => tracing::info!(
                event = notification.event.as_str(),
                queued,
                "Notification queued"
            ),
            Err(e) => tracing::warn!(
                event = notification.event.as_str(),
                error = %e,
                "Failed to queue notification"
            ),
        }
    }

    async fn deliver(
        &self,
        scope: TenantScope,
        recipients: Vec<Recipient>,
        notification: &Notification,
    ) -> AppResult<usize> {
        let mut queued = 0;
        let mut conn = self.db.acquire().await?;

        for recipient in &recipients {
            if !recipient.has_contact() {
                continue;
            }
            for (channel, address) in channels_for(recipient) {
                let id = scope
                    .enqueue_notification(
                        &mut conn,
                        &NewNotification {
                            recipient_user_id: Some(recipient.id),
                            channel,
                            recipient: address.clone(),
                            event: notification.event.as_str(),
                            subject: notification.subject.clone(),
                            message: notification.body.clone(),
                            reference_id: notification.reference_id,
                        },
                    )
                    .await?;
                queued += 1;

                let Some(gateway) = &self.gateway else {
                    continue;
                };
                let message = GatewayMessage {
                    id,
                    tenant_id: scope.tenant_id(),
                    channel,
                    recipient: &address,
                    event: notification.event.as_str(),
                    subject: &notification.subject,
                    message: &notification.body,
                    reference_id: notification.reference_id,
                };
                match gateway.send(&message).await {
                    Ok(()) => scope.mark_notification(&mut conn, id, true, None).await?,
                    Err(e) => {
                        tracing::warn!(notification_id = %id, recipient = %recipient.name, "{}", e);
                        scope.mark_notification(&mut conn, id, false, Some(&e)).await?;
                    }
                }
            }
        }

        Ok(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(phone: Option<&str>, email: Option<&str>) -> Recipient {
        Recipient {
            id: Uuid::nil(),
            name: "Budi".to_string(),
            phone: phone.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn test_channels_for_valid_contacts() {
        let channels = channels_for(&recipient(Some("0812-3456-7890"), Some("budi@sppg.id")));
        assert_eq!(
            channels,
            vec![
                ("WHATSAPP", "6281234567890".to_string()),
                ("EMAIL", "budi@sppg.id".to_string())
            ]
        );
    }

    #[test]
    fn test_invalid_contacts_skipped() {
        assert!(channels_for(&recipient(Some("12345"), Some("nope"))).is_empty());
        assert!(!recipient(None, Some("  ")).has_contact());
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign_payload("secret", b"{\"a\":1}").unwrap();
        let b = sign_payload("secret", b"{\"a\":1}").unwrap();
        let c = sign_payload("other", b"{\"a\":1}").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(BASE64.decode(&a).unwrap().len(), 32);
    }

    #[test]
    fn test_approval_request_lists_roles() {
        let n = Notification::approval_requested(
            Uuid::nil(),
            "ORD-202510-0001",
            Decimal::from(2_500_000),
            &[UserRole::SppgAkuntan, UserRole::SppgKepala],
        );
        assert_eq!(n.event, NotificationEvent::ApprovalRequested);
        assert!(n.body.contains("SPPG_AKUNTAN, SPPG_KEPALA"));
    }
}
