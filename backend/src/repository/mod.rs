//! Tenant-scoped data access
//!
//! All procurement SQL is issued through [`TenantScope`]. A scope can only be
//! built from an authenticated user, and every statement it runs binds the
//! scope's tenant id, so an unscoped query cannot be written from a service.
//! Methods take a `&mut PgConnection` so the caller decides whether they run
//! on a pooled connection or inside its transaction.

mod audit;
mod inventory;
mod orders;
mod settings;

pub use audit::{NewAuditEntry, NewNotification};
pub use inventory::NewStockMovement;
pub use orders::{
    CategoryItemStats, InventoryLink, ItemStatsFilter, NewOrder, NewOrderItem, NewQualityControl, OrderFilter,
    ReceiptLineUpdate,
};

use uuid::Uuid;

use crate::middleware::AuthUser;

/// Tenant boundary for every procurement query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    tenant_id: Uuid,
}

impl TenantScope {
    pub fn new(user: &AuthUser) -> Self {
        Self {
            tenant_id: user.tenant_id,
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }
}

impl From<&AuthUser> for TenantScope {
    fn from(user: &AuthUser) -> Self {
        Self::new(user)
    }
}
