//! Explicit tenant scoping for system-principal work.
//!
//! Background stages run without an authenticated user. Instead of an ambient
//! nullable identity, every unit of work is opened with a [`TenantScope`].

use std::fmt;

use crate::types::DbId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantScope {
    /// Process rows of every tenant.
    #[default]
    AllTenants,
    /// Restrict every read and write to one tenant.
    Tenant(DbId),
}

impl TenantScope {
    /// The tenant filter bound into repository queries; `None` disables it.
    pub fn filter(self) -> Option<DbId> {
        match self {
            Self::AllTenants => None,
            Self::Tenant(id) => Some(id),
        }
    }

    /// Whether a row owned by `tenant_id` is visible in this scope.
    pub fn includes(self, tenant_id: DbId) -> bool {
        match self {
            Self::AllTenants => true,
            Self::Tenant(id) => id == tenant_id,
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllTenants => f.write_str("all-tenants"),
            Self::Tenant(id) => write!(f, "tenant:{id}"),
        }
    }
}
