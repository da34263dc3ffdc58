// lib/src/context.rs
//! Who is acting, and inside which hospital.

use models::medical::{Hospital, User, UserRole};
use models::{Identifier, MedError, MedResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage_engine::Namespace;

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
    /// `None` for platform administrators.
    pub tenant_id: Option<Uuid>,
}

impl Actor {
    pub fn new(user_id: Uuid, role: UserRole, tenant_id: Option<Uuid>) -> Self {
        Actor { user_id, role, tenant_id }
    }

    pub fn is_platform_admin(&self) -> bool {
        self.role == UserRole::Admin && self.tenant_id.is_none()
    }

    /// Tenant admins administer their hospital; platform admins every hospital.
    pub fn can_administer(&self, tenant_id: Uuid) -> bool {
        self.role == UserRole::Admin && self.tenant_id.is_none_or(|own| own == tenant_id)
    }

    pub fn belongs_to(&self, tenant_id: Uuid) -> bool {
        self.tenant_id == Some(tenant_id) || self.is_platform_admin()
    }

    pub fn require_platform_admin(&self) -> MedResult<()> {
        if self.is_platform_admin() {
            Ok(())
        } else {
            Err(MedError::PermissionDenied("platform administrator required".into()))
        }
    }

    pub fn require_admin_of(&self, tenant_id: Uuid) -> MedResult<()> {
        if self.can_administer(tenant_id) {
            Ok(())
        } else {
            Err(MedError::PermissionDenied("hospital administrator required".into()))
        }
    }

    pub fn require_member(&self, scope: &TenantScope) -> MedResult<()> {
        if self.belongs_to(scope.tenant_id) {
            Ok(())
        } else {
            Err(MedError::PermissionDenied("not a member of this hospital".into()))
        }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::new(user.id, user.role, user.tenant_id)
    }
}

/// A resolved, active tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    pub tenant_id: Uuid,
    pub schema: Identifier,
}

impl TenantScope {
    pub fn namespace(&self) -> Namespace {
        Namespace::Tenant(self.schema)
    }
}

impl From<&Hospital> for TenantScope {
    fn from(hospital: &Hospital) -> Self {
        TenantScope { tenant_id: hospital.id, schema: hospital.schema_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_reach() {
        let tenant = Uuid::new_v4();
        let platform = Actor::new(Uuid::new_v4(), UserRole::Admin, None);
        let local = Actor::new(Uuid::new_v4(), UserRole::Admin, Some(tenant));
        let nurse = Actor::new(Uuid::new_v4(), UserRole::Nurse, Some(tenant));

        assert!(platform.can_administer(tenant));
        assert!(local.can_administer(tenant));
        assert!(!local.can_administer(Uuid::new_v4()));
        assert!(!nurse.can_administer(tenant));
        assert!(nurse.belongs_to(tenant));
        assert!(local.require_platform_admin().is_err());
    }
}
