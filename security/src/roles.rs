// security/src/roles.rs
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use anyhow::{Context, Result};

use models::medical::UserRole;

/// Bundled role table, used when no `roles_file` is configured.
pub const DEFAULT_ROLES_YAML: &str = include_str!("../roles_permissions.yaml");

pub const SUPERUSER: &str = "superuser";

/// Permission names referenced by the API layer.
pub mod permissions {
    pub const TENANTS_MANAGE: &str = "tenants.manage";
    pub const USERS_READ: &str = "users.read";
    pub const USERS_MANAGE: &str = "users.manage";
    pub const SLOTS_READ: &str = "slots.read";
    pub const SLOTS_MANAGE: &str = "slots.manage";
    pub const APPOINTMENTS_READ: &str = "appointments.read";
    pub const APPOINTMENTS_BOOK: &str = "appointments.book";
    pub const APPOINTMENTS_MANAGE: &str = "appointments.manage";
    pub const TREATMENTS_READ: &str = "treatments.read";
    pub const TREATMENTS_MANAGE: &str = "treatments.manage";
    pub const BILLING_READ: &str = "billing.read";
    pub const BILLING_MANAGE: &str = "billing.manage";
    pub const AI_USE: &str = "ai.use";
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoleConfig {
    pub id: u32,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RolesConfig {
    pub roles: HashMap<String, RoleConfig>,
    #[serde(skip)]
    role_id_map: HashMap<u32, RoleConfig>,
}

impl RolesConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut config: RolesConfig = serde_yaml::from_str(content).context("Failed to parse roles YAML")?;

        for role in UserRole::ALL {
            if !config.roles.contains_key(role.as_str()) {
                anyhow::bail!("Roles configuration is missing the '{}' role", role);
            }
        }
        config.role_id_map = config.roles.values().map(|role_cfg| (role_cfg.id, role_cfg.clone())).collect();
        if config.role_id_map.len() != config.roles.len() {
            anyhow::bail!("Role ids in the roles configuration must be unique");
        }
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read roles file {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    pub fn bundled() -> Result<Self> {
        Self::from_yaml_str(DEFAULT_ROLES_YAML)
    }

    pub fn get_role_config_by_id(&self, role_id: u32) -> Option<&RoleConfig> {
        self.role_id_map.get(&role_id)
    }

    pub fn role_id(&self, role: UserRole) -> Option<u32> {
        self.roles.get(role.as_str()).map(|cfg| cfg.id)
    }

    pub fn has_permission(&self, role_id: u32, permission_name: &str) -> bool {
        self.get_role_config_by_id(role_id).is_some_and(|role_cfg| {
            role_cfg.permissions.iter().any(|p| p == permission_name || p == SUPERUSER)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_roles_load() {
        let roles = RolesConfig::bundled().unwrap();
        let patient = roles.role_id(UserRole::Patient).unwrap();
        let admin = roles.role_id(UserRole::Admin).unwrap();
        assert!(roles.has_permission(patient, permissions::APPOINTMENTS_BOOK));
        assert!(!roles.has_permission(patient, permissions::SLOTS_MANAGE));
        assert!(roles.has_permission(admin, permissions::TENANTS_MANAGE));
    }

    #[test]
    fn unknown_role_id_has_nothing() {
        let roles = RolesConfig::bundled().unwrap();
        assert!(!roles.has_permission(999, permissions::SLOTS_READ));
    }

    #[test]
    fn rejects_incomplete_tables() {
        let yaml = "roles:\n  patient:\n    id: 1\n    permissions: []\n";
        assert!(RolesConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = "roles:\n  patient: {id: 1, permissions: []}\n  doctor: {id: 1, permissions: []}\n  nurse: {id: 3, permissions: []}\n  admin: {id: 4, permissions: [superuser]}\n";
        assert!(RolesConfig::from_yaml_str(yaml).is_err());
    }
}
