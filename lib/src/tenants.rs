// lib/src/tenants.rs
//! Hospitals (tenants): registration, domain routing and activation.

use std::sync::Arc;

use chrono::Utc;
use models::medical::hospital::normalize_domain;
use models::medical::{Hospital, HospitalUpdate, NewHospital};
use models::{Identifier, MedError, MedResult};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::{Actor, TenantScope};
use crate::storage_engine::{Namespace, Repository, StorageEngine, UniqueIndex};

#[derive(Debug, Clone)]
pub struct TenantService {
    hospitals: Repository<Hospital>,
    schemas: UniqueIndex,
    domains: UniqueIndex,
}

impl TenantService {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        TenantService {
            hospitals: Repository::new(engine.clone()),
            schemas: UniqueIndex::new(engine.clone(), "schema_name"),
            domains: UniqueIndex::new(engine, "domain"),
        }
    }

    pub async fn create_tenant(&self, actor: &Actor, new: NewHospital) -> MedResult<Hospital> {
        actor.require_platform_admin()?;
        let mut hospital = Hospital::from_new(new)?;
        hospital.domains.sort();
        hospital.domains.dedup();

        self.schemas.claim(Namespace::Public, hospital.schema_name.as_str(), hospital.id).await?;
        let mut claimed: Vec<&str> = Vec::new();
        for domain in &hospital.domains {
            if let Err(e) = self.domains.claim(Namespace::Public, domain, hospital.id).await {
                for done in &claimed {
                    self.domains.release(Namespace::Public, done, hospital.id).await?;
                }
                self.schemas.release(Namespace::Public, hospital.schema_name.as_str(), hospital.id).await?;
                return Err(e);
            }
            claimed.push(domain);
        }
        self.hospitals.insert(Namespace::Public, &hospital).await?;
        info!(tenant = %hospital.id, schema = %hospital.schema_name, "hospital created");
        Ok(hospital)
    }

    pub async fn get(&self, id: Uuid) -> MedResult<Hospital> {
        self.hospitals.require(Namespace::Public, id).await
    }

    pub async fn list(&self) -> MedResult<Vec<Hospital>> {
        let mut all = self.hospitals.list(Namespace::Public).await?;
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    pub async fn update(&self, actor: &Actor, id: Uuid, update: HospitalUpdate) -> MedResult<Hospital> {
        actor.require_admin_of(id)?;
        self.hospitals
            .update(Namespace::Public, id, |h| update.clone().apply(h).map_err(MedError::from))
            .await
    }

    pub async fn add_domain(&self, actor: &Actor, id: Uuid, domain: &str) -> MedResult<Hospital> {
        actor.require_admin_of(id)?;
        let domain = normalize_domain(domain)?;
        self.get(id).await?;
        self.domains.claim(Namespace::Public, &domain, id).await?;
        self.hospitals
            .update(Namespace::Public, id, |h| {
                if !h.domains.contains(&domain) {
                    h.domains.push(domain.clone());
                    h.domains.sort();
                    h.updated_at = Utc::now();
                }
                Ok(())
            })
            .await
    }

    pub async fn set_active(&self, actor: &Actor, id: Uuid, active: bool) -> MedResult<Hospital> {
        actor.require_platform_admin()?;
        let hospital = self
            .hospitals
            .update(Namespace::Public, id, |h| {
                h.is_active = active;
                h.updated_at = Utc::now();
                Ok(())
            })
            .await?;
        if !active {
            warn!(tenant = %id, "hospital deactivated");
        }
        Ok(hospital)
    }

    /// Finds an active hospital by schema name or by one of its domains.
    pub async fn resolve(&self, key: &str) -> MedResult<Hospital> {
        let key = key.trim().to_ascii_lowercase();
        let mut owner = None;
        if let Ok(schema) = Identifier::new(key.clone()) {
            owner = self.schemas.lookup(Namespace::Public, schema.as_str()).await?;
        }
        if owner.is_none() {
            if let Ok(domain) = normalize_domain(&key) {
                owner = self.domains.lookup(Namespace::Public, &domain).await?;
            }
        }
        let id = owner.ok_or_else(|| MedError::not_found("Hospital", &key))?;
        let hospital = self.get(id).await?;
        ensure_active(&hospital)?;
        Ok(hospital)
    }

    /// Scope of an active hospital.
    pub async fn scope_of(&self, tenant_id: Uuid) -> MedResult<TenantScope> {
        let hospital = self.get(tenant_id).await?;
        ensure_active(&hospital)?;
        Ok(TenantScope::from(&hospital))
    }
}

fn ensure_active(hospital: &Hospital) -> MedResult<()> {
    if hospital.is_active {
        Ok(())
    } else {
        Err(MedError::PermissionDenied(format!("hospital '{}' is inactive", hospital.schema_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_engine::InMemoryStorage;
    use models::medical::UserRole;

    fn service() -> TenantService {
        TenantService::new(Arc::new(InMemoryStorage::new()))
    }

    fn root() -> Actor {
        Actor::new(Uuid::new_v4(), UserRole::Admin, None)
    }

    fn new_hospital(schema: &str, domains: &[&str]) -> NewHospital {
        NewHospital {
            name: format!("{schema} hospital"),
            schema_name: schema.into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            address: None,
            phone: None,
            email: None,
        }
    }

    #[tokio::test]
    async fn resolves_by_schema_and_domain() {
        let tenants = service();
        let created = tenants.create_tenant(&root(), new_hospital("stmary", &["StMary.Example.org"])).await.unwrap();
        assert_eq!(created.domains, vec!["stmary.example.org".to_string()]);
        assert_eq!(tenants.resolve("stmary").await.unwrap().id, created.id);
        assert_eq!(tenants.resolve("stmary.example.org").await.unwrap().id, created.id);
        assert!(matches!(tenants.resolve("nowhere.org").await, Err(MedError::NotFound { .. })));
    }

    #[tokio::test]
    async fn schema_and_domains_are_unique() {
        let tenants = service();
        tenants.create_tenant(&root(), new_hospital("north", &["north.org"])).await.unwrap();
        let dup_schema = tenants.create_tenant(&root(), new_hospital("north", &[])).await;
        assert!(matches!(dup_schema, Err(MedError::AlreadyExists(_))));

        let dup_domain = tenants.create_tenant(&root(), new_hospital("south", &["south.org", "north.org"])).await;
        assert!(matches!(dup_domain, Err(MedError::AlreadyExists(_))));
        // The failed attempt released what it had claimed.
        tenants.create_tenant(&root(), new_hospital("south", &["south.org"])).await.unwrap();
    }

    #[tokio::test]
    async fn only_platform_admins_create_or_toggle() {
        let tenants = service();
        let hospital = tenants.create_tenant(&root(), new_hospital("east", &[])).await.unwrap();
        let local_admin = Actor::new(Uuid::new_v4(), UserRole::Admin, Some(hospital.id));
        assert!(matches!(
            tenants.create_tenant(&local_admin, new_hospital("west", &[])).await,
            Err(MedError::PermissionDenied(_))
        ));
        assert!(tenants.set_active(&local_admin, hospital.id, false).await.is_err());

        tenants.set_active(&root(), hospital.id, false).await.unwrap();
        assert!(matches!(tenants.resolve("east").await, Err(MedError::PermissionDenied(_))));
        assert!(tenants.scope_of(hospital.id).await.is_err());
    }

    #[tokio::test]
    async fn tenant_admin_adds_domains() {
        let tenants = service();
        let hospital = tenants.create_tenant(&root(), new_hospital("lakeside", &[])).await.unwrap();
        let admin = Actor::new(Uuid::new_v4(), UserRole::Admin, Some(hospital.id));
        let updated = tenants.add_domain(&admin, hospital.id, "lakeside.health").await.unwrap();
        assert_eq!(updated.domains, vec!["lakeside.health".to_string()]);
        assert_eq!(tenants.resolve("lakeside.health").await.unwrap().id, hospital.id);

        let nurse = Actor::new(Uuid::new_v4(), UserRole::Nurse, Some(hospital.id));
        assert!(tenants.add_domain(&nurse, hospital.id, "other.health").await.is_err());
    }
}
