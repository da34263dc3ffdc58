// lib/src/users.rs
//! Accounts, authentication and the per-hospital doctor/patient profiles.

use std::sync::Arc;

use chrono::Utc;
use models::billing::LimitKind;
use models::medical::user::validate_password;
use models::medical::{
    DoctorProfile, DoctorProfileInput, Hospital, NewUser, PatientProfile, PatientProfileInput, User, UserRole,
    UserUpdate, UserView,
};
use models::{MedError, MedResult};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::billing::BillingService;
use crate::context::{Actor, TenantScope};
use crate::locks::KeyedLocks;
use crate::notifications::{templates, Mailer};
use crate::storage_engine::{Namespace, Repository, StorageEngine, UniqueIndex};
use crate::tenants::TenantService;

const INVALID_CREDENTIALS: &str = "invalid username or password";

/// A doctor as listed to patients: public account data plus profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorListing {
    pub user: UserView,
    pub profile: DoctorProfile,
}

#[derive(Debug, Clone)]
pub struct UserService {
    users: Repository<User>,
    usernames: UniqueIndex,
    doctors: Repository<DoctorProfile>,
    patients: Repository<PatientProfile>,
    tenants: TenantService,
    billing: BillingService,
    mailer: Mailer,
    password_cost: u32,
    /// Held per hospital from the plan-limit count until the account is stored.
    seat_locks: Arc<KeyedLocks<Uuid>>,
}

fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

async fn hash_blocking(new_user: NewUser, cost: u32) -> MedResult<User> {
    tokio::task::spawn_blocking(move || User::from_new_user(new_user, cost))
        .await
        .map_err(|e| MedError::InternalError(format!("password hashing task failed: {}", e)))?
}

async fn verify_blocking(password: String, hash: String) -> MedResult<bool> {
    tokio::task::spawn_blocking(move || User::verify_password(&password, &hash))
        .await
        .map_err(|e| MedError::InternalError(format!("password check task failed: {}", e)))?
        .map_err(MedError::from)
}

impl UserService {
    pub fn new(
        engine: Arc<dyn StorageEngine>,
        tenants: TenantService,
        billing: BillingService,
        mailer: Mailer,
        password_cost: u32,
    ) -> Self {
        UserService {
            users: Repository::new(engine.clone()),
            usernames: UniqueIndex::new(engine.clone(), "username"),
            doctors: Repository::new(engine.clone()),
            patients: Repository::new(engine),
            tenants,
            billing,
            mailer,
            password_cost,
            seat_locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Creates an account. Without an actor only patients may sign up, and
    /// only into an active hospital.
    pub async fn register(&self, actor: Option<&Actor>, new_user: NewUser) -> MedResult<User> {
        new_user.validate()?;
        let hospital = match new_user.tenant_id {
            None => {
                match actor {
                    Some(a) if a.is_platform_admin() => {}
                    _ => return Err(MedError::PermissionDenied("only platform administrators create platform accounts".into())),
                }
                None
            }
            Some(tenant_id) => {
                let hospital = self.tenants.get(tenant_id).await?;
                if !hospital.is_active {
                    return Err(MedError::PermissionDenied(format!("hospital '{}' is inactive", hospital.schema_name)));
                }
                self.check_registration_rights(actor, &new_user, tenant_id)?;
                Some(hospital)
            }
        };
        let _seat = match new_user.tenant_id {
            Some(tenant_id) => self.claim_seat(tenant_id, new_user.role).await?,
            None => None,
        };
        self.create_account(new_user, hospital.as_ref()).await
    }

    /// Checks the plan limit for one more active `role` account. The returned
    /// guard must be held until that account is stored.
    async fn claim_seat(&self, tenant_id: Uuid, role: UserRole) -> MedResult<Option<OwnedMutexGuard<()>>> {
        let Some(kind) = limit_kind(role) else {
            return Ok(None);
        };
        let guard = self.seat_locks.lock(tenant_id).await;
        let current = self.count_role(tenant_id, role).await?;
        self.billing.check_limit(tenant_id, kind, current).await?;
        Ok(Some(guard))
    }

    fn check_registration_rights(&self, actor: Option<&Actor>, new_user: &NewUser, tenant_id: Uuid) -> MedResult<()> {
        match actor {
            None if new_user.role == UserRole::Patient => Ok(()),
            None => Err(MedError::PermissionDenied("self-registration is limited to patients".into())),
            Some(a) if a.can_administer(tenant_id) => Ok(()),
            // Front desk staff enrol patients.
            Some(a) if new_user.role == UserRole::Patient && a.role.is_staff() && a.tenant_id == Some(tenant_id) => Ok(()),
            Some(_) => Err(MedError::PermissionDenied("hospital administrator required to create staff accounts".into())),
        }
    }

    /// Creates a platform administrator without an acting user. Used by the
    /// command line to bootstrap a fresh installation; existing usernames
    /// are returned unchanged.
    pub async fn bootstrap_admin(&self, mut new_user: NewUser) -> MedResult<User> {
        new_user.role = UserRole::Admin;
        if let Some(id) = self.usernames.lookup(Namespace::Public, &username_key(&new_user.username)).await? {
            return self.users.require(Namespace::Public, id).await;
        }
        let hospital = match new_user.tenant_id {
            Some(tenant_id) => Some(self.tenants.get(tenant_id).await?),
            None => None,
        };
        self.create_account(new_user, hospital.as_ref()).await
    }

    async fn create_account(&self, new_user: NewUser, hospital: Option<&Hospital>) -> MedResult<User> {
        let key = username_key(&new_user.username);
        if self.usernames.lookup(Namespace::Public, &key).await?.is_some() {
            return Err(MedError::AlreadyExists(format!("username '{}' is already taken", new_user.username)));
        }
        let user = hash_blocking(new_user, self.password_cost).await?;
        self.usernames.claim(Namespace::Public, &key, user.id).await?;
        if let Err(e) = self.users.insert(Namespace::Public, &user).await {
            self.usernames.release(Namespace::Public, &key, user.id).await?;
            return Err(e);
        }

        if let Some(hospital) = hospital {
            let ns = TenantScope::from(hospital).namespace();
            match user.role {
                UserRole::Doctor => self.doctors.save(ns, &DoctorProfile::placeholder(user.id)).await?,
                UserRole::Patient => self.patients.save(ns, &PatientProfile::placeholder(user.id)).await?,
                UserRole::Nurse | UserRole::Admin => {}
            }
        }
        self.mailer.enqueue(templates::welcome(&user, hospital.map(|h| h.name.as_str())));
        info!(user = %user.id, username = %user.username, role = %user.role, tenant = ?user.tenant_id, "account created");
        Ok(user)
    }

    /// Checks credentials. Unknown usernames and wrong passwords produce the
    /// same error.
    pub async fn authenticate(&self, username: &str, password: &str) -> MedResult<User> {
        let Some(id) = self.usernames.lookup(Namespace::Public, &username_key(username)).await? else {
            debug!(username, "login for unknown username");
            return Err(MedError::AuthenticationError(INVALID_CREDENTIALS.into()));
        };
        let Some(user) = self.users.get(Namespace::Public, id).await? else {
            return Err(MedError::AuthenticationError(INVALID_CREDENTIALS.into()));
        };
        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            warn!(username, "failed login attempt");
            return Err(MedError::AuthenticationError(INVALID_CREDENTIALS.into()));
        }
        if !user.is_active {
            return Err(MedError::AuthenticationError("account is disabled".into()));
        }
        if let Some(tenant_id) = user.tenant_id {
            if !self.tenants.get(tenant_id).await?.is_active {
                return Err(MedError::AuthenticationError("hospital account is inactive".into()));
            }
        }
        self.users
            .update(Namespace::Public, user.id, |u| {
                u.last_login = Some(Utc::now());
                Ok(())
            })
            .await
    }

    pub async fn find_by_username(&self, username: &str) -> MedResult<Option<User>> {
        match self.usernames.lookup(Namespace::Public, &username_key(username)).await? {
            Some(id) => self.users.get(Namespace::Public, id).await,
            None => Ok(None),
        }
    }

    /// Loads an active account for token based requests.
    pub async fn active_user(&self, id: Uuid) -> MedResult<User> {
        let user = self
            .users
            .get(Namespace::Public, id)
            .await?
            .ok_or_else(|| MedError::AuthenticationError("account no longer exists".into()))?;
        if !user.is_active {
            return Err(MedError::AuthenticationError("account is disabled".into()));
        }
        Ok(user)
    }

    pub async fn get_user(&self, actor: &Actor, id: Uuid) -> MedResult<User> {
        let user = self.users.require(Namespace::Public, id).await?;
        let visible = actor.user_id == id
            || actor.is_platform_admin()
            || user.tenant_id.is_some_and(|t| actor.tenant_id == Some(t) && (actor.role.is_staff() || user.role == UserRole::Doctor));
        if visible {
            Ok(user)
        } else {
            // Do not reveal accounts of other hospitals.
            Err(MedError::not_found("User", id))
        }
    }

    pub async fn list_users(&self, actor: &Actor, tenant_id: Uuid, role: Option<UserRole>) -> MedResult<Vec<User>> {
        if !(actor.is_platform_admin() || (actor.role.is_staff() && actor.tenant_id == Some(tenant_id))) {
            return Err(MedError::PermissionDenied("staff access required".into()));
        }
        let mut users = self
            .users
            .filter(Namespace::Public, |u| u.tenant_id == Some(tenant_id) && role.is_none_or(|r| u.role == r))
            .await?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    pub async fn count_role(&self, tenant_id: Uuid, role: UserRole) -> MedResult<usize> {
        Ok(self
            .users
            .filter(Namespace::Public, |u| u.tenant_id == Some(tenant_id) && u.role == role && u.is_active)
            .await?
            .len())
    }

    pub async fn update_user(&self, actor: &Actor, id: Uuid, update: UserUpdate) -> MedResult<User> {
        let target = self.users.require(Namespace::Public, id).await?;
        if actor.user_id != id && !administers(actor, &target) {
            return Err(MedError::PermissionDenied("cannot edit this account".into()));
        }
        self.users
            .update(Namespace::Public, id, |u| update.clone().apply(u).map_err(MedError::from))
            .await
    }

    pub async fn set_active(&self, actor: &Actor, id: Uuid, active: bool) -> MedResult<User> {
        if actor.user_id == id {
            return Err(MedError::Conflict("you cannot change the status of your own account".into()));
        }
        let target = self.users.require(Namespace::Public, id).await?;
        if !administers(actor, &target) {
            return Err(MedError::PermissionDenied("hospital administrator required".into()));
        }
        let _seat = match target.tenant_id {
            Some(tenant_id) if active && !target.is_active => self.claim_seat(tenant_id, target.role).await?,
            _ => None,
        };
        let user = self
            .users
            .update(Namespace::Public, id, |u| {
                u.is_active = active;
                u.updated_at = Utc::now();
                Ok(())
            })
            .await?;
        info!(user = %id, active, "account status changed");
        Ok(user)
    }

    pub async fn change_password(&self, actor: &Actor, current: &str, new_password: &str) -> MedResult<()> {
        validate_password(new_password)?;
        let user = self.users.require(Namespace::Public, actor.user_id).await?;
        if !verify_blocking(current.to_string(), user.password_hash.clone()).await? {
            return Err(MedError::AuthenticationError("current password is incorrect".into()));
        }
        let cost = self.password_cost;
        let password = new_password.to_string();
        let hash = tokio::task::spawn_blocking(move || User::hash_password(&password, cost))
            .await
            .map_err(|e| MedError::InternalError(format!("password hashing task failed: {}", e)))??;
        self.users
            .update(Namespace::Public, actor.user_id, |u| {
                u.password_hash = hash.clone();
                u.updated_at = Utc::now();
                Ok(())
            })
            .await?;
        info!(user = %actor.user_id, "password changed");
        Ok(())
    }

    /// An active account of `role` belonging to the scoped hospital.
    pub async fn require_member(&self, scope: &TenantScope, user_id: Uuid, role: UserRole) -> MedResult<User> {
        let user = self
            .users
            .get(Namespace::Public, user_id)
            .await?
            .filter(|u| u.tenant_id == Some(scope.tenant_id) && u.role == role)
            .ok_or_else(|| MedError::not_found(role_entity(role), user_id))?;
        if !user.is_active {
            return Err(MedError::InvalidData(format!("{} {} is inactive", role, user_id)));
        }
        Ok(user)
    }

    // --- Profiles ---

    pub async fn upsert_doctor_profile(
        &self,
        scope: &TenantScope,
        actor: &Actor,
        user_id: Uuid,
        input: DoctorProfileInput,
    ) -> MedResult<DoctorProfile> {
        if actor.user_id != user_id && !actor.can_administer(scope.tenant_id) {
            return Err(MedError::PermissionDenied("only the doctor or an administrator may edit this profile".into()));
        }
        self.require_member(scope, user_id, UserRole::Doctor).await?;
        let profile = input.into_profile(user_id)?;
        self.doctors.save(scope.namespace(), &profile).await?;
        Ok(profile)
    }

    pub async fn get_doctor_profile(&self, scope: &TenantScope, user_id: Uuid) -> MedResult<DoctorProfile> {
        self.doctors.require(scope.namespace(), user_id).await
    }

    pub async fn upsert_patient_profile(
        &self,
        scope: &TenantScope,
        actor: &Actor,
        user_id: Uuid,
        input: PatientProfileInput,
    ) -> MedResult<PatientProfile> {
        self.check_patient_access(scope, actor, user_id)?;
        self.require_member(scope, user_id, UserRole::Patient).await?;
        let profile = input.into_profile(user_id)?;
        self.patients.save(scope.namespace(), &profile).await?;
        Ok(profile)
    }

    pub async fn get_patient_profile(&self, scope: &TenantScope, actor: &Actor, user_id: Uuid) -> MedResult<PatientProfile> {
        self.check_patient_access(scope, actor, user_id)?;
        self.patients.require(scope.namespace(), user_id).await
    }

    fn check_patient_access(&self, scope: &TenantScope, actor: &Actor, patient_id: Uuid) -> MedResult<()> {
        if actor.user_id == patient_id || (actor.role.is_staff() && actor.belongs_to(scope.tenant_id)) {
            Ok(())
        } else {
            Err(MedError::PermissionDenied("patient records are private".into()))
        }
    }

    /// Active doctors of the hospital, optionally by specialization
    /// (case-insensitive substring).
    pub async fn list_doctors(&self, scope: &TenantScope, specialization: Option<&str>) -> MedResult<Vec<DoctorListing>> {
        let wanted = specialization.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let doctors = self
            .users
            .filter(Namespace::Public, |u| {
                u.tenant_id == Some(scope.tenant_id) && u.role == UserRole::Doctor && u.is_active
            })
            .await?;
        let mut listings = Vec::with_capacity(doctors.len());
        for doctor in doctors {
            let profile = self
                .doctors
                .get(scope.namespace(), doctor.id)
                .await?
                .unwrap_or_else(|| DoctorProfile::placeholder(doctor.id));
            if wanted.as_deref().is_none_or(|w| profile.specialization.contains(w)) {
                listings.push(DoctorListing { user: UserView::from(&doctor), profile });
            }
        }
        listings.sort_by(|a, b| a.user.last.cmp(&b.user.last).then_with(|| a.user.first.cmp(&b.user.first)));
        Ok(listings)
    }
}

fn administers(actor: &Actor, target: &User) -> bool {
    match target.tenant_id {
        Some(tenant_id) => actor.can_administer(tenant_id),
        None => actor.is_platform_admin(),
    }
}

fn limit_kind(role: UserRole) -> Option<LimitKind> {
    match role {
        UserRole::Doctor => Some(LimitKind::Doctors),
        UserRole::Patient => Some(LimitKind::Patients),
        UserRole::Nurse | UserRole::Admin => None,
    }
}

fn role_entity(role: UserRole) -> &'static str {
    match role {
        UserRole::Patient => "Patient",
        UserRole::Doctor => "Doctor",
        UserRole::Nurse => "Nurse",
        UserRole::Admin => "Administrator",
    }
}
