// lib/src/seed.rs
//! Demo data for a fresh installation. Running it twice changes nothing.

use chrono::{Duration, NaiveTime, Utc, Weekday};
use models::billing::{BillingInterval, NewPlan};
use models::medical::{NewHospital, NewUser, RecurringSlotRequest, UserRole};
use models::{MedError, MedResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::context::{Actor, TenantScope};
use crate::platform::Platform;

pub const DEMO_SCHEMA: &str = "demo";
pub const DEMO_PASSWORD: &str = "medcor-demo";

/// Credentials of the platform administrator the seed ensures.
#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub tenant_id: Option<Uuid>,
    pub plans_created: usize,
    pub users_created: usize,
    pub slots_created: usize,
}

fn demo_plans() -> Vec<NewPlan> {
    vec![
        NewPlan {
            name: "Starter".into(),
            description: Some("Small practices".into()),
            price_cents: 4_900,
            currency: "USD".into(),
            interval: BillingInterval::Monthly,
            max_doctors: Some(5),
            max_patients: Some(500),
            features: vec!["appointments".into(), "email reminders".into()],
        },
        NewPlan {
            name: "Hospital".into(),
            description: Some("Unlimited staff and patients".into()),
            price_cents: 199_000,
            currency: "USD".into(),
            interval: BillingInterval::Yearly,
            max_doctors: None,
            max_patients: None,
            features: vec!["appointments".into(), "email reminders".into(), "ai assistant".into()],
        },
    ]
}

fn person(first: &str, last: &str, username: &str, role: UserRole, tenant_id: Option<Uuid>, password: &str) -> NewUser {
    NewUser {
        first: first.into(),
        last: last.into(),
        username: username.into(),
        email: format!("{username}@demo.medcor.local"),
        password: password.into(),
        phone: None,
        role,
        tenant_id,
    }
}

fn clock(hour: u32) -> MedResult<NaiveTime> {
    NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| MedError::InternalError(format!("invalid hour {hour}")))
}

pub async fn seed_demo(platform: &Platform, options: &SeedOptions) -> MedResult<SeedSummary> {
    let mut summary = SeedSummary::default();

    let root = match platform.users.find_by_username(&options.admin_username).await? {
        Some(user) => user,
        None => {
            summary.users_created += 1;
            let mut admin = person("Platform", "Admin", &options.admin_username, UserRole::Admin, None, &options.admin_password);
            admin.email = options.admin_email.clone();
            platform.users.bootstrap_admin(admin).await?
        }
    };
    if !root.is_platform_admin() {
        return Err(MedError::Conflict(format!("'{}' exists but is not a platform administrator", root.username)));
    }
    let root = Actor::from(&root);

    let existing: Vec<String> = platform.billing.list_plans(true).await?.into_iter().map(|p| p.name.to_lowercase()).collect();
    for plan in demo_plans() {
        if !existing.contains(&plan.name.to_lowercase()) {
            platform.billing.create_plan(&root, plan).await?;
            summary.plans_created += 1;
        }
    }

    let hospital = match platform.tenants.resolve(DEMO_SCHEMA).await {
        Ok(hospital) => hospital,
        Err(MedError::NotFound { .. }) => {
            let new = NewHospital {
                name: "Medcor Demo Hospital".into(),
                schema_name: DEMO_SCHEMA.into(),
                domains: vec!["demo.medcor.local".into()],
                address: Some("1 Example Street".into()),
                phone: None,
                email: Some("office@demo.medcor.local".into()),
            };
            platform.tenants.create_tenant(&root, new).await?
        }
        Err(e) => return Err(e),
    };
    summary.tenant_id = Some(hospital.id);
    let scope = TenantScope::from(&hospital);

    let staff = [
        ("Gregory", "House", "demo_doctor", UserRole::Doctor),
        ("Carla", "Espinosa", "demo_nurse", UserRole::Nurse),
        ("John", "Doe", "demo_patient", UserRole::Patient),
    ];
    let mut doctor = None;
    for (first, last, username, role) in staff {
        let user = match platform.users.find_by_username(username).await? {
            Some(user) => user,
            None => {
                summary.users_created += 1;
                let new = person(first, last, username, role, Some(hospital.id), DEMO_PASSWORD);
                platform.users.register(Some(&root), new).await?
            }
        };
        if role == UserRole::Doctor {
            doctor = Some(user);
        }
    }

    if let Some(doctor) = doctor {
        let today = Utc::now().date_naive();
        let request = RecurringSlotRequest {
            doctor_id: Some(doctor.id),
            start_date: today + Duration::days(1),
            end_date: today + Duration::days(14),
            weekdays: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
            start_time: clock(9)?,
            end_time: clock(12)?,
            slot_minutes: 30,
            max_appointments: 1,
        };
        let outcome = platform.scheduling.generate_recurring_slots(&scope, &root, request).await?;
        summary.slots_created = outcome.created.len();
    }

    info!(?summary, "demo data seeded");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::ManualGateway;
    use crate::config::AppConfig;
    use crate::notifications::LogTransport;
    use crate::storage_engine::InMemoryStorage;
    use std::sync::Arc;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let (platform, _worker) = Platform::new(
            AppConfig::for_tests(),
            Arc::new(InMemoryStorage::new()),
            Arc::new(LogTransport),
            Arc::new(ManualGateway),
        );
        let options = SeedOptions {
            admin_username: "admin".into(),
            admin_email: "admin@medcor.local".into(),
            admin_password: "change-me-now".into(),
        };
        let first = seed_demo(&platform, &options).await.unwrap();
        assert_eq!(first.plans_created, 2);
        assert_eq!(first.users_created, 4);
        // Two weeks hold ten weekdays of six half-hour slots.
        assert_eq!(first.slots_created, 60);

        let second = seed_demo(&platform, &options).await.unwrap();
        assert_eq!(second.tenant_id, first.tenant_id);
        assert_eq!((second.plans_created, second.users_created, second.slots_created), (0, 0, 0));
        platform.users.authenticate("demo_patient", DEMO_PASSWORD).await.unwrap();
    }
}
