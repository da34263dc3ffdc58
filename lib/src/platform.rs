// lib/src/platform.rs
//! Wires every service on top of one storage engine.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::ai::{ChatService, McpServer, SymptomAnalyzer};
use crate::billing::{BillingService, PaymentGateway, SweepReport};
use crate::config::AppConfig;
use crate::notifications::{EmailTransport, Mailer};
use crate::scheduling::SchedulingService;
use crate::storage_engine::StorageEngine;
use crate::tenants::TenantService;
use crate::treatments::TreatmentService;
use crate::users::UserService;

#[derive(Debug, Clone)]
pub struct Platform {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageEngine>,
    pub mailer: Mailer,
    pub tenants: TenantService,
    pub billing: BillingService,
    pub users: UserService,
    pub scheduling: SchedulingService,
    pub treatments: TreatmentService,
    pub analyzer: SymptomAnalyzer,
    pub chat: ChatService,
    pub mcp: McpServer,
}

impl Platform {
    /// Builds the services and starts the mail worker. The returned handle
    /// finishes once every `Mailer` clone is dropped.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn StorageEngine>,
        transport: Arc<dyn EmailTransport>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> (Platform, JoinHandle<()>) {
        let (mailer, mail_worker) = Mailer::spawn(transport, config.email.clone());
        let tenants = TenantService::new(storage.clone());
        let billing = BillingService::new(storage.clone(), gateway, mailer.clone(), config.billing.clone());
        let users = UserService::new(
            storage.clone(),
            tenants.clone(),
            billing.clone(),
            mailer.clone(),
            config.auth.password_hash_cost,
        );
        let scheduling = SchedulingService::new(storage.clone(), users.clone(), mailer.clone(), config.scheduling.clone());
        let treatments = TreatmentService::new(storage.clone(), users.clone());
        let analyzer = SymptomAnalyzer::new();
        let chat = ChatService::new(analyzer, &config.ai);
        let mcp = McpServer::new(analyzer, users.clone(), scheduling.clone());

        let platform = Platform {
            config: Arc::new(config),
            storage,
            mailer,
            tenants,
            billing,
            users,
            scheduling,
            treatments,
            analyzer,
            chat,
            mcp,
        };
        (platform, mail_worker)
    }

    /// Runs `process_due` every `billing.sweep_interval_secs` until aborted.
    pub fn spawn_billing_sweep(&self) -> JoinHandle<()> {
        let billing = self.billing.clone();
        let every = StdDuration::from_secs(self.config.billing.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match billing.process_due(Utc::now()).await {
                    Ok(report) if report == SweepReport::default() => {}
                    Ok(report) => info!(?report, "billing sweep finished"),
                    Err(e) => error!("billing sweep failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::billing::ManualGateway;
    use crate::context::{Actor, TenantScope};
    use crate::notifications::LogTransport;
    use crate::storage_engine::InMemoryStorage;
    use models::medical::{NewHospital, NewUser, User, UserRole};
    use uuid::Uuid;

    pub const PASSWORD: &str = "password123";

    pub fn new_user(username: &str, role: UserRole, tenant: Uuid) -> NewUser {
        NewUser {
            first: "Test".into(),
            last: username.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.org"),
            password: PASSWORD.into(),
            phone: None,
            role,
            tenant_id: Some(tenant),
        }
    }

    /// One active hospital with an administrator, a doctor, a nurse and a patient.
    pub struct TestPlatform {
        pub platform: Platform,
        pub root: User,
        pub admin: User,
        pub tenant: Uuid,
        pub scope: TenantScope,
        pub doctor: User,
        pub nurse: User,
        pub patient: User,
    }

    impl TestPlatform {
        pub async fn new() -> Self {
            let (platform, _worker) = Platform::new(
                AppConfig::for_tests(),
                Arc::new(InMemoryStorage::new()),
                Arc::new(LogTransport),
                Arc::new(ManualGateway),
            );
            let root = platform
                .users
                .bootstrap_admin(NewUser { tenant_id: None, ..new_user("root", UserRole::Admin, Uuid::nil()) })
                .await
                .unwrap();
            let hospital = platform
                .tenants
                .create_tenant(
                    &Actor::from(&root),
                    NewHospital {
                        name: "Clinic".into(),
                        schema_name: "clinic".into(),
                        domains: vec!["clinic.example.org".into()],
                        address: None,
                        phone: None,
                        email: Some("office@clinic.example.org".into()),
                    },
                )
                .await
                .unwrap();
            let root_actor = Actor::from(&root);
            let admin = platform
                .users
                .register(Some(&root_actor), new_user("clinic_admin", UserRole::Admin, hospital.id))
                .await
                .unwrap();
            let admin_actor = Actor::from(&admin);
            let mut staff = Vec::new();
            for (username, role) in [("drgrey", UserRole::Doctor), ("nurse_joy", UserRole::Nurse), ("patient_zero", UserRole::Patient)] {
                staff.push(platform.users.register(Some(&admin_actor), new_user(username, role, hospital.id)).await.unwrap());
            }
            let patient = staff.pop().unwrap();
            let nurse = staff.pop().unwrap();
            let doctor = staff.pop().unwrap();
            TestPlatform {
                platform,
                root,
                admin,
                tenant: hospital.id,
                scope: TenantScope::from(&hospital),
                doctor,
                nurse,
                patient,
            }
        }

        pub fn admin_actor(&self) -> Actor {
            Actor::from(&self.admin)
        }

        pub fn root_actor(&self) -> Actor {
            Actor::from(&self.root)
        }
    }
}
