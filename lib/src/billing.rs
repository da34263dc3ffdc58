// lib/src/billing.rs
//! Subscription plans, tenant subscriptions, payments and plan limits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use models::billing::{
    LimitKind, NewPlan, Payment, PaymentStatus, Subscription, SubscriptionPlan, SubscriptionStatus,
};
use models::medical::Hospital;
use models::{MedError, MedResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::context::Actor;
use crate::locks::KeyedLocks;
use crate::notifications::{templates, Mailer};
use crate::storage_engine::{Namespace, Repository, StorageEngine};

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub tenant_id: Uuid,
    pub subscription_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved { reference: String },
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    fn method(&self) -> &'static str;
    async fn charge(&self, request: &ChargeRequest) -> MedResult<ChargeOutcome>;
    async fn refund(&self, payment: &Payment) -> MedResult<()>;
}

/// Gateway for invoiced customers: every charge is approved and settled
/// out of band.
#[derive(Debug, Default, Clone)]
pub struct ManualGateway;

#[async_trait]
impl PaymentGateway for ManualGateway {
    fn method(&self) -> &'static str {
        "manual"
    }

    async fn charge(&self, _request: &ChargeRequest) -> MedResult<ChargeOutcome> {
        Ok(ChargeOutcome::Approved { reference: format!("manual-{}", Uuid::new_v4().simple()) })
    }

    async fn refund(&self, _payment: &Payment) -> MedResult<()> {
        Ok(())
    }
}

/// What one `process_due` pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub renewed: usize,
    pub past_due: usize,
    pub cancelled: usize,
    pub expired: usize,
}

#[derive(Clone)]
pub struct BillingService {
    plans: Repository<SubscriptionPlan>,
    subscriptions: Repository<Subscription>,
    payments: Repository<Payment>,
    hospitals: Repository<Hospital>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Mailer,
    config: BillingConfig,
    subscribe_lock: Arc<Mutex<()>>,
    /// Held per subscription while it is renewed, cancelled or expired.
    lifecycle_locks: Arc<KeyedLocks<Uuid>>,
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService").field("gateway", &self.gateway.method()).finish()
    }
}

impl BillingService {
    pub fn new(engine: Arc<dyn StorageEngine>, gateway: Arc<dyn PaymentGateway>, mailer: Mailer, config: BillingConfig) -> Self {
        BillingService {
            plans: Repository::new(engine.clone()),
            subscriptions: Repository::new(engine.clone()),
            payments: Repository::new(engine.clone()),
            hospitals: Repository::new(engine),
            gateway,
            mailer,
            config,
            subscribe_lock: Arc::new(Mutex::new(())),
            lifecycle_locks: Arc::new(KeyedLocks::new()),
        }
    }

    fn grace(&self) -> Duration {
        Duration::days(i64::from(self.config.grace_days))
    }

    // --- Plans ---

    pub async fn create_plan(&self, actor: &Actor, new: NewPlan) -> MedResult<SubscriptionPlan> {
        actor.require_platform_admin()?;
        let plan = new.into_plan()?;
        let duplicate = self
            .plans
            .filter(Namespace::Public, |p| p.is_active && p.name.eq_ignore_ascii_case(&plan.name))
            .await?;
        if !duplicate.is_empty() {
            return Err(MedError::AlreadyExists(format!("plan '{}'", plan.name)));
        }
        self.plans.insert(Namespace::Public, &plan).await?;
        info!(plan = %plan.name, price_cents = plan.price_cents, "plan created");
        Ok(plan)
    }

    pub async fn get_plan(&self, id: Uuid) -> MedResult<SubscriptionPlan> {
        self.plans.require(Namespace::Public, id).await
    }

    pub async fn list_plans(&self, active_only: bool) -> MedResult<Vec<SubscriptionPlan>> {
        let mut plans = self.plans.filter(Namespace::Public, |p| !active_only || p.is_active).await?;
        plans.sort_by(|a, b| a.price_cents.cmp(&b.price_cents).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    pub async fn deactivate_plan(&self, actor: &Actor, id: Uuid) -> MedResult<SubscriptionPlan> {
        actor.require_platform_admin()?;
        self.plans
            .update(Namespace::Public, id, |p| {
                p.is_active = false;
                Ok(())
            })
            .await
    }

    // --- Subscriptions ---

    pub async fn current_subscription(&self, tenant_id: Uuid) -> MedResult<Option<Subscription>> {
        let mut live = self
            .subscriptions
            .filter(Namespace::Public, |s| s.tenant_id == tenant_id && s.status.is_live())
            .await?;
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(live.into_iter().next())
    }

    pub async fn subscribe(&self, actor: &Actor, tenant_id: Uuid, plan_id: Uuid) -> MedResult<Subscription> {
        actor.require_admin_of(tenant_id)?;
        let plan = self.get_plan(plan_id).await?;
        if !plan.is_active {
            return Err(MedError::InvalidData(format!("plan '{}' is no longer offered", plan.name)));
        }
        self.hospitals.require(Namespace::Public, tenant_id).await?;

        let _guard = self.subscribe_lock.lock().await;
        if self.current_subscription(tenant_id).await?.is_some() {
            return Err(MedError::Conflict("hospital already has a live subscription".into()));
        }

        let now = Utc::now();
        let mut subscription = Subscription {
            id: Uuid::new_v4(),
            tenant_id,
            plan_id,
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: plan.interval.advance(now),
            cancel_at_period_end: false,
            trial_end: None,
            created_at: now,
            updated_at: now,
        };

        if self.config.trial_days > 0 && !plan.is_free() {
            let trial_end = now + Duration::days(i64::from(self.config.trial_days));
            subscription.status = SubscriptionStatus::Trialing;
            subscription.current_period_end = trial_end;
            subscription.trial_end = Some(trial_end);
        } else if !plan.is_free() {
            let payment = self.charge(&plan, &subscription).await?;
            if payment.status != PaymentStatus::Succeeded {
                return Err(MedError::InvalidData(format!(
                    "payment declined: {}",
                    payment.failure_reason.unwrap_or_default()
                )));
            }
        }

        self.subscriptions.insert(Namespace::Public, &subscription).await?;
        info!(tenant = %tenant_id, plan = %plan.name, status = ?subscription.status, "subscription started");
        Ok(subscription)
    }

    /// Charges the plan price and records the payment, whatever the outcome.
    async fn charge(&self, plan: &SubscriptionPlan, subscription: &Subscription) -> MedResult<Payment> {
        let request = ChargeRequest {
            tenant_id: subscription.tenant_id,
            subscription_id: subscription.id,
            amount_cents: plan.price_cents,
            currency: plan.currency.clone(),
            description: format!("{} plan", plan.name),
        };
        let outcome = self.gateway.charge(&request).await?;
        let now = Utc::now();
        let mut payment = Payment {
            id: Uuid::new_v4(),
            tenant_id: subscription.tenant_id,
            subscription_id: subscription.id,
            amount_cents: plan.price_cents,
            currency: plan.currency.clone(),
            status: PaymentStatus::Pending,
            method: self.gateway.method().to_string(),
            reference: None,
            failure_reason: None,
            created_at: now,
            processed_at: Some(now),
        };
        match outcome {
            ChargeOutcome::Approved { reference } => {
                payment.status = PaymentStatus::Succeeded;
                payment.reference = Some(reference);
            }
            ChargeOutcome::Declined { reason } => {
                warn!(tenant = %subscription.tenant_id, %reason, "charge declined");
                payment.status = PaymentStatus::Failed;
                payment.failure_reason = Some(reason);
            }
        }
        self.payments.insert(Namespace::Public, &payment).await?;
        if payment.status == PaymentStatus::Succeeded {
            self.send_receipt(plan, &payment).await;
        }
        Ok(payment)
    }

    async fn send_receipt(&self, plan: &SubscriptionPlan, payment: &Payment) {
        match self.hospitals.get(Namespace::Public, payment.tenant_id).await {
            Ok(Some(Hospital { email: Some(email), .. })) => {
                self.mailer.enqueue(templates::payment_receipt(&email, plan, payment));
            }
            Ok(_) => {}
            Err(e) => warn!(tenant = %payment.tenant_id, "could not load hospital for receipt: {}", e),
        }
    }

    /// Starts the next billing period. Due trialing/active subscriptions and
    /// past-due ones can be renewed; a pending cancellation takes effect instead.
    pub async fn renew(&self, subscription_id: Uuid, now: DateTime<Utc>) -> MedResult<Subscription> {
        let _guard = self.lifecycle_locks.lock(subscription_id).await;
        let subscription = self.subscriptions.require(Namespace::Public, subscription_id).await?;
        let observed_status = subscription.status;
        let observed_end = subscription.current_period_end;
        let past_due = observed_status == SubscriptionStatus::PastDue;
        if !past_due && !subscription.is_due(now) {
            return Err(MedError::Conflict("subscription is not due for renewal".into()));
        }
        let unchanged = move |s: &Subscription| {
            if s.status == observed_status && s.current_period_end == observed_end {
                Ok(())
            } else {
                Err(MedError::Conflict("subscription changed during renewal".into()))
            }
        };

        if subscription.cancel_at_period_end {
            return self
                .subscriptions
                .update(Namespace::Public, subscription_id, |s| {
                    unchanged(s)?;
                    s.status = SubscriptionStatus::Cancelled;
                    s.updated_at = now;
                    Ok(())
                })
                .await;
        }

        let plan = self.get_plan(subscription.plan_id).await?;
        let payment = if plan.is_free() { None } else { Some(self.charge(&plan, &subscription).await?) };
        let approved = payment.as_ref().is_none_or(|p| p.status == PaymentStatus::Succeeded);

        let renewed = self
            .subscriptions
            .update(Namespace::Public, subscription_id, |s| {
                unchanged(s)?;
                if approved {
                    // A subscription that lapsed for more than a whole period restarts now.
                    let start = if past_due || plan.interval.advance(s.current_period_end) <= now {
                        now
                    } else {
                        s.current_period_end
                    };
                    s.current_period_start = start;
                    s.current_period_end = plan.interval.advance(start);
                    s.status = SubscriptionStatus::Active;
                } else {
                    s.status = SubscriptionStatus::PastDue;
                }
                s.updated_at = now;
                Ok(())
            })
            .await;

        if let (Err(MedError::Conflict(_)), Some(payment)) = (&renewed, &payment) {
            if payment.status == PaymentStatus::Succeeded {
                warn!(subscription = %subscription_id, payment = %payment.id, "renewal lost a race, refunding charge");
                self.void_payment(payment).await?;
            }
        }
        renewed
    }

    /// Refunds a charge whose renewal could not be applied.
    async fn void_payment(&self, payment: &Payment) -> MedResult<()> {
        self.gateway.refund(payment).await?;
        self.payments
            .update(Namespace::Public, payment.id, |p| {
                p.status = PaymentStatus::Refunded;
                p.processed_at = Some(Utc::now());
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn cancel(&self, actor: &Actor, tenant_id: Uuid, at_period_end: bool) -> MedResult<Subscription> {
        actor.require_admin_of(tenant_id)?;
        let current = self
            .current_subscription(tenant_id)
            .await?
            .ok_or_else(|| MedError::not_found("Subscription", tenant_id))?;
        let _guard = self.lifecycle_locks.lock(current.id).await;
        let now = Utc::now();
        let cancelled = self
            .subscriptions
            .update(Namespace::Public, current.id, |s| {
                if !s.status.is_live() {
                    return Err(MedError::Conflict("subscription has already ended".into()));
                }
                if at_period_end {
                    s.cancel_at_period_end = true;
                } else {
                    s.status = SubscriptionStatus::Cancelled;
                    s.current_period_end = now;
                }
                s.updated_at = now;
                Ok(())
            })
            .await?;
        info!(tenant = %tenant_id, at_period_end, "subscription cancelled");
        Ok(cancelled)
    }

    pub async fn refund(&self, actor: &Actor, payment_id: Uuid) -> MedResult<Payment> {
        actor.require_platform_admin()?;
        let payment = self.payments.require(Namespace::Public, payment_id).await?;
        if payment.status != PaymentStatus::Succeeded {
            return Err(MedError::Conflict("only succeeded payments can be refunded".into()));
        }
        self.gateway.refund(&payment).await?;
        self.payments
            .update(Namespace::Public, payment_id, |p| {
                if p.status != PaymentStatus::Succeeded {
                    return Err(MedError::Conflict("payment was refunded concurrently".into()));
                }
                p.status = PaymentStatus::Refunded;
                p.processed_at = Some(Utc::now());
                Ok(())
            })
            .await
    }

    pub async fn list_payments(&self, tenant_id: Uuid) -> MedResult<Vec<Payment>> {
        let mut payments = self.payments.filter(Namespace::Public, |p| p.tenant_id == tenant_id).await?;
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    /// Periodic sweep: renews what is due and expires past-due subscriptions
    /// whose grace period ran out.
    pub async fn process_due(&self, now: DateTime<Utc>) -> MedResult<SweepReport> {
        let mut report = SweepReport::default();
        let grace = self.grace();
        for subscription in self.subscriptions.list(Namespace::Public).await? {
            if subscription.is_due(now) {
                match self.renew(subscription.id, now).await {
                    Ok(s) => match s.status {
                        SubscriptionStatus::Active => report.renewed += 1,
                        SubscriptionStatus::PastDue => report.past_due += 1,
                        SubscriptionStatus::Cancelled => report.cancelled += 1,
                        _ => {}
                    },
                    Err(e) => warn!(subscription = %subscription.id, "renewal failed: {}", e),
                }
            } else if subscription.status == SubscriptionStatus::PastDue
                && now >= subscription.current_period_end + grace
            {
                let _guard = self.lifecycle_locks.lock(subscription.id).await;
                let expired = self
                    .subscriptions
                    .update(Namespace::Public, subscription.id, |s| {
                        if s.status != SubscriptionStatus::PastDue {
                            return Err(MedError::Conflict("subscription changed before expiry".into()));
                        }
                        s.status = SubscriptionStatus::Expired;
                        s.updated_at = now;
                        Ok(())
                    })
                    .await;
                match expired {
                    Ok(_) => {
                        warn!(tenant = %subscription.tenant_id, "subscription expired after grace period");
                        report.expired += 1;
                    }
                    Err(MedError::Conflict(reason)) => debug!(subscription = %subscription.id, %reason, "expiry skipped"),
                    Err(e) => return Err(e),
                }
            }
        }
        if report != SweepReport::default() {
            info!(?report, "billing sweep finished");
        }
        Ok(report)
    }

    /// Fails with `LimitExceeded` when a tenant already holding `current`
    /// accounts of `kind` may not add another one.
    pub async fn check_limit(&self, tenant_id: Uuid, kind: LimitKind, current: usize) -> MedResult<()> {
        let now = Utc::now();
        let limit = match self.current_subscription(tenant_id).await? {
            Some(s) if s.is_usable(now, self.grace()) => self.get_plan(s.plan_id).await?.limit(kind),
            _ => match kind {
                LimitKind::Doctors => self.config.free_max_doctors,
                LimitKind::Patients => self.config.free_max_patients,
            },
        };
        match limit {
            Some(max) if current >= max as usize => Err(MedError::LimitExceeded(format!(
                "{} limit of {} reached for this plan",
                match kind {
                    LimitKind::Doctors => "doctor",
                    LimitKind::Patients => "patient",
                },
                max
            ))),
            _ => Ok(()),
        }
    }
}
