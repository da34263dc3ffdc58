// models/src/billing/subscription.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Live subscriptions block a second subscription for the same tenant.
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionStatus::Trialing | SubscriptionStatus::Active | SubscriptionStatus::PastDue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub trial_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the tenant currently enjoys the plan's limits. Past-due
    /// tenants keep access during the grace period.
    pub fn is_usable(&self, now: DateTime<Utc>, grace: chrono::Duration) -> bool {
        match self.status {
            SubscriptionStatus::Trialing | SubscriptionStatus::Active => now < self.current_period_end,
            SubscriptionStatus::PastDue => now < self.current_period_end + grace,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired => false,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, SubscriptionStatus::Trialing | SubscriptionStatus::Active) && now >= self.current_period_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(status: SubscriptionStatus, ends_in: Duration) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            status,
            current_period_start: now - Duration::days(30),
            current_period_end: now + ends_in,
            cancel_at_period_end: false,
            trial_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn past_due_is_usable_within_grace() {
        let sub = subscription(SubscriptionStatus::PastDue, Duration::days(-2));
        assert!(sub.is_usable(Utc::now(), Duration::days(3)));
        assert!(!sub.is_usable(Utc::now(), Duration::days(1)));
    }

    #[test]
    fn due_only_when_period_elapsed() {
        assert!(subscription(SubscriptionStatus::Active, Duration::seconds(-1)).is_due(Utc::now()));
        assert!(!subscription(SubscriptionStatus::Active, Duration::days(1)).is_due(Utc::now()));
        assert!(!subscription(SubscriptionStatus::Cancelled, Duration::days(-1)).is_due(Utc::now()));
    }
}
