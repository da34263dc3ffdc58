// models/src/billing/mod.rs
pub mod payment;
pub mod plan;
pub mod subscription;

pub use payment::{Payment, PaymentStatus};
pub use plan::{BillingInterval, LimitKind, NewPlan, SubscriptionPlan};
pub use subscription::{Subscription, SubscriptionStatus};
