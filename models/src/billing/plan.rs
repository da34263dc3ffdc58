// models/src/billing/plan.rs
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{require_non_empty, ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    /// End of a billing period starting at `from`. Calendar months, so a
    /// period starting on Jan 31 ends on the last day of February.
    pub fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            BillingInterval::Monthly => Months::new(1),
            BillingInterval::Yearly => Months::new(12),
        };
        from.checked_add_months(months).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Which plan limit a check is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    Doctors,
    Patients,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub interval: BillingInterval,
    /// `None` means unlimited.
    pub max_doctors: Option<u32>,
    pub max_patients: Option<u32>,
    pub features: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    pub fn limit(&self, kind: LimitKind) -> Option<u32> {
        match kind {
            LimitKind::Doctors => self.max_doctors,
            LimitKind::Patients => self.max_patients,
        }
    }

    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub interval: BillingInterval,
    #[serde(default)]
    pub max_doctors: Option<u32>,
    #[serde(default)]
    pub max_patients: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl NewPlan {
    pub fn into_plan(self) -> ValidationResult<SubscriptionPlan> {
        require_non_empty("name", &self.name)?;
        if self.price_cents < 0 {
            return Err(ValidationError::InvalidValue { field: "price_cents", reason: "must not be negative".into() });
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidValue {
                field: "currency",
                reason: "expected a three letter ISO code".into(),
            });
        }
        Ok(SubscriptionPlan {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description,
            price_cents: self.price_cents,
            currency: self.currency.to_ascii_uppercase(),
            interval: self.interval,
            max_doctors: self.max_doctors,
            max_patients: self.max_patients,
            features: self.features,
            is_active: true,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn monthly_advance_clamps_to_month_end() {
        let jan31 = Utc.with_ymd_and_hms(2031, 1, 31, 12, 0, 0).unwrap();
        let end = BillingInterval::Monthly.advance(jan31);
        assert_eq!(end, Utc.with_ymd_and_hms(2031, 2, 28, 12, 0, 0).unwrap());
    }

    #[test]
    fn yearly_advance() {
        let start = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(BillingInterval::Yearly.advance(start), Utc.with_ymd_and_hms(2031, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_bad_currency() {
        let plan = NewPlan {
            name: "Clinic".into(),
            description: None,
            price_cents: 4900,
            currency: "dollars".into(),
            interval: BillingInterval::Monthly,
            max_doctors: Some(5),
            max_patients: None,
            features: vec![],
        };
        assert!(plan.into_plan().is_err());
    }
}
