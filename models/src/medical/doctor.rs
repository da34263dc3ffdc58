// models/src/medical/doctor.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{require_non_empty, ValidationResult};

pub const DEFAULT_SPECIALIZATION: &str = "general practice";

/// Clinical details of a doctor account, stored in the hospital's namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub user_id: Uuid,
    pub specialization: String,
    pub license_number: Option<String>,
    pub years_of_experience: u32,
    pub consultation_fee_cents: i64,
    pub bio: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorProfile {
    pub fn placeholder(user_id: Uuid) -> Self {
        DoctorProfile {
            user_id,
            specialization: DEFAULT_SPECIALIZATION.to_string(),
            license_number: None,
            years_of_experience: 0,
            consultation_fee_cents: 0,
            bio: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfileInput {
    pub specialization: String,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub years_of_experience: u32,
    #[serde(default)]
    pub consultation_fee_cents: i64,
    #[serde(default)]
    pub bio: Option<String>,
}

impl DoctorProfileInput {
    pub fn into_profile(self, user_id: Uuid) -> ValidationResult<DoctorProfile> {
        require_non_empty("specialization", &self.specialization)?;
        if self.consultation_fee_cents < 0 {
            return Err(crate::ValidationError::InvalidValue {
                field: "consultation_fee_cents",
                reason: "must not be negative".into(),
            });
        }
        Ok(DoctorProfile {
            user_id,
            specialization: self.specialization.trim().to_ascii_lowercase(),
            license_number: self.license_number,
            years_of_experience: self.years_of_experience,
            consultation_fee_cents: self.consultation_fee_cents,
            bio: self.bio,
            updated_at: Utc::now(),
        })
    }
}
