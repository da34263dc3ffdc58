// models/src/medical/patient.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Demographic and intake details of a patient account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub user_id: Uuid,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Vec<String>,
    pub emergency_contact: Option<String>,
    pub insurance_number: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PatientProfile {
    pub fn placeholder(user_id: Uuid) -> Self {
        PatientProfile {
            user_id,
            date_of_birth: None,
            gender: None,
            blood_type: None,
            allergies: Vec::new(),
            emergency_contact: None,
            insurance_number: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientProfileInput {
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub insurance_number: Option<String>,
}

impl PatientProfileInput {
    pub fn into_profile(self, user_id: Uuid) -> crate::ValidationResult<PatientProfile> {
        if let Some(dob) = self.date_of_birth {
            if dob > Utc::now().date_naive() {
                return Err(crate::ValidationError::InvalidValue {
                    field: "date_of_birth",
                    reason: "lies in the future".into(),
                });
            }
        }
        let mut allergies: Vec<String> = self
            .allergies
            .into_iter()
            .map(|a| a.trim().to_ascii_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        allergies.sort();
        allergies.dedup();
        Ok(PatientProfile {
            user_id,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            blood_type: self.blood_type,
            allergies,
            emergency_contact: self.emergency_contact,
            insurance_number: self.insurance_number,
            updated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allergies_are_normalized() {
        let input = PatientProfileInput {
            allergies: vec!["Penicillin".into(), " penicillin ".into(), "".into(), "Latex".into()],
            ..Default::default()
        };
        let profile = input.into_profile(Uuid::new_v4()).unwrap();
        assert_eq!(profile.allergies, vec!["latex".to_string(), "penicillin".to_string()]);
    }

    #[test]
    fn future_birth_dates_are_rejected() {
        let input = PatientProfileInput {
            date_of_birth: Some(Utc::now().date_naive() + chrono::Duration::days(3)),
            ..Default::default()
        };
        assert!(input.into_profile(Uuid::new_v4()).is_err());
    }
}
