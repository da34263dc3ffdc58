// models/src/medical/treatment.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{require_non_empty, ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentStatus {
    Planned,
    Active,
    Completed,
    Discontinued,
}

impl TreatmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentStatus::Planned => "planned",
            TreatmentStatus::Active => "active",
            TreatmentStatus::Completed => "completed",
            TreatmentStatus::Discontinued => "discontinued",
        }
    }

    pub fn can_transition_to(&self, next: TreatmentStatus) -> bool {
        use TreatmentStatus::*;
        matches!(
            (self, next),
            (Planned, Active) | (Active, Completed) | (Planned, Discontinued) | (Active, Discontinued)
        )
    }

    /// Prescriptions may only be attached while the treatment is open.
    pub fn is_open(&self) -> bool {
        matches!(self, TreatmentStatus::Planned | TreatmentStatus::Active)
    }
}

impl fmt::Display for TreatmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub description: Option<String>,
    pub status: TreatmentStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Treatment {
    pub fn transition(&mut self, next: TreatmentStatus) -> ValidationResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if !next.is_open() {
            self.end_date = Some(Utc::now().date_naive());
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTreatment {
    pub patient_id: Uuid,
    /// Defaults to the calling doctor.
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl NewTreatment {
    pub fn into_treatment(self, doctor_id: Uuid) -> ValidationResult<Treatment> {
        require_non_empty("diagnosis", &self.diagnosis)?;
        let now = Utc::now();
        Ok(Treatment {
            id: Uuid::new_v4(),
            patient_id: self.patient_id,
            doctor_id,
            appointment_id: self.appointment_id,
            diagnosis: self.diagnosis.trim().to_string(),
            description: self.description,
            status: TreatmentStatus::Planned,
            start_date: self.start_date.unwrap_or_else(|| now.date_naive()),
            end_date: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treatment() -> Treatment {
        NewTreatment {
            patient_id: Uuid::new_v4(),
            doctor_id: None,
            appointment_id: None,
            diagnosis: "Hypertension".into(),
            description: None,
            start_date: None,
        }
        .into_treatment(Uuid::new_v4())
        .unwrap()
    }

    #[test]
    fn closes_with_end_date() {
        let mut t = treatment();
        t.transition(TreatmentStatus::Active).unwrap();
        assert!(t.end_date.is_none());
        t.transition(TreatmentStatus::Completed).unwrap();
        assert!(t.end_date.is_some());
    }

    #[test]
    fn planned_cannot_complete_directly() {
        let mut t = treatment();
        assert!(t.transition(TreatmentStatus::Completed).is_err());
        assert!(t.transition(TreatmentStatus::Discontinued).is_ok());
        assert!(t.transition(TreatmentStatus::Active).is_err());
    }
}
