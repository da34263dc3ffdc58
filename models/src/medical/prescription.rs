// models/src/medical/prescription.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{require_non_empty, ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub treatment_id: Uuid,
    pub patient_id: Uuid,
    pub prescribed_by: Uuid,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
    pub refills_allowed: u32,
    pub refills_used: u32,
    pub instructions: Option<String>,
    pub status: PrescriptionStatus,
    pub prescribed_at: DateTime<Utc>,
    pub last_refill_at: Option<DateTime<Utc>>,
}

impl Prescription {
    pub fn refills_remaining(&self) -> u32 {
        self.refills_allowed.saturating_sub(self.refills_used)
    }

    /// Consumes one refill. The last refill completes the prescription.
    pub fn refill(&mut self) -> ValidationResult<()> {
        if self.status != PrescriptionStatus::Active {
            return Err(ValidationError::InvalidValue {
                field: "status",
                reason: "only active prescriptions can be refilled".into(),
            });
        }
        if self.refills_remaining() == 0 {
            return Err(ValidationError::InvalidValue { field: "refills", reason: "no refills remaining".into() });
        }
        self.refills_used += 1;
        self.last_refill_at = Some(Utc::now());
        if self.refills_remaining() == 0 {
            self.status = PrescriptionStatus::Completed;
        }
        Ok(())
    }

    pub fn cancel(&mut self) -> ValidationResult<()> {
        if self.status != PrescriptionStatus::Active {
            return Err(ValidationError::InvalidValue {
                field: "status",
                reason: "only active prescriptions can be cancelled".into(),
            });
        }
        self.status = PrescriptionStatus::Cancelled;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrescription {
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
    #[serde(default)]
    pub refills_allowed: u32,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl NewPrescription {
    pub fn into_prescription(self, treatment_id: Uuid, patient_id: Uuid, prescribed_by: Uuid) -> ValidationResult<Prescription> {
        require_non_empty("medication", &self.medication)?;
        require_non_empty("dosage", &self.dosage)?;
        require_non_empty("frequency", &self.frequency)?;
        if self.duration_days == 0 {
            return Err(ValidationError::InvalidValue { field: "duration_days", reason: "must be positive".into() });
        }
        Ok(Prescription {
            id: Uuid::new_v4(),
            treatment_id,
            patient_id,
            prescribed_by,
            medication: self.medication.trim().to_string(),
            dosage: self.dosage.trim().to_string(),
            frequency: self.frequency.trim().to_string(),
            duration_days: self.duration_days,
            refills_allowed: self.refills_allowed,
            refills_used: 0,
            instructions: self.instructions,
            status: PrescriptionStatus::Active,
            prescribed_at: Utc::now(),
            last_refill_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prescription(refills: u32) -> Prescription {
        NewPrescription {
            medication: "Amoxicillin".into(),
            dosage: "500mg".into(),
            frequency: "3x daily".into(),
            duration_days: 7,
            refills_allowed: refills,
            instructions: None,
        }
        .into_prescription(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
        .unwrap()
    }

    #[test]
    fn refills_are_bounded() {
        let mut p = prescription(1);
        p.refill().unwrap();
        assert_eq!(p.status, PrescriptionStatus::Completed);
        assert!(p.refill().is_err());
        assert_eq!(p.refills_used, 1);
    }

    #[test]
    fn no_refills_means_no_refill() {
        let mut p = prescription(0);
        assert!(p.refill().is_err());
        assert!(p.cancel().is_ok());
        assert!(p.cancel().is_err());
    }
}
