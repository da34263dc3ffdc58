// lib/src/treatments.rs
//! Treatments and the prescriptions attached to them.

use std::sync::Arc;

use models::medical::{
    Appointment, NewPrescription, NewTreatment, Prescription, PrescriptionStatus, Treatment, TreatmentStatus, UserRole,
};
use models::{MedError, MedResult, ValidationError};
use tracing::info;
use uuid::Uuid;

use crate::context::{Actor, TenantScope};
use crate::storage_engine::{Repository, StorageEngine};
use crate::users::UserService;

#[derive(Debug, Clone)]
pub struct TreatmentService {
    treatments: Repository<Treatment>,
    prescriptions: Repository<Prescription>,
    appointments: Repository<Appointment>,
    users: UserService,
}

impl TreatmentService {
    pub fn new(engine: Arc<dyn StorageEngine>, users: UserService) -> Self {
        TreatmentService {
            treatments: Repository::new(engine.clone()),
            prescriptions: Repository::new(engine.clone()),
            appointments: Repository::new(engine),
            users,
        }
    }

    /// The treating doctor or a hospital admin.
    fn require_clinician(scope: &TenantScope, actor: &Actor, treatment: &Treatment) -> MedResult<()> {
        if treatment.doctor_id == actor.user_id || actor.can_administer(scope.tenant_id) {
            Ok(())
        } else {
            Err(MedError::PermissionDenied("only the treating doctor or an administrator may do this".into()))
        }
    }

    pub async fn create_treatment(&self, scope: &TenantScope, actor: &Actor, new: NewTreatment) -> MedResult<Treatment> {
        actor.require_member(scope)?;
        let doctor_id = match (actor.role, new.doctor_id) {
            (UserRole::Doctor, None) => actor.user_id,
            (UserRole::Doctor, Some(id)) if id == actor.user_id => id,
            (UserRole::Admin, Some(id)) if actor.can_administer(scope.tenant_id) => id,
            (UserRole::Admin, None) => return Err(ValidationError::MissingField("doctor_id").into()),
            _ => return Err(MedError::PermissionDenied("only doctors record treatments".into())),
        };
        self.users.require_member(scope, doctor_id, UserRole::Doctor).await?;
        self.users.require_member(scope, new.patient_id, UserRole::Patient).await?;

        if let Some(appointment_id) = new.appointment_id {
            let appointment = self.appointments.require(scope.namespace(), appointment_id).await?;
            if appointment.patient_id != new.patient_id || appointment.doctor_id != doctor_id {
                return Err(MedError::InvalidData("appointment belongs to a different patient or doctor".into()));
            }
        }
        let treatment = new.into_treatment(doctor_id)?;
        self.treatments.insert(scope.namespace(), &treatment).await?;
        info!(treatment = %treatment.id, patient = %treatment.patient_id, doctor = %doctor_id, "treatment recorded");
        Ok(treatment)
    }

    pub async fn get_treatment(&self, scope: &TenantScope, actor: &Actor, id: Uuid) -> MedResult<Treatment> {
        actor.require_member(scope)?;
        let treatment = self.treatments.require(scope.namespace(), id).await?;
        if actor.role == UserRole::Patient && treatment.patient_id != actor.user_id {
            return Err(MedError::not_found("Treatment", id));
        }
        Ok(treatment)
    }

    /// Patients see their own treatments; staff see every treatment of the hospital.
    pub async fn list_treatments(&self, scope: &TenantScope, actor: &Actor, patient_id: Option<Uuid>) -> MedResult<Vec<Treatment>> {
        actor.require_member(scope)?;
        let patient_id = if actor.role == UserRole::Patient { Some(actor.user_id) } else { patient_id };
        let mut treatments = self
            .treatments
            .filter(scope.namespace(), |t| patient_id.is_none_or(|p| t.patient_id == p))
            .await?;
        treatments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(treatments)
    }

    pub async fn update_status(&self, scope: &TenantScope, actor: &Actor, id: Uuid, next: TreatmentStatus) -> MedResult<Treatment> {
        let current = self.get_treatment(scope, actor, id).await?;
        Self::require_clinician(scope, actor, &current)?;
        let updated = self
            .treatments
            .update(scope.namespace(), id, |t| t.transition(next).map_err(MedError::from))
            .await?;

        if next == TreatmentStatus::Discontinued {
            let active = self
                .prescriptions
                .filter(scope.namespace(), |p| p.treatment_id == id && p.status == PrescriptionStatus::Active)
                .await?;
            for prescription in active {
                self.prescriptions
                    .update(scope.namespace(), prescription.id, |p| {
                        if p.status == PrescriptionStatus::Active {
                            p.cancel()?;
                        }
                        Ok(())
                    })
                    .await?;
            }
        }
        info!(treatment = %id, status = %updated.status, "treatment status changed");
        Ok(updated)
    }

    pub async fn add_prescription(
        &self,
        scope: &TenantScope,
        actor: &Actor,
        treatment_id: Uuid,
        new: NewPrescription,
    ) -> MedResult<Prescription> {
        let treatment = self.get_treatment(scope, actor, treatment_id).await?;
        Self::require_clinician(scope, actor, &treatment)?;
        if !treatment.status.is_open() {
            return Err(MedError::Conflict(format!("cannot prescribe on a {} treatment", treatment.status)));
        }
        let prescription = new.into_prescription(treatment.id, treatment.patient_id, actor.user_id)?;
        self.prescriptions.insert(scope.namespace(), &prescription).await?;
        info!(prescription = %prescription.id, treatment = %treatment.id, medication = %prescription.medication, "prescription issued");
        Ok(prescription)
    }

    pub async fn list_prescriptions(&self, scope: &TenantScope, actor: &Actor, treatment_id: Uuid) -> MedResult<Vec<Prescription>> {
        self.get_treatment(scope, actor, treatment_id).await?;
        let mut prescriptions = self.prescriptions.filter(scope.namespace(), |p| p.treatment_id == treatment_id).await?;
        prescriptions.sort_by_key(|p| p.prescribed_at);
        Ok(prescriptions)
    }

    async fn prescription_of(&self, scope: &TenantScope, actor: &Actor, id: Uuid) -> MedResult<(Prescription, Treatment)> {
        actor.require_member(scope)?;
        let prescription = self.prescriptions.require(scope.namespace(), id).await?;
        let treatment = self.get_treatment(scope, actor, prescription.treatment_id).await?;
        Ok((prescription, treatment))
    }

    /// Nurses and clinicians dispense refills; patients cannot.
    pub async fn refill(&self, scope: &TenantScope, actor: &Actor, id: Uuid) -> MedResult<Prescription> {
        let (_, treatment) = self.prescription_of(scope, actor, id).await?;
        if actor.role != UserRole::Nurse {
            Self::require_clinician(scope, actor, &treatment)?;
        }
        let refilled = self
            .prescriptions
            .update(scope.namespace(), id, |p| p.refill().map_err(MedError::from))
            .await?;
        info!(prescription = %id, remaining = refilled.refills_remaining(), "prescription refilled");
        Ok(refilled)
    }

    pub async fn cancel_prescription(&self, scope: &TenantScope, actor: &Actor, id: Uuid) -> MedResult<Prescription> {
        let (_, treatment) = self.prescription_of(scope, actor, id).await?;
        Self::require_clinician(scope, actor, &treatment)?;
        self.prescriptions
            .update(scope.namespace(), id, |p| p.cancel().map_err(MedError::from))
            .await
    }
}
