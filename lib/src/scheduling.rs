// lib/src/scheduling.rs
//! Doctor availability and the appointment lifecycle.
//!
//! Slot capacity is enforced with a compare-and-swap on the slot record, so
//! concurrent bookings never push `current_appointments` past
//! `max_appointments`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use models::medical::{
    Appointment, AppointmentQuery, AppointmentStatus, DoctorAvailabilitySlot, NewAppointment, NewSlot,
    RecurringSlotRequest, SlotQuery, User, UserRole,
};
use models::{MedError, MedResult, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SchedulingConfig;
use crate::context::{Actor, TenantScope};
use crate::locks::KeyedLocks;
use crate::notifications::{templates, Mailer};
use crate::storage_engine::{Repository, StorageEngine, UniqueIndex};
use crate::users::UserService;

pub const DEFAULT_APPOINTMENT_MINUTES: u32 = 30;

/// Result of expanding a recurring availability pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringOutcome {
    pub recurrence_group: Uuid,
    pub created: Vec<DoctorAvailabilitySlot>,
    /// Windows left out because they lie in the past or clash with existing slots.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct SchedulingService {
    slots: Repository<DoctorAvailabilitySlot>,
    appointments: Repository<Appointment>,
    /// One live booking per patient and slot.
    slot_bookings: UniqueIndex,
    users: UserService,
    mailer: Mailer,
    config: SchedulingConfig,
    /// Serializes overlap checks for slot creation and slot-less bookings,
    /// per hospital and doctor.
    calendar_locks: Arc<KeyedLocks<(Uuid, Uuid)>>,
}

fn booking_key(slot_id: Uuid, patient_id: Uuid) -> String {
    format!("{}:{}", slot_id, patient_id)
}

impl SchedulingService {
    pub fn new(engine: Arc<dyn StorageEngine>, users: UserService, mailer: Mailer, config: SchedulingConfig) -> Self {
        SchedulingService {
            slots: Repository::new(engine.clone()),
            appointments: Repository::new(engine.clone()),
            slot_bookings: UniqueIndex::new(engine, "slot_booking"),
            users,
            mailer,
            config,
            calendar_locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Doctors manage their own calendar; hospital admins any doctor's.
    async fn resolve_doctor(&self, scope: &TenantScope, actor: &Actor, requested: Option<Uuid>) -> MedResult<User> {
        actor.require_member(scope)?;
        let doctor_id = match (actor.role, requested) {
            (UserRole::Doctor, None) => actor.user_id,
            (UserRole::Doctor, Some(id)) if id == actor.user_id => id,
            (UserRole::Admin, Some(id)) if actor.can_administer(scope.tenant_id) => id,
            (UserRole::Admin, None) => return Err(ValidationError::MissingField("doctor_id").into()),
            _ => return Err(MedError::PermissionDenied("only the doctor or an administrator manages this calendar".into())),
        };
        self.users.require_member(scope, doctor_id, UserRole::Doctor).await
    }

    async fn active_slots_of(&self, scope: &TenantScope, doctor_id: Uuid) -> MedResult<Vec<DoctorAvailabilitySlot>> {
        self.slots.filter(scope.namespace(), |s| s.doctor_id == doctor_id && s.is_active).await
    }

    pub async fn create_slot(&self, scope: &TenantScope, actor: &Actor, new: NewSlot) -> MedResult<DoctorAvailabilitySlot> {
        let doctor = self.resolve_doctor(scope, actor, new.doctor_id).await?;
        let slot = DoctorAvailabilitySlot::new(doctor.id, new.start, new.end, new.max_appointments)?;
        if slot.duration_minutes() < i64::from(self.config.min_slot_minutes) {
            return Err(ValidationError::InvalidValue {
                field: "end",
                reason: format!("slots last at least {} minutes", self.config.min_slot_minutes),
            }
            .into());
        }
        if slot.start <= Utc::now() {
            return Err(ValidationError::InvalidValue { field: "start", reason: "must be in the future".into() }.into());
        }

        let _guard = self.calendar_locks.lock((scope.tenant_id, doctor.id)).await;
        let existing = self.active_slots_of(scope, doctor.id).await?;
        if let Some(clash) = existing.iter().find(|s| s.overlaps(slot.start, slot.end)) {
            return Err(MedError::Conflict(format!("overlaps slot {} ({} - {})", clash.id, clash.start, clash.end)));
        }
        self.slots.insert(scope.namespace(), &slot).await?;
        debug!(slot = %slot.id, doctor = %doctor.id, "slot created");
        Ok(slot)
    }

    pub async fn generate_recurring_slots(
        &self,
        scope: &TenantScope,
        actor: &Actor,
        request: RecurringSlotRequest,
    ) -> MedResult<RecurringOutcome> {
        request.validate()?;
        let days = (request.end_date - request.start_date).num_days() + 1;
        if days > i64::from(self.config.max_recurring_days) {
            return Err(ValidationError::InvalidValue {
                field: "end_date",
                reason: format!("recurring ranges span at most {} days", self.config.max_recurring_days),
            }
            .into());
        }
        if request.slot_minutes < self.config.min_slot_minutes {
            return Err(ValidationError::InvalidValue {
                field: "slot_minutes",
                reason: format!("slots last at least {} minutes", self.config.min_slot_minutes),
            }
            .into());
        }
        let doctor = self.resolve_doctor(scope, actor, request.doctor_id).await?;
        let group = Uuid::new_v4();
        let now = Utc::now();

        let _guard = self.calendar_locks.lock((scope.tenant_id, doctor.id)).await;
        let existing = self.active_slots_of(scope, doctor.id).await?;
        let mut created = Vec::new();
        let mut skipped = 0;
        for (start, end) in request.windows() {
            if start <= now || existing.iter().any(|s| s.overlaps(start, end)) {
                skipped += 1;
                continue;
            }
            let mut slot = DoctorAvailabilitySlot::new(doctor.id, start, end, request.max_appointments)?;
            slot.recurrence_group = Some(group);
            self.slots.insert(scope.namespace(), &slot).await?;
            created.push(slot);
        }
        info!(doctor = %doctor.id, created = created.len(), skipped, "recurring slots generated");
        Ok(RecurringOutcome { recurrence_group: group, created, skipped })
    }

    pub async fn list_available_slots(&self, scope: &TenantScope, query: &SlotQuery) -> MedResult<Vec<DoctorAvailabilitySlot>> {
        let now = Utc::now();
        let mut slots = self
            .slots
            .filter(scope.namespace(), |s| {
                s.is_bookable(now)
                    && query.doctor_id.is_none_or(|d| s.doctor_id == d)
                    && query.from.is_none_or(|from| s.start >= from)
                    && query.to.is_none_or(|to| s.start < to)
            })
            .await?;
        slots.sort_by_key(|s| s.start);
        Ok(slots)
    }

    pub async fn get_slot(&self, scope: &TenantScope, slot_id: Uuid) -> MedResult<DoctorAvailabilitySlot> {
        self.slots.require(scope.namespace(), slot_id).await
    }

    /// Stops new bookings into a slot. Existing appointments are kept.
    pub async fn deactivate_slot(&self, scope: &TenantScope, actor: &Actor, slot_id: Uuid) -> MedResult<DoctorAvailabilitySlot> {
        let slot = self.get_slot(scope, slot_id).await?;
        self.resolve_doctor(scope, actor, Some(slot.doctor_id)).await?;
        self.slots
            .update(scope.namespace(), slot_id, |s| {
                s.is_active = false;
                Ok(())
            })
            .await
    }

    /// Takes one seat in the slot, failing if it is full, inactive or past.
    async fn reserve_seat(&self, scope: &TenantScope, slot_id: Uuid) -> MedResult<DoctorAvailabilitySlot> {
        let now = Utc::now();
        self.slots
            .update(scope.namespace(), slot_id, |s| {
                if !s.is_active || s.start <= now {
                    return Err(MedError::Conflict("slot is no longer available".into()));
                }
                if s.is_full() {
                    return Err(MedError::Conflict("slot is fully booked".into()));
                }
                s.current_appointments += 1;
                Ok(())
            })
            .await
    }

    async fn release_seat(&self, scope: &TenantScope, slot_id: Uuid, patient_id: Uuid) -> MedResult<()> {
        let released = self
            .slots
            .update(scope.namespace(), slot_id, |s| {
                s.current_appointments = s.current_appointments.saturating_sub(1);
                Ok(())
            })
            .await;
        match released {
            Ok(_) | Err(MedError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        self.slot_bookings.release(scope.namespace(), &booking_key(slot_id, patient_id), patient_id).await?;
        Ok(())
    }

    pub async fn book_appointment(&self, scope: &TenantScope, actor: &Actor, new: NewAppointment) -> MedResult<Appointment> {
        actor.require_member(scope)?;
        let patient_id = match (actor.role, new.patient_id) {
            (UserRole::Patient, None) => actor.user_id,
            (UserRole::Patient, Some(id)) if id == actor.user_id => id,
            (UserRole::Patient, Some(_)) => {
                return Err(MedError::PermissionDenied("patients book only for themselves".into()));
            }
            (_, Some(id)) => id,
            (_, None) => return Err(ValidationError::MissingField("patient_id").into()),
        };
        let patient = self.users.require_member(scope, patient_id, UserRole::Patient).await?;
        let doctor = self.users.require_member(scope, new.doctor_id, UserRole::Doctor).await?;
        let reason = new.reason.filter(|r| !r.trim().is_empty());
        let now = Utc::now();

        let appointment = match new.slot_id {
            Some(slot_id) => {
                let slot = self.get_slot(scope, slot_id).await?;
                if slot.doctor_id != doctor.id {
                    return Err(MedError::InvalidData("slot belongs to a different doctor".into()));
                }
                let key = booking_key(slot_id, patient.id);
                self.slot_bookings
                    .claim(scope.namespace(), &key, patient.id)
                    .await
                    .map_err(|_| MedError::Conflict("patient already holds an appointment in this slot".into()))?;
                let slot = match self.reserve_seat(scope, slot_id).await {
                    Ok(slot) => slot,
                    Err(e) => {
                        self.slot_bookings.release(scope.namespace(), &key, patient.id).await?;
                        return Err(e);
                    }
                };
                let appointment = new_appointment(patient.id, doctor.id, Some(slot.id), slot.start, slot.end, reason);
                if let Err(e) = self.appointments.insert(scope.namespace(), &appointment).await {
                    self.release_seat(scope, slot_id, patient.id).await?;
                    return Err(e);
                }
                appointment
            }
            None => {
                let start = new.scheduled_start.ok_or(ValidationError::MissingField("scheduled_start"))?;
                let minutes = new.duration_minutes.unwrap_or(DEFAULT_APPOINTMENT_MINUTES);
                if minutes < self.config.min_slot_minutes {
                    return Err(ValidationError::InvalidValue {
                        field: "duration_minutes",
                        reason: format!("appointments last at least {} minutes", self.config.min_slot_minutes),
                    }
                    .into());
                }
                if start <= now {
                    return Err(ValidationError::InvalidValue { field: "scheduled_start", reason: "must be in the future".into() }.into());
                }
                let end = start + Duration::minutes(i64::from(minutes));

                let _guard = self.calendar_locks.lock((scope.tenant_id, doctor.id)).await;
                let clashes = self
                    .appointments
                    .filter(scope.namespace(), |a| a.doctor_id == doctor.id && a.status.is_live() && a.overlaps(start, end))
                    .await?;
                if !clashes.is_empty() {
                    return Err(MedError::Conflict("doctor already has an appointment at that time".into()));
                }
                let appointment = new_appointment(patient.id, doctor.id, None, start, end, reason);
                self.appointments.insert(scope.namespace(), &appointment).await?;
                appointment
            }
        };

        self.mailer.enqueue(templates::appointment_booked(&patient, &doctor, &appointment));
        info!(appointment = %appointment.id, patient = %patient.id, doctor = %doctor.id, "appointment booked");
        Ok(appointment)
    }

    fn check_access(&self, scope: &TenantScope, actor: &Actor, appointment: &Appointment) -> MedResult<()> {
        actor.require_member(scope)?;
        let allowed = match actor.role {
            UserRole::Patient => appointment.patient_id == actor.user_id,
            UserRole::Doctor => appointment.doctor_id == actor.user_id,
            UserRole::Nurse | UserRole::Admin => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(MedError::not_found("Appointment", appointment.id))
        }
    }

    pub async fn get_appointment(&self, scope: &TenantScope, actor: &Actor, id: Uuid) -> MedResult<Appointment> {
        let appointment = self.appointments.require(scope.namespace(), id).await?;
        self.check_access(scope, actor, &appointment)?;
        Ok(appointment)
    }

    pub async fn list_appointments(&self, scope: &TenantScope, actor: &Actor, mut query: AppointmentQuery) -> MedResult<Vec<Appointment>> {
        actor.require_member(scope)?;
        match actor.role {
            UserRole::Patient => query.patient_id = Some(actor.user_id),
            UserRole::Doctor => query.doctor_id = Some(actor.user_id),
            UserRole::Nurse | UserRole::Admin => {}
        }
        let mut appointments = self.appointments.filter(scope.namespace(), |a| query.matches(a)).await?;
        appointments.sort_by_key(|a| a.scheduled_start);
        Ok(appointments)
    }

    /// Moves an appointment through its lifecycle. Patients may only cancel.
    pub async fn transition(
        &self,
        scope: &TenantScope,
        actor: &Actor,
        id: Uuid,
        target: AppointmentStatus,
        reason: Option<String>,
    ) -> MedResult<Appointment> {
        let current = self.get_appointment(scope, actor, id).await?;
        if actor.role == UserRole::Patient && target != AppointmentStatus::Cancelled {
            return Err(MedError::PermissionDenied("patients can only cancel appointments".into()));
        }
        let updated = self
            .appointments
            .update(scope.namespace(), id, |a| a.transition(target, reason.clone()).map_err(MedError::from))
            .await?;

        if target == AppointmentStatus::Cancelled {
            if let Some(slot_id) = updated.slot_id {
                self.release_seat(scope, slot_id, updated.patient_id).await?;
            }
        }
        info!(appointment = %id, from = %current.status, to = %updated.status, by = %actor.user_id, "appointment status changed");
        self.notify_patient(scope, &updated).await;
        Ok(updated)
    }

    /// Moves a live appointment into another slot of the same doctor. The
    /// appointment returns to `pending`.
    pub async fn reschedule(&self, scope: &TenantScope, actor: &Actor, id: Uuid, new_slot_id: Uuid) -> MedResult<Appointment> {
        let current = self.get_appointment(scope, actor, id).await?;
        if !current.status.is_live() {
            return Err(MedError::Conflict(format!("a {} appointment cannot be rescheduled", current.status)));
        }
        if current.slot_id == Some(new_slot_id) {
            return Err(MedError::InvalidData("appointment is already in that slot".into()));
        }
        let slot = self.get_slot(scope, new_slot_id).await?;
        if slot.doctor_id != current.doctor_id {
            return Err(MedError::InvalidData("slot belongs to a different doctor".into()));
        }

        let key = booking_key(new_slot_id, current.patient_id);
        self.slot_bookings
            .claim(scope.namespace(), &key, current.patient_id)
            .await
            .map_err(|_| MedError::Conflict("patient already holds an appointment in this slot".into()))?;
        let slot = match self.reserve_seat(scope, new_slot_id).await {
            Ok(slot) => slot,
            Err(e) => {
                self.slot_bookings.release(scope.namespace(), &key, current.patient_id).await?;
                return Err(e);
            }
        };

        let moved = self
            .appointments
            .update(scope.namespace(), id, |a| {
                if !a.status.is_live() {
                    return Err(MedError::Conflict(format!("a {} appointment cannot be rescheduled", a.status)));
                }
                a.slot_id = Some(slot.id);
                a.scheduled_start = slot.start;
                a.scheduled_end = slot.end;
                a.status = AppointmentStatus::Pending;
                a.updated_at = Utc::now();
                Ok(())
            })
            .await;
        let moved = match moved {
            Ok(moved) => moved,
            Err(e) => {
                self.release_seat(scope, new_slot_id, current.patient_id).await?;
                return Err(e);
            }
        };
        if let Some(old_slot) = current.slot_id {
            self.release_seat(scope, old_slot, current.patient_id).await?;
        }
        info!(appointment = %id, slot = %new_slot_id, "appointment rescheduled");
        self.notify_patient(scope, &moved).await;
        Ok(moved)
    }

    async fn notify_patient(&self, scope: &TenantScope, appointment: &Appointment) {
        match self.users.require_member(scope, appointment.patient_id, UserRole::Patient).await {
            Ok(patient) => {
                self.mailer.enqueue(templates::appointment_status_changed(&patient, appointment));
            }
            Err(e) => warn!(appointment = %appointment.id, "no notification sent: {}", e),
        }
    }
}

fn new_appointment(
    patient_id: Uuid,
    doctor_id: Uuid,
    slot_id: Option<Uuid>,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
    reason: Option<String>,
) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id,
        doctor_id,
        slot_id,
        scheduled_start: start,
        scheduled_end: end,
        status: AppointmentStatus::Pending,
        reason,
        notes: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{new_user, TestPlatform};
    use chrono::{Datelike, DateTime, Weekday};

    fn tomorrow_at(hour: u32) -> DateTime<Utc> {
        (Utc::now() + Duration::days(1)).date_naive().and_hms_opt(hour, 0, 0).unwrap().and_utc()
    }

    fn slot_request(start: DateTime<Utc>, minutes: i64, capacity: u32) -> NewSlot {
        NewSlot { doctor_id: None, start, end: start + Duration::minutes(minutes), max_appointments: capacity }
    }

    fn booking(doctor_id: Uuid, slot_id: Uuid) -> NewAppointment {
        NewAppointment {
            patient_id: None,
            doctor_id,
            slot_id: Some(slot_id),
            scheduled_start: None,
            duration_minutes: None,
            reason: Some("checkup".into()),
        }
    }

    #[tokio::test]
    async fn slots_of_one_doctor_never_overlap() {
        let t = TestPlatform::new().await;
        let doctor = Actor::from(&t.doctor);
        let s = &t.platform.scheduling;
        s.create_slot(&t.scope, &doctor, slot_request(tomorrow_at(9), 60, 1)).await.unwrap();
        let clash = s.create_slot(&t.scope, &doctor, slot_request(tomorrow_at(9) + Duration::minutes(30), 60, 1)).await;
        assert!(matches!(clash, Err(MedError::Conflict(_))));
        // Touching intervals are fine.
        s.create_slot(&t.scope, &doctor, slot_request(tomorrow_at(10), 30, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn slot_rules_are_validated() {
        let t = TestPlatform::new().await;
        let doctor = Actor::from(&t.doctor);
        let s = &t.platform.scheduling;
        let past = Utc::now() - Duration::hours(2);
        assert!(s.create_slot(&t.scope, &doctor, slot_request(past, 60, 1)).await.is_err());
        assert!(s.create_slot(&t.scope, &doctor, slot_request(tomorrow_at(9), 5, 1)).await.is_err());
        assert!(s.create_slot(&t.scope, &doctor, slot_request(tomorrow_at(9), 60, 0)).await.is_err());
        let patient = Actor::from(&t.patient);
        assert!(matches!(
            s.create_slot(&t.scope, &patient, slot_request(tomorrow_at(9), 60, 1)).await,
            Err(MedError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_bookings_respect_capacity() {
        let t = TestPlatform::new().await;
        let s = t.platform.scheduling.clone();
        let slot = s.create_slot(&t.scope, &Actor::from(&t.doctor), slot_request(tomorrow_at(9), 60, 3)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let patient = t
                .platform
                .users
                .register(None, new_user(&format!("rush{i}"), UserRole::Patient, t.tenant))
                .await
                .unwrap();
            let (s, scope, doctor_id) = (s.clone(), t.scope, t.doctor.id);
            handles.push(tokio::spawn(async move {
                s.book_appointment(&scope, &Actor::from(&patient), booking(doctor_id, slot.id)).await
            }));
        }
        let mut booked = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(e) => assert!(matches!(e, MedError::Conflict(_)), "unexpected error {e}"),
            }
        }
        assert_eq!(booked, 3);
        let slot = s.get_slot(&t.scope, slot.id).await.unwrap();
        assert_eq!(slot.current_appointments, 3);
        assert!(s.list_available_slots(&t.scope, &SlotQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_patient_cannot_double_book_a_slot() {
        let t = TestPlatform::new().await;
        let s = &t.platform.scheduling;
        let slot = s.create_slot(&t.scope, &Actor::from(&t.doctor), slot_request(tomorrow_at(9), 60, 5)).await.unwrap();
        let me = Actor::from(&t.patient);
        let first = s.book_appointment(&t.scope, &me, booking(t.doctor.id, slot.id)).await.unwrap();
        assert!(matches!(s.book_appointment(&t.scope, &me, booking(t.doctor.id, slot.id)).await, Err(MedError::Conflict(_))));

        // Cancelling frees both the seat and the patient's claim.
        s.transition(&t.scope, &me, first.id, AppointmentStatus::Cancelled, Some("conflict".into())).await.unwrap();
        assert_eq!(s.get_slot(&t.scope, slot.id).await.unwrap().current_appointments, 0);
        s.book_appointment(&t.scope, &me, booking(t.doctor.id, slot.id)).await.unwrap();
    }

    #[tokio::test]
    async fn lifecycle_enforces_roles_and_transitions() {
        let t = TestPlatform::new().await;
        let s = &t.platform.scheduling;
        let slot = s.create_slot(&t.scope, &Actor::from(&t.doctor), slot_request(tomorrow_at(9), 60, 1)).await.unwrap();
        let me = Actor::from(&t.patient);
        let doctor = Actor::from(&t.doctor);
        let appt = s.book_appointment(&t.scope, &me, booking(t.doctor.id, slot.id)).await.unwrap();
        assert_eq!(appt.status, AppointmentStatus::Pending);

        assert!(matches!(
            s.transition(&t.scope, &me, appt.id, AppointmentStatus::Confirmed, None).await,
            Err(MedError::PermissionDenied(_))
        ));
        assert!(matches!(
            s.transition(&t.scope, &doctor, appt.id, AppointmentStatus::Completed, None).await,
            Err(MedError::Validation(ValidationError::InvalidStatusTransition { .. }))
        ));
        s.transition(&t.scope, &doctor, appt.id, AppointmentStatus::Confirmed, None).await.unwrap();
        let done = s.transition(&t.scope, &doctor, appt.id, AppointmentStatus::Completed, Some("all good".into())).await.unwrap();
        assert_eq!(done.notes.as_deref(), Some("all good"));
        assert!(s.transition(&t.scope, &doctor, appt.id, AppointmentStatus::Cancelled, None).await.is_err());
        // Completing keeps the seat taken.
        assert_eq!(s.get_slot(&t.scope, slot.id).await.unwrap().current_appointments, 1);
    }

    #[tokio::test]
    async fn visibility_is_row_level() {
        let t = TestPlatform::new().await;
        let s = &t.platform.scheduling;
        let slot = s.create_slot(&t.scope, &Actor::from(&t.doctor), slot_request(tomorrow_at(9), 60, 2)).await.unwrap();
        let other = t.platform.users.register(None, new_user("other", UserRole::Patient, t.tenant)).await.unwrap();
        let mine = s.book_appointment(&t.scope, &Actor::from(&t.patient), booking(t.doctor.id, slot.id)).await.unwrap();
        s.book_appointment(&t.scope, &Actor::from(&other), booking(t.doctor.id, slot.id)).await.unwrap();

        let me = Actor::from(&t.patient);
        let visible = s.list_appointments(&t.scope, &me, AppointmentQuery::default()).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert!(s.get_appointment(&t.scope, &Actor::from(&other), mine.id).await.is_err());
        let nurse_view = s.list_appointments(&t.scope, &Actor::from(&t.nurse), AppointmentQuery::default()).await.unwrap();
        assert_eq!(nurse_view.len(), 2);
    }

    #[tokio::test]
    async fn slotless_bookings_reject_doctor_overlap() {
        let t = TestPlatform::new().await;
        let s = &t.platform.scheduling;
        let nurse = Actor::from(&t.nurse);
        let ad_hoc = |start| NewAppointment {
            patient_id: Some(t.patient.id),
            doctor_id: t.doctor.id,
            slot_id: None,
            scheduled_start: Some(start),
            duration_minutes: Some(30),
            reason: None,
        };
        s.book_appointment(&t.scope, &nurse, ad_hoc(tomorrow_at(14))).await.unwrap();
        let clash = s.book_appointment(&t.scope, &nurse, ad_hoc(tomorrow_at(14) + Duration::minutes(15))).await;
        assert!(matches!(clash, Err(MedError::Conflict(_))));
        s.book_appointment(&t.scope, &nurse, ad_hoc(tomorrow_at(14) + Duration::minutes(30))).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_slotless_bookings_for_one_doctor_do_not_overlap() {
        let t = TestPlatform::new().await;
        let s = &t.platform.scheduling;
        let nurse = Actor::from(&t.nurse);
        let ad_hoc = |start| NewAppointment {
            patient_id: Some(t.patient.id),
            doctor_id: t.doctor.id,
            slot_id: None,
            scheduled_start: Some(start),
            duration_minutes: Some(30),
            reason: None,
        };
        let (first, second) = tokio::join!(
            s.book_appointment(&t.scope, &nurse, ad_hoc(tomorrow_at(15))),
            s.book_appointment(&t.scope, &nurse, ad_hoc(tomorrow_at(15) + Duration::minutes(10))),
        );
        assert!(first.is_ok() != second.is_ok());
    }

    #[tokio::test]
    async fn calendars_of_different_doctors_do_not_block_each_other() {
        let t = TestPlatform::new().await;
        let s = &t.platform.scheduling;
        let other = t
            .platform
            .users
            .register(Some(&t.admin_actor()), new_user("drshepherd", UserRole::Doctor, t.tenant))
            .await
            .unwrap();
        let _busy = s.calendar_locks.lock((t.tenant, t.doctor.id)).await;

        let wait = std::time::Duration::from_millis(100);
        let other_actor = Actor::from(&other);
        let free = tokio::time::timeout(wait, s.create_slot(&t.scope, &other_actor, slot_request(tomorrow_at(9), 60, 1)));
        assert!(free.await.unwrap().is_ok());
        let doctor_actor = Actor::from(&t.doctor);
        let blocked = tokio::time::timeout(wait, s.create_slot(&t.scope, &doctor_actor, slot_request(tomorrow_at(9), 60, 1)));
        assert!(blocked.await.is_err());
    }

    #[tokio::test]
    async fn reschedule_moves_the_seat() {
        let t = TestPlatform::new().await;
        let s = &t.platform.scheduling;
        let doctor = Actor::from(&t.doctor);
        let a = s.create_slot(&t.scope, &doctor, slot_request(tomorrow_at(9), 60, 1)).await.unwrap();
        let b = s.create_slot(&t.scope, &doctor, slot_request(tomorrow_at(11), 60, 1)).await.unwrap();
        let me = Actor::from(&t.patient);
        let appt = s.book_appointment(&t.scope, &me, booking(t.doctor.id, a.id)).await.unwrap();
        s.transition(&t.scope, &doctor, appt.id, AppointmentStatus::Confirmed, None).await.unwrap();

        let moved = s.reschedule(&t.scope, &me, appt.id, b.id).await.unwrap();
        assert_eq!(moved.status, AppointmentStatus::Pending);
        assert_eq!(moved.scheduled_start, b.start);
        assert_eq!(s.get_slot(&t.scope, a.id).await.unwrap().current_appointments, 0);
        assert_eq!(s.get_slot(&t.scope, b.id).await.unwrap().current_appointments, 1);
    }

    #[tokio::test]
    async fn recurring_generation_skips_clashes() {
        let t = TestPlatform::new().await;
        let s = &t.platform.scheduling;
        let doctor = Actor::from(&t.doctor);
        let start_date = (Utc::now() + Duration::days(1)).date_naive();
        let end_date = start_date + Duration::days(6);
        // One pre-existing slot clashes with a generated window.
        let taken = start_date.and_hms_opt(9, 0, 0).unwrap().and_utc();
        s.create_slot(&t.scope, &doctor, slot_request(taken, 30, 1)).await.unwrap();

        let request = RecurringSlotRequest {
            doctor_id: None,
            start_date,
            end_date,
            weekdays: vec![start_date.weekday()],
            start_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: chrono::NaiveTime::from_hms_opt(10, 45, 0).unwrap(),
            slot_minutes: 30,
            max_appointments: 2,
        };
        let outcome = s.generate_recurring_slots(&t.scope, &doctor, request.clone()).await.unwrap();
        // One matching day in a seven day range, three whole 30 minute pieces, one clash.
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.created.iter().all(|s| s.recurrence_group == Some(outcome.recurrence_group)));

        let too_long = RecurringSlotRequest { end_date: start_date + Duration::days(400), weekdays: vec![Weekday::Mon], ..request };
        assert!(s.generate_recurring_slots(&t.scope, &doctor, too_long).await.is_err());
    }
}
