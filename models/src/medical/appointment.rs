// models/src/medical/appointment.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Statuses reachable in one step from `self`.
    pub fn allowed_transitions(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Completed, Cancelled, NoShow],
            Completed | Cancelled | NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// A live appointment still holds its slot and the doctor's time.
    pub fn is_live(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn check_transition(&self, next: AppointmentStatus) -> ValidationResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(ValidationError::InvalidStatusTransition { from: self.to_string(), to: next.to_string() })
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.scheduled_start < end && start < self.scheduled_end
    }

    /// Moves to `next`, stamping `updated_at`. The caller decides who may do it.
    pub fn transition(&mut self, next: AppointmentStatus, reason: Option<String>) -> ValidationResult<()> {
        self.status.check_transition(next)?;
        self.status = next;
        if next == AppointmentStatus::Cancelled {
            self.cancellation_reason = reason;
        } else if let Some(note) = reason {
            self.notes = Some(note);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Booking request. Either `slot_id` or `scheduled_start` + `duration_minutes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    /// Defaults to the calling patient.
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub slot_id: Option<Uuid>,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.is_none_or(|s| appointment.status == s)
            && self.doctor_id.is_none_or(|d| appointment.doctor_id == d)
            && self.patient_id.is_none_or(|p| appointment.patient_id == p)
            && self.from.is_none_or(|from| appointment.scheduled_start >= from)
            && self.to.is_none_or(|to| appointment.scheduled_start < to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    fn appointment() -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            slot_id: None,
            scheduled_start: now,
            scheduled_end: now + chrono::Duration::minutes(30),
            status: Pending,
            reason: None,
            notes: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn lifecycle_allows_pending_confirmed_completed() {
        let mut appt = appointment();
        appt.transition(Confirmed, None).unwrap();
        appt.transition(Completed, Some("follow up in 2 weeks".into())).unwrap();
        assert_eq!(appt.status, Completed);
        assert_eq!(appt.notes.as_deref(), Some("follow up in 2 weeks"));
        assert!(appt.status.is_terminal());
    }

    #[test]
    fn pending_cannot_complete() {
        let mut appt = appointment();
        let err = appt.transition(Completed, None).unwrap_err();
        assert_eq!(err, ValidationError::InvalidStatusTransition { from: "pending".into(), to: "completed".into() });
        assert_eq!(appt.status, Pending);
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [Completed, Cancelled, NoShow] {
            for next in [Pending, Confirmed, Completed, Cancelled, NoShow] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn cancellation_keeps_reason() {
        let mut appt = appointment();
        appt.transition(Cancelled, Some("feeling better".into())).unwrap();
        assert_eq!(appt.cancellation_reason.as_deref(), Some("feeling better"));
        assert!(!appt.status.is_live());
    }

    #[test]
    fn query_filters_by_status_and_window() {
        let appt = appointment();
        let query = AppointmentQuery { status: Some(Pending), ..Default::default() };
        assert!(query.matches(&appt));
        let query = AppointmentQuery { from: Some(appt.scheduled_end), ..Default::default() };
        assert!(!query.matches(&appt));
    }

    #[test]
    fn no_show_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&NoShow).unwrap(), "\"no_show\"");
    }
}
