// models/src/medical/slot.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

/// A bookable window in a doctor's calendar. Several patients may share a
/// slot up to `max_appointments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorAvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_appointments: u32,
    pub current_appointments: u32,
    pub is_active: bool,
    /// Shared by every slot produced from one recurring request.
    pub recurrence_group: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl DoctorAvailabilitySlot {
    pub fn new(doctor_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>, max_appointments: u32) -> ValidationResult<Self> {
        if start >= end {
            return Err(ValidationError::InvalidTimeRange);
        }
        if max_appointments == 0 {
            return Err(ValidationError::InvalidValue {
                field: "max_appointments",
                reason: "must be at least 1".into(),
            });
        }
        Ok(DoctorAvailabilitySlot {
            id: Uuid::new_v4(),
            doctor_id,
            start,
            end,
            max_appointments,
            current_appointments: 0,
            is_active: true,
            recurrence_group: None,
            created_at: Utc::now(),
        })
    }

    pub fn is_full(&self) -> bool {
        self.current_appointments >= self.max_appointments
    }

    pub fn remaining(&self) -> u32 {
        self.max_appointments.saturating_sub(self.current_appointments)
    }

    /// Half-open interval overlap: a slot ending at 10:00 does not clash with one starting at 10:00.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }

    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_full() && self.start > now
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSlot {
    /// Defaults to the calling doctor.
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_capacity")]
    pub max_appointments: u32,
}

fn default_capacity() -> u32 {
    1
}

/// Weekly pattern expanded into concrete slots. Times are UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringSlotRequest {
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekdays: Vec<Weekday>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: u32,
    #[serde(default = "default_capacity")]
    pub max_appointments: u32,
}

impl RecurringSlotRequest {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.start_date > self.end_date || self.start_time >= self.end_time {
            return Err(ValidationError::InvalidTimeRange);
        }
        if self.weekdays.is_empty() {
            return Err(ValidationError::MissingField("weekdays"));
        }
        if self.slot_minutes == 0 {
            return Err(ValidationError::InvalidValue { field: "slot_minutes", reason: "must be positive".into() });
        }
        if self.max_appointments == 0 {
            return Err(ValidationError::InvalidValue {
                field: "max_appointments",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Every `[start, end)` window the pattern describes, in chronological
    /// order. A trailing remainder shorter than `slot_minutes` is dropped.
    pub fn windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let step = chrono::Duration::minutes(i64::from(self.slot_minutes));
        let mut out = Vec::new();
        let mut day = self.start_date;
        while day <= self.end_date {
            if self.weekdays.contains(&chrono::Datelike::weekday(&day)) {
                let day_end = day.and_time(self.end_time).and_utc();
                let mut cursor = day.and_time(self.start_time).and_utc();
                while cursor + step <= day_end {
                    out.push((cursor, cursor + step));
                    cursor += step;
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        out
    }
}

/// Filter for slot listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotQuery {
    pub doctor_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2031, 3, 3, h, m, 0).unwrap()
    }

    #[test]
    fn capacity_counters() {
        let mut slot = DoctorAvailabilitySlot::new(Uuid::new_v4(), at(9, 0), at(9, 30), 2).unwrap();
        assert_eq!(slot.remaining(), 2);
        slot.current_appointments = 2;
        assert!(slot.is_full());
        assert!(!slot.is_bookable(at(8, 0)));
    }

    #[test]
    fn rejects_inverted_range_and_zero_capacity() {
        assert_eq!(
            DoctorAvailabilitySlot::new(Uuid::new_v4(), at(10, 0), at(9, 0), 1).unwrap_err(),
            ValidationError::InvalidTimeRange
        );
        assert!(DoctorAvailabilitySlot::new(Uuid::new_v4(), at(9, 0), at(10, 0), 0).is_err());
    }

    #[test]
    fn touching_slots_do_not_overlap() {
        let slot = DoctorAvailabilitySlot::new(Uuid::new_v4(), at(9, 0), at(9, 30), 1).unwrap();
        assert!(!slot.overlaps(at(9, 30), at(10, 0)));
        assert!(slot.overlaps(at(9, 15), at(9, 45)));
        assert!(slot.overlaps(at(8, 0), at(11, 0)));
    }

    #[test]
    fn recurring_windows_follow_weekdays_and_drop_remainder() {
        // 2031-03-03 is a Monday.
        let request = RecurringSlotRequest {
            doctor_id: None,
            start_date: NaiveDate::from_ymd_opt(2031, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2031, 3, 9).unwrap(),
            weekdays: vec![Weekday::Mon, Weekday::Wed],
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 10, 0).unwrap(),
            slot_minutes: 30,
            max_appointments: 1,
        };
        request.validate().unwrap();
        let windows = request.windows();
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0], (at(9, 0), at(9, 30)));
        assert_eq!(windows[1], (at(9, 30), at(10, 0)));
        assert_eq!(windows[2].0.date_naive(), NaiveDate::from_ymd_opt(2031, 3, 5).unwrap());
    }
}
