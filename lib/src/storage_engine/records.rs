// lib/src/storage_engine/records.rs
//! Collection names of the stored entities.

use models::billing::{Payment, Subscription, SubscriptionPlan};
use models::medical::{
    Appointment, DoctorAvailabilitySlot, DoctorProfile, Hospital, PatientProfile, Prescription, Treatment, User,
};
use uuid::Uuid;

use super::repository::Record;

macro_rules! record {
    ($ty:ty, $collection:literal, $entity:literal, $id:ident) => {
        impl Record for $ty {
            const COLLECTION: &'static str = $collection;
            const ENTITY: &'static str = $entity;
            fn id(&self) -> Uuid {
                self.$id
            }
        }
    };
}

// Public namespace
record!(Hospital, "hospitals", "Hospital", id);
record!(User, "users", "User", id);
record!(SubscriptionPlan, "plans", "Plan", id);
record!(Subscription, "subscriptions", "Subscription", id);
record!(Payment, "payments", "Payment", id);

// Tenant namespaces
record!(DoctorProfile, "doctor_profiles", "Doctor profile", user_id);
record!(PatientProfile, "patient_profiles", "Patient profile", user_id);
record!(DoctorAvailabilitySlot, "slots", "Slot", id);
record!(Appointment, "appointments", "Appointment", id);
record!(Treatment, "treatments", "Treatment", id);
record!(Prescription, "prescriptions", "Prescription", id);
