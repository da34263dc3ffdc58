// models/src/medical/mod.rs
pub mod appointment;
pub mod doctor;
pub mod hospital;
pub mod patient;
pub mod prescription;
pub mod role;
pub mod slot;
pub mod treatment;
pub mod user;

pub use appointment::{Appointment, AppointmentQuery, AppointmentStatus, NewAppointment};
pub use doctor::{DoctorProfile, DoctorProfileInput};
pub use hospital::{Hospital, HospitalUpdate, NewHospital};
pub use patient::{PatientProfile, PatientProfileInput};
pub use prescription::{NewPrescription, Prescription, PrescriptionStatus};
pub use role::UserRole;
pub use slot::{DoctorAvailabilitySlot, NewSlot, RecurringSlotRequest, SlotQuery};
pub use treatment::{NewTreatment, Treatment, TreatmentStatus};
pub use user::{Login, NewUser, User, UserUpdate, UserView};
