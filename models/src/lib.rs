// models/src/lib.rs
//! Entities shared by every Medcor crate: tenants, accounts, scheduling,
//! clinical records and billing, plus the common error types.

pub mod billing;
pub mod errors;
pub mod identifiers;
pub mod medical;

pub use errors::{MedError, MedResult, ValidationError, ValidationResult};
pub use identifiers::Identifier;
