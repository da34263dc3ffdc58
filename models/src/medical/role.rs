// models/src/medical/role.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// The role tag carried by every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Patient,
    Doctor,
    Nurse,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [UserRole::Patient, UserRole::Doctor, UserRole::Nurse, UserRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Patient => "patient",
            UserRole::Doctor => "doctor",
            UserRole::Nurse => "nurse",
            UserRole::Admin => "admin",
        }
    }

    /// Clinical and administrative staff, i.e. everyone except patients.
    pub fn is_staff(&self) -> bool {
        !matches!(self, UserRole::Patient)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Ok(UserRole::Patient),
            "doctor" => Ok(UserRole::Doctor),
            "nurse" => Ok(UserRole::Nurse),
            "admin" => Ok(UserRole::Admin),
            other => Err(ValidationError::UnknownVariant { kind: "role", value: other.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Doctor".parse::<UserRole>().unwrap(), UserRole::Doctor);
        assert!("surgeon".parse::<UserRole>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Nurse).unwrap(), "\"nurse\"");
    }
}
