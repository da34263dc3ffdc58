// models/src/identifiers.rs

use core::ops::Deref;
use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use internment::Intern;

use crate::errors::{ValidationError, ValidationResult};

/// Longest schema name PostgreSQL would accept; kept so exported tenants
/// stay portable to a schema-per-tenant database.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Namespace holding platform-wide records. Tenants may not claim it.
pub const PUBLIC_SCHEMA: &str = "public";

/// An identifier naming a tenant schema. Identifiers are interned, so
/// cloning and comparing them is cheap.
///
/// Valid identifiers are 1 to 63 bytes of ASCII lowercase letters, digits
/// and underscores, and start with a letter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct Identifier(Intern<String>);

impl Identifier {
    /// Creates a new identifier.
    ///
    /// # Errors
    /// Returns a `ValidationError` if the value is empty, too long, contains
    /// characters outside `[a-z0-9_]`, does not start with a letter, or is
    /// the reserved `public` name.
    pub fn new(value: String) -> ValidationResult<Self> {
        if value.is_empty() || value.len() > MAX_IDENTIFIER_LEN {
            return Err(ValidationError::InvalidIdentifierLength);
        }
        let starts_with_letter = value.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        if !starts_with_letter
            || !value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ValidationError::InvalidIdentifier(value));
        }
        if value == PUBLIC_SCHEMA {
            return Err(ValidationError::ReservedIdentifier(value));
        }

        Ok(Self(Intern::new(value)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Identifier::new(raw).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Identifier {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl FromStr for Identifier {
    type Err = ValidationError;

    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::new(s.to_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.as_str().to_string()
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}
