// models/src/medical/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use bcrypt::{hash, verify, BcryptError};
use uuid::Uuid;

use crate::errors::{require_non_empty, validate_email, ValidationError, ValidationResult};
use crate::medical::UserRole;

pub const MIN_PASSWORD_LEN: usize = 8;

// --- DTO for New User Registration ---
// Holds the plaintext password only until it is hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub first: String,
    pub last: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: UserRole,
    /// Hospital the account belongs to. `None` only for platform administrators.
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

impl NewUser {
    pub fn validate(&self) -> ValidationResult<()> {
        require_non_empty("first", &self.first)?;
        require_non_empty("last", &self.last)?;
        require_non_empty("username", &self.username)?;
        if self.username.len() > 150 || self.username.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidValue {
                field: "username",
                reason: "must be at most 150 characters without whitespace".into(),
            });
        }
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.tenant_id.is_none() && self.role != UserRole::Admin {
            return Err(ValidationError::MissingField("tenant_id"));
        }
        Ok(())
    }
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    Ok(())
}

// --- Stored User Struct ---
// Contains the password hash, never the plaintext password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub first: String,
    pub last: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Hashes a plaintext password with the given bcrypt cost.
    pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
        hash(password, cost)
    }

    /// Verifies a plaintext password against a stored hash.
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, BcryptError> {
        verify(password, hash)
    }

    /// Creates a new `User` from a `NewUser` DTO, hashing the password.
    pub fn from_new_user(new_user: NewUser, cost: u32) -> Result<Self, crate::MedError> {
        new_user.validate()?;
        let now = Utc::now();
        let password_hash = Self::hash_password(&new_user.password, cost)?;

        Ok(User {
            id: Uuid::new_v4(),
            tenant_id: new_user.tenant_id,
            first: new_user.first.trim().to_string(),
            last: new_user.last.trim().to_string(),
            username: new_user.username,
            email: new_user.email.to_ascii_lowercase(),
            password_hash,
            phone: new_user.phone,
            role: new_user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login: None,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first, self.last)
    }

    /// Platform administrators are admins not bound to any hospital.
    pub fn is_platform_admin(&self) -> bool {
        self.role == UserRole::Admin && self.tenant_id.is_none()
    }
}

/// Partial update of the editable account fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub first: Option<String>,
    pub last: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl UserUpdate {
    pub fn apply(self, user: &mut User) -> ValidationResult<()> {
        if let Some(first) = self.first {
            require_non_empty("first", &first)?;
            user.first = first.trim().to_string();
        }
        if let Some(last) = self.last {
            require_non_empty("last", &last)?;
            user.last = last.trim().to_string();
        }
        if let Some(email) = self.email {
            validate_email(&email)?;
            user.email = email.to_ascii_lowercase();
        }
        if let Some(phone) = self.phone {
            user.phone = Some(phone).filter(|p| !p.trim().is_empty());
        }
        user.updated_at = Utc::now();
        Ok(())
    }
}

/// What clients get to see of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub username: String,
    pub email: String,
    pub first: String,
    pub last: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        UserView {
            id: user.id,
            tenant_id: user.tenant_id,
            username: user.username.clone(),
            email: user.email.clone(),
            first: user.first.clone(),
            last: user.last.clone(),
            phone: user.phone.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String, // Plaintext password for login attempt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_patient() -> NewUser {
        NewUser {
            first: "Ada".into(),
            last: "Lovelace".into(),
            username: "ada".into(),
            email: "Ada@Example.org".into(),
            password: "analytical".into(),
            phone: None,
            role: UserRole::Patient,
            tenant_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn hashes_password_and_normalizes_email() {
        let user = User::from_new_user(new_patient(), 4).unwrap();
        assert_ne!(user.password_hash, "analytical");
        assert!(User::verify_password("analytical", &user.password_hash).unwrap());
        assert!(!User::verify_password("wrong-password", &user.password_hash).unwrap());
        assert_eq!(user.email, "ada@example.org");
        assert!(user.is_active);
    }

    #[test]
    fn view_has_no_password_hash() {
        let user = User::from_new_user(new_patient(), 4).unwrap();
        let json = serde_json::to_value(UserView::from(&user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "patient");
    }

    #[test]
    fn rejects_short_password() {
        let mut new_user = new_patient();
        new_user.password = "short".into();
        assert_eq!(new_user.validate().unwrap_err(), ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }

    #[test]
    fn only_admins_may_be_tenantless() {
        let mut new_user = new_patient();
        new_user.tenant_id = None;
        assert_eq!(new_user.validate().unwrap_err(), ValidationError::MissingField("tenant_id"));
        new_user.role = UserRole::Admin;
        assert!(new_user.validate().is_ok());
    }

    #[test]
    fn update_rejects_blank_names() {
        let mut user = User::from_new_user(new_patient(), 4).unwrap();
        let update = UserUpdate { first: Some("  ".into()), ..Default::default() };
        assert!(update.apply(&mut user).is_err());
        assert_eq!(user.first, "Ada");
    }
}
