// models/src/medical/hospital.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{require_non_empty, validate_email, ValidationError, ValidationResult};
use crate::identifiers::Identifier;

/// A hospital or clinic account. Every hospital is a tenant: its clinical
/// data lives in a namespace named after `schema_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    pub schema_name: Identifier,
    /// Host names that resolve to this tenant, lowercased.
    pub domains: Vec<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHospital {
    pub name: String,
    pub schema_name: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Hospital {
    pub fn from_new(new: NewHospital) -> ValidationResult<Self> {
        require_non_empty("name", &new.name)?;
        let schema_name = Identifier::new(new.schema_name)?;
        if let Some(ref email) = new.email {
            validate_email(email)?;
        }
        let domains = new
            .domains
            .iter()
            .map(|d| normalize_domain(d))
            .collect::<ValidationResult<Vec<_>>>()?;
        let now = Utc::now();
        Ok(Hospital {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            schema_name,
            domains,
            address: new.address,
            phone: new.phone,
            email: new.email,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HospitalUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl HospitalUpdate {
    pub fn apply(self, hospital: &mut Hospital) -> ValidationResult<()> {
        if let Some(name) = self.name {
            require_non_empty("name", &name)?;
            hospital.name = name.trim().to_string();
        }
        if let Some(email) = self.email {
            validate_email(&email)?;
            hospital.email = Some(email);
        }
        if self.address.is_some() {
            hospital.address = self.address;
        }
        if self.phone.is_some() {
            hospital.phone = self.phone;
        }
        hospital.updated_at = Utc::now();
        Ok(())
    }
}

/// Lowercases a host name and checks it only holds DNS label characters.
pub fn normalize_domain(raw: &str) -> ValidationResult<String> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    let valid = !domain.is_empty()
        && domain.len() <= 253
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if !valid {
        return Err(ValidationError::InvalidValue { field: "domain", reason: format!("'{}' is not a host name", raw) });
    }
    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_hospital_with_normalized_domains() {
        let hospital = Hospital::from_new(NewHospital {
            name: " St. Mary's ".into(),
            schema_name: "st_marys".into(),
            domains: vec!["StMarys.Example.COM.".into()],
            address: None,
            phone: None,
            email: Some("front-desk@stmarys.example.com".into()),
        })
        .unwrap();
        assert_eq!(hospital.name, "St. Mary's");
        assert_eq!(hospital.domains, vec!["stmarys.example.com".to_string()]);
        assert_eq!(hospital.schema_name.as_str(), "st_marys");
    }

    #[test]
    fn rejects_bad_domains() {
        assert!(normalize_domain("under_score.example.com").is_err());
        assert!(normalize_domain("-lead.example.com").is_err());
        assert!(normalize_domain("a..b").is_err());
    }
}
