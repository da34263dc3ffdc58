// rest_api/src/handlers/mod.rs
pub mod ai;
pub mod auth;
pub mod billing;
pub mod scheduling;
pub mod system;
pub mod tenants;
pub mod treatments;
pub mod users;

use serde::Deserialize;

/// Optional free-text reason sent with status changes.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}
