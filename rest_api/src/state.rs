// rest_api/src/state.rs
use std::sync::Arc;

use lib::Platform;
use security::{JwtKeys, RolesConfig};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub platform: Arc<Platform>,
    pub keys: Arc<JwtKeys>,
    pub roles: Arc<RolesConfig>,
}

impl AppState {
    /// Signing keys and token lifetimes come from the platform's auth config.
    pub fn new(platform: Platform, roles: RolesConfig) -> Self {
        let auth = &platform.config.auth;
        let keys = JwtKeys::new(auth.jwt_secret.as_bytes(), auth.access_token_ttl_secs, auth.refresh_token_ttl_secs);
        AppState { platform: Arc::new(platform), keys: Arc::new(keys), roles: Arc::new(roles) }
    }
}
