// security/src/middleware.rs
//! Framework-neutral request authorization: the HTTP layer hands over the raw
//! `Authorization` header and gets validated claims back.

use tracing::debug;

use crate::roles::RolesConfig;
use crate::{AuthError, Claims, JwtKeys, TokenType};

/// Extracts the token from a `Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|auth| auth.strip_prefix("Bearer ").or_else(|| auth.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

pub fn require_permission(claims: &Claims, roles: &RolesConfig, required_permission: &str) -> Result<(), AuthError> {
    if roles.has_permission(claims.role_id, required_permission) {
        Ok(())
    } else {
        debug!(user = %claims.username, role = %claims.role, permission = required_permission, "permission denied");
        Err(AuthError::PermissionDenied(required_permission.to_string()))
    }
}

/// Validates the access token in `header` and, when given, checks a permission.
pub fn authorize(
    header: Option<&str>,
    keys: &JwtKeys,
    roles: &RolesConfig,
    required_permission: Option<&str>,
) -> Result<Claims, AuthError> {
    let jwt = bearer_token(header)?;
    let claims = keys.validate(jwt, TokenType::Access)?;

    // The role id in the token must still agree with the configured table.
    if roles.role_id(claims.role) != Some(claims.role_id) {
        return Err(AuthError::InvalidToken("role no longer matches configuration".into()));
    }
    if let Some(permission) = required_permission {
        require_permission(&claims, roles, permission)?;
    }
    Ok(claims)
}
