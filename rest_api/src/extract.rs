// rest_api/src/extract.rs
//! Request extractors: authenticated caller, tenant resolution and JSON /
//! path / query wrappers whose rejections use the API error body.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use lib::{Actor, TenantScope};
use models::medical::User;
use models::MedError;
use security::{authorize, require_permission, AuthError, Claims};

use crate::error::{ApiResult, RestApiError};
use crate::state::AppState;

/// Selects the hospital by schema name or domain.
pub const TENANT_HEADER: &str = "x-tenant";

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RestApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(RestApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(RestApiError))]
pub struct ApiQuery<T>(pub T);

/// The caller behind a valid access token, reloaded from storage so disabled
/// accounts and members of deactivated hospitals lose access before their
/// token expires.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    pub user: User,
    pub actor: Actor,
}

impl AuthUser {
    pub fn require(&self, state: &AppState, permission: &str) -> ApiResult<()> {
        require_permission(&self.claims, &state.roles, permission)?;
        Ok(())
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = RestApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
        let claims = authorize(header, &state.keys, &state.roles, None)?;
        let user = state.platform.users.active_user(claims.sub).await?;
        if user.role != claims.role || user.tenant_id != claims.tenant_id {
            return Err(AuthError::InvalidToken("token no longer matches the account".into()).into());
        }
        if let Some(tenant_id) = user.tenant_id {
            let hospital = state.platform.tenants.get(tenant_id).await?;
            if !hospital.is_active {
                return Err(MedError::PermissionDenied(format!("hospital '{}' is inactive", hospital.schema_name)).into());
            }
        }
        Ok(AuthUser { actor: Actor::from(&user), claims, user })
    }
}

pub fn tenant_header(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Picks the hospital a request works on: the `X-Tenant` header when sent,
/// otherwise the caller's own hospital.
pub async fn resolve_scope(state: &AppState, header: Option<&str>, actor: Option<&Actor>) -> ApiResult<TenantScope> {
    let tenants = &state.platform.tenants;
    let scope = match (header, actor.and_then(|a| a.tenant_id)) {
        (Some(key), _) => TenantScope::from(&tenants.resolve(key).await?),
        (None, Some(own)) => tenants.scope_of(own).await?,
        (None, None) => {
            return Err(RestApiError::InvalidInput(format!("the {} header is required", TENANT_HEADER)));
        }
    };
    if let Some(actor) = actor {
        if !actor.belongs_to(scope.tenant_id) {
            return Err(MedError::PermissionDenied("not a member of this hospital".into()).into());
        }
    }
    Ok(scope)
}

/// An authenticated caller working inside one hospital.
#[derive(Debug, Clone)]
pub struct TenantUser {
    pub auth: AuthUser,
    pub scope: TenantScope,
}

impl TenantUser {
    pub fn actor(&self) -> &Actor {
        &self.auth.actor
    }

    pub fn require(&self, state: &AppState, permission: &str) -> ApiResult<()> {
        self.auth.require(state, permission)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for TenantUser {
    type Rejection = RestApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let scope = resolve_scope(state, tenant_header(&parts.headers), Some(&auth.actor)).await?;
        Ok(TenantUser { auth, scope })
    }
}
