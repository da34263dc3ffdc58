// rest_api/src/handlers/auth.rs
use axum::{extract::State, http::{HeaderMap, StatusCode}, Json};
use models::medical::{NewUser, UserView};
use security::{TokenPair, TokenType, UserLogin};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiResult, RestApiError};
use crate::extract::{resolve_scope, tenant_header, ApiJson, AuthUser};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserView,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn issue(state: &AppState, user: &models::medical::User) -> ApiResult<TokenPair> {
    let role_id = state
        .roles
        .role_id(user.role)
        .ok_or_else(|| RestApiError::Internal(format!("role '{}' is not configured", user.role)))?;
    Ok(state.keys.issue_pair(user, role_id)?)
}

/// Anonymous callers sign up as patients of the hospital named in the body
/// or the `X-Tenant` header; signed-in staff create accounts for others.
pub async fn register_handler(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    headers: HeaderMap,
    ApiJson(mut new_user): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let actor = caller.as_ref().map(|c| c.actor);
    if new_user.tenant_id.is_none() {
        if let Some(key) = tenant_header(&headers) {
            new_user.tenant_id = Some(resolve_scope(&state, Some(key), actor.as_ref()).await?.tenant_id);
        }
    }
    let user = state.platform.users.register(actor.as_ref(), new_user).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

pub async fn login_handler(State(state): State<AppState>, ApiJson(login): ApiJson<UserLogin>) -> ApiResult<Json<LoginResponse>> {
    let user = state.platform.users.authenticate(&login.username, &login.password).await?;
    let tokens = issue(&state, &user)?;
    info!(user = %user.id, "login");
    Ok(Json(LoginResponse { tokens, user: UserView::from(&user) }))
}

pub async fn refresh_handler(State(state): State<AppState>, ApiJson(body): ApiJson<RefreshRequest>) -> ApiResult<Json<TokenPair>> {
    let claims = state.keys.validate(&body.refresh_token, TokenType::Refresh)?;
    let user = state.platform.users.active_user(claims.sub).await?;
    Ok(Json(issue(&state, &user)?))
}

pub async fn me_handler(caller: AuthUser) -> Json<UserView> {
    Json(UserView::from(&caller.user))
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    state.platform.users.change_password(&caller.actor, &body.current_password, &body.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}
