// rest_api/src/handlers/users.rs
use axum::{extract::State, http::StatusCode, Json};
use lib::users::DoctorListing;
use models::medical::{
    DoctorProfile, DoctorProfileInput, NewUser, PatientProfile, PatientProfileInput, UserRole, UserUpdate, UserView,
};
use security::permissions;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser, TenantUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorFilter {
    #[serde(default)]
    pub specialization: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> ApiResult<Json<Vec<UserView>>> {
    caller.require(&state, permissions::USERS_READ)?;
    let users = state.platform.users.list_users(caller.actor(), caller.scope.tenant_id, filter.role).await?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

/// Accounts created here always belong to the request's hospital.
pub async fn create_user(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiJson(mut new_user): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    caller.require(&state, permissions::USERS_READ)?;
    new_user.tenant_id = Some(caller.scope.tenant_id);
    let user = state.platform.users.register(Some(caller.actor()), new_user).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

pub async fn get_user(State(state): State<AppState>, caller: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<UserView>> {
    let user = state.platform.users.get_user(&caller.actor, id).await?;
    Ok(Json(UserView::from(&user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> ApiResult<Json<UserView>> {
    let user = state.platform.users.update_user(&caller.actor, id, update).await?;
    Ok(Json(UserView::from(&user)))
}

pub async fn activate_user(State(state): State<AppState>, caller: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<UserView>> {
    caller.require(&state, permissions::USERS_MANAGE)?;
    let user = state.platform.users.set_active(&caller.actor, id, true).await?;
    Ok(Json(UserView::from(&user)))
}

pub async fn deactivate_user(State(state): State<AppState>, caller: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<UserView>> {
    caller.require(&state, permissions::USERS_MANAGE)?;
    let user = state.platform.users.set_active(&caller.actor, id, false).await?;
    Ok(Json(UserView::from(&user)))
}

pub async fn list_doctors(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiQuery(filter): ApiQuery<DoctorFilter>,
) -> ApiResult<Json<Vec<DoctorListing>>> {
    caller.require(&state, permissions::SLOTS_READ)?;
    Ok(Json(state.platform.users.list_doctors(&caller.scope, filter.specialization.as_deref()).await?))
}

pub async fn get_doctor_profile(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<DoctorProfile>> {
    caller.require(&state, permissions::SLOTS_READ)?;
    Ok(Json(state.platform.users.get_doctor_profile(&caller.scope, id).await?))
}

pub async fn put_doctor_profile(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<DoctorProfileInput>,
) -> ApiResult<Json<DoctorProfile>> {
    Ok(Json(state.platform.users.upsert_doctor_profile(&caller.scope, caller.actor(), id, input).await?))
}

pub async fn get_patient_profile(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PatientProfile>> {
    Ok(Json(state.platform.users.get_patient_profile(&caller.scope, caller.actor(), id).await?))
}

pub async fn put_patient_profile(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<PatientProfileInput>,
) -> ApiResult<Json<PatientProfile>> {
    Ok(Json(state.platform.users.upsert_patient_profile(&caller.scope, caller.actor(), id, input).await?))
}
