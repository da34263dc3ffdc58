// rest_api/src/handlers/tenants.rs
use axum::{extract::State, http::StatusCode, Json};
use models::medical::{Hospital, HospitalUpdate, NewHospital};
use models::MedError;
use security::permissions;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DomainRequest {
    pub domain: String,
}

/// Platform administrators see every hospital, everyone else their own.
pub async fn list_tenants(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<Vec<Hospital>>> {
    let tenants = &state.platform.tenants;
    let hospitals = match caller.actor.tenant_id {
        None if caller.actor.is_platform_admin() => tenants.list().await?,
        Some(own) => vec![tenants.get(own).await?],
        None => Vec::new(),
    };
    Ok(Json(hospitals))
}

pub async fn create_tenant(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(new): ApiJson<NewHospital>,
) -> ApiResult<(StatusCode, Json<Hospital>)> {
    caller.require(&state, permissions::TENANTS_MANAGE)?;
    let hospital = state.platform.tenants.create_tenant(&caller.actor, new).await?;
    Ok((StatusCode::CREATED, Json(hospital)))
}

pub async fn get_tenant(State(state): State<AppState>, caller: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Hospital>> {
    if !caller.actor.belongs_to(id) {
        return Err(MedError::not_found("Hospital", id).into());
    }
    Ok(Json(state.platform.tenants.get(id).await?))
}

pub async fn update_tenant(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<HospitalUpdate>,
) -> ApiResult<Json<Hospital>> {
    caller.require(&state, permissions::TENANTS_MANAGE)?;
    Ok(Json(state.platform.tenants.update(&caller.actor, id, update).await?))
}

pub async fn add_domain(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<DomainRequest>,
) -> ApiResult<Json<Hospital>> {
    caller.require(&state, permissions::TENANTS_MANAGE)?;
    Ok(Json(state.platform.tenants.add_domain(&caller.actor, id, &body.domain).await?))
}

pub async fn activate_tenant(State(state): State<AppState>, caller: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Hospital>> {
    caller.require(&state, permissions::TENANTS_MANAGE)?;
    Ok(Json(state.platform.tenants.set_active(&caller.actor, id, true).await?))
}

pub async fn deactivate_tenant(State(state): State<AppState>, caller: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Hospital>> {
    caller.require(&state, permissions::TENANTS_MANAGE)?;
    Ok(Json(state.platform.tenants.set_active(&caller.actor, id, false).await?))
}
