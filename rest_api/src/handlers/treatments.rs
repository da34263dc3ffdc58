// rest_api/src/handlers/treatments.rs
use axum::{extract::State, http::StatusCode, Json};
use models::medical::{NewPrescription, NewTreatment, Prescription, Treatment, TreatmentStatus};
use security::permissions;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, TenantUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TreatmentFilter {
    #[serde(default)]
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TreatmentStatus,
}

pub async fn list_treatments(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiQuery(filter): ApiQuery<TreatmentFilter>,
) -> ApiResult<Json<Vec<Treatment>>> {
    caller.require(&state, permissions::TREATMENTS_READ)?;
    Ok(Json(state.platform.treatments.list_treatments(&caller.scope, caller.actor(), filter.patient_id).await?))
}

pub async fn create_treatment(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiJson(new): ApiJson<NewTreatment>,
) -> ApiResult<(StatusCode, Json<Treatment>)> {
    caller.require(&state, permissions::TREATMENTS_MANAGE)?;
    let treatment = state.platform.treatments.create_treatment(&caller.scope, caller.actor(), new).await?;
    Ok((StatusCode::CREATED, Json(treatment)))
}

pub async fn get_treatment(State(state): State<AppState>, caller: TenantUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Treatment>> {
    caller.require(&state, permissions::TREATMENTS_READ)?;
    Ok(Json(state.platform.treatments.get_treatment(&caller.scope, caller.actor(), id).await?))
}

pub async fn update_treatment_status(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Json<Treatment>> {
    caller.require(&state, permissions::TREATMENTS_MANAGE)?;
    Ok(Json(state.platform.treatments.update_status(&caller.scope, caller.actor(), id, body.status).await?))
}

pub async fn list_prescriptions(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Prescription>>> {
    caller.require(&state, permissions::TREATMENTS_READ)?;
    Ok(Json(state.platform.treatments.list_prescriptions(&caller.scope, caller.actor(), id).await?))
}

pub async fn add_prescription(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(new): ApiJson<NewPrescription>,
) -> ApiResult<(StatusCode, Json<Prescription>)> {
    caller.require(&state, permissions::TREATMENTS_MANAGE)?;
    let prescription = state.platform.treatments.add_prescription(&caller.scope, caller.actor(), id, new).await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

/// Nurses may refill without `treatments.manage`; the service refuses patients.
pub async fn refill_prescription(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Prescription>> {
    caller.require(&state, permissions::TREATMENTS_READ)?;
    Ok(Json(state.platform.treatments.refill(&caller.scope, caller.actor(), id).await?))
}

pub async fn cancel_prescription(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Prescription>> {
    caller.require(&state, permissions::TREATMENTS_MANAGE)?;
    Ok(Json(state.platform.treatments.cancel_prescription(&caller.scope, caller.actor(), id).await?))
}
