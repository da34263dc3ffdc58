// rest_api/src/handlers/scheduling.rs
use axum::{extract::State, http::StatusCode, Json};
use lib::scheduling::RecurringOutcome;
use models::medical::{
    Appointment, AppointmentQuery, AppointmentStatus, DoctorAvailabilitySlot, NewAppointment, NewSlot,
    RecurringSlotRequest, SlotQuery,
};
use security::permissions;
use serde::Deserialize;
use uuid::Uuid;

use super::ReasonBody;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, TenantUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub slot_id: Uuid,
}

pub async fn list_slots(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiQuery(query): ApiQuery<SlotQuery>,
) -> ApiResult<Json<Vec<DoctorAvailabilitySlot>>> {
    caller.require(&state, permissions::SLOTS_READ)?;
    Ok(Json(state.platform.scheduling.list_available_slots(&caller.scope, &query).await?))
}

pub async fn create_slot(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiJson(new): ApiJson<NewSlot>,
) -> ApiResult<(StatusCode, Json<DoctorAvailabilitySlot>)> {
    caller.require(&state, permissions::SLOTS_MANAGE)?;
    let slot = state.platform.scheduling.create_slot(&caller.scope, caller.actor(), new).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn create_recurring_slots(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiJson(request): ApiJson<RecurringSlotRequest>,
) -> ApiResult<(StatusCode, Json<RecurringOutcome>)> {
    caller.require(&state, permissions::SLOTS_MANAGE)?;
    let outcome = state.platform.scheduling.generate_recurring_slots(&caller.scope, caller.actor(), request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn deactivate_slot(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<DoctorAvailabilitySlot>> {
    caller.require(&state, permissions::SLOTS_MANAGE)?;
    Ok(Json(state.platform.scheduling.deactivate_slot(&caller.scope, caller.actor(), id).await?))
}

pub async fn list_appointments(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiQuery(query): ApiQuery<AppointmentQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    caller.require(&state, permissions::APPOINTMENTS_READ)?;
    Ok(Json(state.platform.scheduling.list_appointments(&caller.scope, caller.actor(), query).await?))
}

pub async fn book_appointment(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiJson(new): ApiJson<NewAppointment>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    caller.require(&state, permissions::APPOINTMENTS_BOOK)?;
    let appointment = state.platform.scheduling.book_appointment(&caller.scope, caller.actor(), new).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Appointment>> {
    caller.require(&state, permissions::APPOINTMENTS_READ)?;
    Ok(Json(state.platform.scheduling.get_appointment(&caller.scope, caller.actor(), id).await?))
}

async fn change_status(
    state: AppState,
    caller: TenantUser,
    id: Uuid,
    target: AppointmentStatus,
    body: Option<Json<ReasonBody>>,
) -> ApiResult<Json<Appointment>> {
    let permission = match target {
        AppointmentStatus::Cancelled => permissions::APPOINTMENTS_BOOK,
        _ => permissions::APPOINTMENTS_MANAGE,
    };
    caller.require(&state, permission)?;
    let reason = body.and_then(|Json(b)| b.reason);
    Ok(Json(state.platform.scheduling.transition(&caller.scope, caller.actor(), id, target, reason).await?))
}

pub async fn confirm_appointment(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<Json<ReasonBody>>,
) -> ApiResult<Json<Appointment>> {
    change_status(state, caller, id, AppointmentStatus::Confirmed, body).await
}

pub async fn complete_appointment(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<Json<ReasonBody>>,
) -> ApiResult<Json<Appointment>> {
    change_status(state, caller, id, AppointmentStatus::Completed, body).await
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<Json<ReasonBody>>,
) -> ApiResult<Json<Appointment>> {
    change_status(state, caller, id, AppointmentStatus::Cancelled, body).await
}

pub async fn no_show_appointment(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<Json<ReasonBody>>,
) -> ApiResult<Json<Appointment>> {
    change_status(state, caller, id, AppointmentStatus::NoShow, body).await
}

pub async fn reschedule_appointment(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RescheduleRequest>,
) -> ApiResult<Json<Appointment>> {
    caller.require(&state, permissions::APPOINTMENTS_BOOK)?;
    Ok(Json(state.platform.scheduling.reschedule(&caller.scope, caller.actor(), id, body.slot_id).await?))
}
