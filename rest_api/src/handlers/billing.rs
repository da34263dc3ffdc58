// rest_api/src/handlers/billing.rs
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use models::billing::{NewPlan, Payment, Subscription, SubscriptionPlan};
use models::MedError;
use security::permissions;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser, TenantUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PlanFilter {
    /// Include retired plans. Platform administrators only.
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default = "default_at_period_end")]
    pub at_period_end: bool,
}

fn default_at_period_end() -> bool {
    true
}

pub async fn list_plans(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(filter): ApiQuery<PlanFilter>,
) -> ApiResult<Json<Vec<SubscriptionPlan>>> {
    let active_only = !(filter.all && caller.actor.is_platform_admin());
    Ok(Json(state.platform.billing.list_plans(active_only).await?))
}

pub async fn create_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(new): ApiJson<NewPlan>,
) -> ApiResult<(StatusCode, Json<SubscriptionPlan>)> {
    caller.require(&state, permissions::BILLING_MANAGE)?;
    let plan = state.platform.billing.create_plan(&caller.actor, new).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn deactivate_plan(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SubscriptionPlan>> {
    caller.require(&state, permissions::BILLING_MANAGE)?;
    Ok(Json(state.platform.billing.deactivate_plan(&caller.actor, id).await?))
}

pub async fn current_subscription(State(state): State<AppState>, caller: TenantUser) -> ApiResult<Json<Option<Subscription>>> {
    caller.require(&state, permissions::BILLING_READ)?;
    Ok(Json(state.platform.billing.current_subscription(caller.scope.tenant_id).await?))
}

pub async fn subscribe(
    State(state): State<AppState>,
    caller: TenantUser,
    ApiJson(body): ApiJson<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    caller.require(&state, permissions::BILLING_MANAGE)?;
    let subscription = state.platform.billing.subscribe(caller.actor(), caller.scope.tenant_id, body.plan_id).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    caller: TenantUser,
    body: Option<axum::Json<CancelRequest>>,
) -> ApiResult<Json<Subscription>> {
    caller.require(&state, permissions::BILLING_MANAGE)?;
    let at_period_end = body.map_or(true, |axum::Json(b)| b.at_period_end);
    Ok(Json(state.platform.billing.cancel(caller.actor(), caller.scope.tenant_id, at_period_end).await?))
}

/// Retries the charge of a due or past-due subscription right away.
pub async fn renew_subscription(State(state): State<AppState>, caller: TenantUser) -> ApiResult<Json<Subscription>> {
    caller.require(&state, permissions::BILLING_MANAGE)?;
    caller.actor().require_admin_of(caller.scope.tenant_id)?;
    let billing = &state.platform.billing;
    let current = billing
        .current_subscription(caller.scope.tenant_id)
        .await?
        .ok_or_else(|| MedError::not_found("Subscription", caller.scope.tenant_id))?;
    Ok(Json(billing.renew(current.id, Utc::now()).await?))
}

pub async fn list_payments(State(state): State<AppState>, caller: TenantUser) -> ApiResult<Json<Vec<Payment>>> {
    caller.require(&state, permissions::BILLING_READ)?;
    caller.actor().require_admin_of(caller.scope.tenant_id)?;
    Ok(Json(state.platform.billing.list_payments(caller.scope.tenant_id).await?))
}

pub async fn refund_payment(State(state): State<AppState>, caller: AuthUser, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Payment>> {
    caller.require(&state, permissions::BILLING_MANAGE)?;
    Ok(Json(state.platform.billing.refund(&caller.actor, id).await?))
}
